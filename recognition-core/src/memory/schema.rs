//! SQLite schema for writing pads, recognition moments and learner events.

use rusqlite::{Connection, Result as SqliteResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema. Safe to call on an existing database.
pub fn initialize_schema(conn: &Connection) -> SqliteResult<()> {
    // WAL for concurrent readers; harmless for in-memory databases
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        apply_v1_schema(conn)?;
    }

    Ok(())
}

fn apply_v1_schema(conn: &Connection) -> SqliteResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS writing_pads (
            id TEXT PRIMARY KEY,
            learner_id TEXT NOT NULL UNIQUE,
            conscious_state TEXT NOT NULL,
            preconscious_state TEXT NOT NULL,
            unconscious_state TEXT NOT NULL,
            total_recognition_moments INTEGER NOT NULL DEFAULT 0,
            dialectical_depth REAL NOT NULL DEFAULT 0,
            mutual_transformation_score REAL NOT NULL DEFAULT 0,
            pedagogical_attunement REAL NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS recognition_moments (
            id TEXT PRIMARY KEY,
            writing_pad_id TEXT NOT NULL,
            session_id TEXT,
            created_at TEXT NOT NULL,
            thesis_agent TEXT NOT NULL,
            thesis_position TEXT NOT NULL,
            thesis_reasoning TEXT NOT NULL,
            antithesis_agent TEXT NOT NULL,
            antithesis_position TEXT NOT NULL,
            antithesis_reasoning TEXT NOT NULL,
            synthesis_resolution TEXT,
            ego_transformation TEXT,
            superego_transformation TEXT,
            learner_insight TEXT,
            mutual_acknowledgment INTEGER NOT NULL,
            recognition_type TEXT NOT NULL,
            struggle_depth REAL NOT NULL,
            persistence_layer TEXT NOT NULL,
            synthesis_strategy TEXT NOT NULL,
            transformative INTEGER NOT NULL,
            parameters TEXT,
            consolidated_at TEXT,
            FOREIGN KEY (writing_pad_id) REFERENCES writing_pads(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS learner_recognition_events (
            id TEXT PRIMARY KEY,
            learner_id TEXT NOT NULL,
            writing_pad_id TEXT NOT NULL,
            session_id TEXT,
            event_type TEXT NOT NULL,
            tutor_suggestion TEXT,
            learner_response TEXT,
            resistance_interpretation TEXT,
            trigger_event TEXT,
            evidence TEXT,
            recognition_achieved INTEGER,
            demand_category TEXT,
            demand_strength REAL,
            context_snapshot TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (writing_pad_id) REFERENCES writing_pads(id) ON DELETE CASCADE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS learner_sessions (
            session_id TEXT NOT NULL,
            learner_id TEXT NOT NULL,
            started_at TEXT NOT NULL,
            last_active_at TEXT NOT NULL,
            interactions INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (learner_id, session_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS milestone_achievements (
            learner_id TEXT NOT NULL,
            milestone TEXT NOT NULL,
            achieved_at TEXT NOT NULL,
            evidence TEXT,
            PRIMARY KEY (learner_id, milestone)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_moments_pad ON recognition_moments(writing_pad_id, created_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_moments_layer ON recognition_moments(persistence_layer)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_learner ON learner_recognition_events(learner_id, created_at)",
        [],
    )?;

    conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;

    Ok(())
}

/// Get the current schema version.
pub fn get_schema_version(conn: &Connection) -> SqliteResult<i32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
}

/// Check if the schema is initialized.
pub fn is_initialized(conn: &Connection) -> bool {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='writing_pads'",
        [],
        |row| row.get::<_, i32>(0),
    )
    .map(|count| count > 0)
    .unwrap_or(false)
}
