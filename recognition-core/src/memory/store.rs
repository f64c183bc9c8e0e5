//! SQLite-backed memory store.

use crate::error::{Error, Result};
use crate::memory::schema::{initialize_schema, is_initialized};
use crate::memory::types::*;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

const PAD_COLUMNS: &str = "id, learner_id, conscious_state, preconscious_state, unconscious_state,
    total_recognition_moments, dialectical_depth, mutual_transformation_score,
    pedagogical_attunement, created_at, updated_at";

const MOMENT_COLUMNS: &str = "id, writing_pad_id, session_id, created_at,
    thesis_agent, thesis_position, thesis_reasoning,
    antithesis_agent, antithesis_position, antithesis_reasoning,
    synthesis_resolution, ego_transformation, superego_transformation, learner_insight,
    mutual_acknowledgment, recognition_type, struggle_depth, persistence_layer,
    synthesis_strategy, transformative, parameters, consolidated_at";

const EVENT_COLUMNS: &str = "id, learner_id, writing_pad_id, session_id, event_type,
    tutor_suggestion, learner_response, resistance_interpretation, trigger_event, evidence,
    recognition_achieved, demand_category, demand_strength, context_snapshot, created_at";

/// SQLite-backed store for writing pads and everything keyed by them.
///
/// Writes to a pad are last-writer-wins; callers that need per-learner
/// serialization hold a lock around read-modify-write sequences.
pub struct SqliteMemoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMemoryStore {
    /// Open or create a memory store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::MemoryStorage(e.to_string()))?;

        if !is_initialized(&conn) {
            initialize_schema(&conn).map_err(|e| Error::MemoryStorage(e.to_string()))?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::MemoryStorage(e.to_string()))?;
        initialize_schema(&conn).map_err(|e| Error::MemoryStorage(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock connection: {}", e)))?;
        f(&conn).map_err(|e| Error::MemoryStorage(e.to_string()))
    }

    // ==================== Writing Pads ====================

    /// Get the learner's pad, if one exists.
    pub fn get_writing_pad(&self, learner_id: &str) -> Result<Option<WritingPad>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM writing_pads WHERE learner_id = ?1", PAD_COLUMNS),
                params![learner_id],
                Self::row_to_pad,
            )
            .optional()
        })
    }

    /// Get the learner's pad, creating an empty one on first use.
    pub fn get_or_initialize_writing_pad(
        &self,
        learner_id: &str,
        fade_threshold_days: i64,
    ) -> Result<WritingPad> {
        let fresh = WritingPad::new(learner_id, fade_threshold_days);
        let conscious = serde_json::to_string(&fresh.conscious)?;
        let preconscious = serde_json::to_string(&fresh.preconscious)?;
        let unconscious = serde_json::to_string(&fresh.unconscious)?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR IGNORE INTO writing_pads (
                    id, learner_id, conscious_state, preconscious_state, unconscious_state,
                    created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    fresh.id.to_string(),
                    learner_id,
                    conscious,
                    preconscious,
                    unconscious,
                    format_datetime(fresh.created_at),
                    format_datetime(fresh.updated_at),
                ],
            )?;
            Ok(())
        })?;

        self.require_writing_pad(learner_id)
    }

    /// Get the learner's pad or fail with [`Error::MissingWritingPad`].
    pub fn require_writing_pad(&self, learner_id: &str) -> Result<WritingPad> {
        self.get_writing_pad(learner_id)?
            .ok_or_else(|| Error::missing_pad(learner_id))
    }

    /// Overwrite the stored pad with this snapshot.
    pub fn save_writing_pad(&self, pad: &WritingPad) -> Result<()> {
        let conscious = serde_json::to_string(&pad.conscious)?;
        let preconscious = serde_json::to_string(&pad.preconscious)?;
        let unconscious = serde_json::to_string(&pad.unconscious)?;

        let updated = self.with_conn(|conn| {
            conn.execute(
                "UPDATE writing_pads SET
                    conscious_state = ?2, preconscious_state = ?3, unconscious_state = ?4,
                    total_recognition_moments = ?5, dialectical_depth = ?6,
                    mutual_transformation_score = ?7, pedagogical_attunement = ?8,
                    updated_at = ?9
                 WHERE learner_id = ?1",
                params![
                    pad.learner_id,
                    conscious,
                    preconscious,
                    unconscious,
                    pad.metrics.total_recognition_moments as i64,
                    pad.metrics.dialectical_depth,
                    pad.metrics.mutual_transformation_score,
                    pad.metrics.pedagogical_attunement,
                    format_datetime(pad.updated_at),
                ],
            )
        })?;

        if updated == 0 {
            return Err(Error::missing_pad(&pad.learner_id));
        }
        Ok(())
    }

    /// Learner ids of every pad.
    pub fn learner_ids(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT learner_id FROM writing_pads ORDER BY created_at")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(ids)
        })
    }

    fn row_to_pad(row: &Row) -> rusqlite::Result<WritingPad> {
        Ok(WritingPad {
            id: uuid_column(row, 0)?,
            learner_id: row.get(1)?,
            conscious: json_column(row, 2)?,
            preconscious: json_column(row, 3)?,
            unconscious: json_column(row, 4)?,
            metrics: PadMetrics {
                total_recognition_moments: row.get::<_, i64>(5)? as u64,
                dialectical_depth: row.get(6)?,
                mutual_transformation_score: row.get(7)?,
                pedagogical_attunement: row.get(8)?,
            },
            created_at: parse_datetime(row.get::<_, String>(9)?),
            updated_at: parse_datetime(row.get::<_, String>(10)?),
        })
    }

    // ==================== Recognition Moments ====================

    pub fn insert_moment(&self, moment: &RecognitionMoment) -> Result<()> {
        let parameters = serde_json::to_string(&moment.parameters)?;

        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO recognition_moments ({}) VALUES (
                        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                        ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22
                    )",
                    MOMENT_COLUMNS
                ),
                params![
                    moment.id.to_string(),
                    moment.writing_pad_id.to_string(),
                    moment.session_id,
                    format_datetime(moment.created_at),
                    moment.thesis.agent,
                    moment.thesis.position,
                    moment.thesis.reasoning,
                    moment.antithesis.agent,
                    moment.antithesis.position,
                    moment.antithesis.reasoning,
                    moment.synthesis_resolution,
                    moment.ego_transformation,
                    moment.superego_transformation,
                    moment.learner_insight,
                    moment.mutual_acknowledgment,
                    moment.recognition_type.as_str(),
                    moment.struggle_depth,
                    moment.persistence_layer.as_str(),
                    moment.synthesis_strategy.as_str(),
                    moment.transformative,
                    parameters,
                    moment.consolidated_at.map(format_datetime),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get_moment(&self, id: Uuid) -> Result<Option<RecognitionMoment>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {} FROM recognition_moments WHERE id = ?1", MOMENT_COLUMNS),
                params![id.to_string()],
                Self::row_to_moment,
            )
            .optional()
        })
    }

    /// All moments of a pad, oldest first.
    pub fn moments_for_pad(&self, pad_id: Uuid) -> Result<Vec<RecognitionMoment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM recognition_moments WHERE writing_pad_id = ?1 ORDER BY created_at ASC",
                MOMENT_COLUMNS
            ))?;
            let moments = stmt
                .query_map(params![pad_id.to_string()], Self::row_to_moment)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(moments)
        })
    }

    /// Moments of a pad not yet in the unconscious layer, oldest first.
    pub fn unconsolidated_moments(&self, pad_id: Uuid) -> Result<Vec<RecognitionMoment>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM recognition_moments
                 WHERE writing_pad_id = ?1 AND persistence_layer != 'unconscious'
                 ORDER BY created_at ASC",
                MOMENT_COLUMNS
            ))?;
            let moments = stmt
                .query_map(params![pad_id.to_string()], Self::row_to_moment)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(moments)
        })
    }

    /// Move a pad's moments from one layer to the next.
    pub fn advance_layer(
        &self,
        pad_id: Uuid,
        from: PersistenceLayer,
        to: PersistenceLayer,
    ) -> Result<usize> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE recognition_moments SET persistence_layer = ?3
                 WHERE writing_pad_id = ?1 AND persistence_layer = ?2",
                params![pad_id.to_string(), from.as_str(), to.as_str()],
            )
        })
    }

    /// One-way move to the unconscious layer. Returns false when the moment
    /// was already consolidated or does not exist.
    pub fn mark_consolidated(&self, moment_id: Uuid, at: DateTime<Utc>) -> Result<bool> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "UPDATE recognition_moments
                 SET persistence_layer = 'unconscious', consolidated_at = ?2
                 WHERE id = ?1 AND persistence_layer != 'unconscious'",
                params![moment_id.to_string(), format_datetime(at)],
            )?;
            Ok(rows > 0)
        })
    }

    /// Moment counts per persistence layer.
    pub fn layer_counts(&self, pad_id: Uuid) -> Result<HashMap<PersistenceLayer, u64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT persistence_layer, COUNT(*) FROM recognition_moments
                 WHERE writing_pad_id = ?1 GROUP BY persistence_layer",
            )?;
            let rows = stmt.query_map(params![pad_id.to_string()], |row| {
                let layer: String = row.get(0)?;
                let count: i64 = row.get(1)?;
                Ok((layer, count))
            })?;

            let mut counts = HashMap::new();
            for row in rows {
                let (layer, count) = row?;
                if let Some(layer) = PersistenceLayer::parse(&layer) {
                    counts.insert(layer, count as u64);
                }
            }
            Ok(counts)
        })
    }

    fn row_to_moment(row: &Row) -> rusqlite::Result<RecognitionMoment> {
        let recognition_type: String = row.get(15)?;
        let persistence_layer: String = row.get(17)?;
        let synthesis_strategy: String = row.get(18)?;
        let parameters: Option<String> = row.get(20)?;

        Ok(RecognitionMoment {
            id: uuid_column(row, 0)?,
            writing_pad_id: uuid_column(row, 1)?,
            session_id: row.get(2)?,
            created_at: parse_datetime(row.get::<_, String>(3)?),
            thesis: Position {
                agent: row.get(4)?,
                position: row.get(5)?,
                reasoning: row.get(6)?,
            },
            antithesis: Position {
                agent: row.get(7)?,
                position: row.get(8)?,
                reasoning: row.get(9)?,
            },
            synthesis_resolution: row.get(10)?,
            ego_transformation: row.get(11)?,
            superego_transformation: row.get(12)?,
            learner_insight: row.get(13)?,
            mutual_acknowledgment: row.get(14)?,
            recognition_type: RecognitionType::parse(&recognition_type)
                .ok_or_else(|| invalid_value(15, &recognition_type))?,
            struggle_depth: row.get(16)?,
            persistence_layer: PersistenceLayer::parse(&persistence_layer)
                .ok_or_else(|| invalid_value(17, &persistence_layer))?,
            synthesis_strategy: SynthesisStrategy::parse(&synthesis_strategy)
                .ok_or_else(|| invalid_value(18, &synthesis_strategy))?,
            transformative: row.get(19)?,
            parameters: parameters
                .and_then(|p| serde_json::from_str(&p).ok())
                .unwrap_or(serde_json::Value::Null),
            consolidated_at: row.get::<_, Option<String>>(21)?.map(parse_datetime),
        })
    }

    // ==================== Learner Events ====================

    /// Append a learner event.
    pub fn insert_event(&self, event: &LearnerEvent) -> Result<()> {
        let context = serde_json::to_string(&event.context_snapshot)?;

        let (interpretation, trigger, evidence, achieved, category, strength) = match &event.kind {
            LearnerEventKind::Resistance { interpretation } => {
                (Some(interpretation.clone()), None, None, None, None, None)
            }
            LearnerEventKind::Breakthrough {
                trigger_event,
                evidence,
                recognition_achieved,
            } => (
                None,
                Some(trigger_event.clone()),
                Some(evidence.clone()),
                Some(*recognition_achieved),
                None,
                None,
            ),
            LearnerEventKind::Demand { category, strength } => {
                (None, None, None, None, Some(category.clone()), Some(*strength))
            }
        };

        self.with_conn(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO learner_recognition_events ({}) VALUES (
                        ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15
                    )",
                    EVENT_COLUMNS
                ),
                params![
                    event.id.to_string(),
                    event.learner_id,
                    event.writing_pad_id.to_string(),
                    event.session_id,
                    event.event_type().as_str(),
                    event.tutor_suggestion,
                    event.learner_response,
                    interpretation,
                    trigger,
                    evidence,
                    achieved,
                    category,
                    strength,
                    context,
                    format_datetime(event.created_at),
                ],
            )?;
            Ok(())
        })
    }

    /// All events of a learner, oldest first.
    pub fn events_for_learner(&self, learner_id: &str) -> Result<Vec<LearnerEvent>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM learner_recognition_events WHERE learner_id = ?1 ORDER BY created_at ASC",
                EVENT_COLUMNS
            ))?;
            let events = stmt
                .query_map(params![learner_id], Self::row_to_event)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(events)
        })
    }

    fn row_to_event(row: &Row) -> rusqlite::Result<LearnerEvent> {
        let event_type: String = row.get(4)?;
        let kind = match LearnerEventType::parse(&event_type) {
            Some(LearnerEventType::Resistance) => LearnerEventKind::Resistance {
                interpretation: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
            },
            Some(LearnerEventType::Breakthrough) => LearnerEventKind::Breakthrough {
                trigger_event: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                evidence: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
                recognition_achieved: row.get::<_, Option<bool>>(10)?.unwrap_or(false),
            },
            Some(LearnerEventType::Demand) => LearnerEventKind::Demand {
                category: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
                strength: row.get::<_, Option<f64>>(12)?.unwrap_or(0.0),
            },
            None => return Err(invalid_value(4, &event_type)),
        };
        let context: Option<String> = row.get(13)?;

        Ok(LearnerEvent {
            id: uuid_column(row, 0)?,
            learner_id: row.get(1)?,
            writing_pad_id: uuid_column(row, 2)?,
            session_id: row.get(3)?,
            kind,
            tutor_suggestion: row.get(5)?,
            learner_response: row.get(6)?,
            context_snapshot: context
                .and_then(|c| serde_json::from_str(&c).ok())
                .unwrap_or(serde_json::Value::Null),
            created_at: parse_datetime(row.get::<_, String>(14)?),
        })
    }

    // ==================== Sessions ====================

    /// Register activity in a session, creating it on first sight.
    pub fn touch_session(&self, learner_id: &str, session_id: &str, at: DateTime<Utc>) -> Result<()> {
        let at = format_datetime(at);
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO learner_sessions (session_id, learner_id, started_at, last_active_at, interactions)
                 VALUES (?1, ?2, ?3, ?3, 1)
                 ON CONFLICT(learner_id, session_id) DO UPDATE SET
                    last_active_at = excluded.last_active_at,
                    interactions = interactions + 1",
                params![session_id, learner_id, at],
            )?;
            Ok(())
        })
    }

    /// Sessions of a learner in chronological order.
    pub fn sessions_for_learner(&self, learner_id: &str) -> Result<Vec<SessionRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, learner_id, started_at, last_active_at, interactions
                 FROM learner_sessions WHERE learner_id = ?1 ORDER BY started_at ASC, session_id ASC",
            )?;
            let sessions = stmt
                .query_map(params![learner_id], |row| {
                    Ok(SessionRecord {
                        session_id: row.get(0)?,
                        learner_id: row.get(1)?,
                        started_at: parse_datetime(row.get::<_, String>(2)?),
                        last_active_at: parse_datetime(row.get::<_, String>(3)?),
                        interactions: row.get::<_, i64>(4)? as u32,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(sessions)
        })
    }

    // ==================== Milestones ====================

    /// Record an achievement. The first record wins; returns whether this
    /// call inserted it.
    pub fn record_milestone(&self, record: &MilestoneRecord) -> Result<bool> {
        self.with_conn(|conn| {
            let rows = conn.execute(
                "INSERT OR IGNORE INTO milestone_achievements (learner_id, milestone, achieved_at, evidence)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.learner_id,
                    record.milestone,
                    format_datetime(record.achieved_at),
                    record.evidence,
                ],
            )?;
            Ok(rows > 0)
        })
    }

    pub fn milestones_for_learner(&self, learner_id: &str) -> Result<Vec<MilestoneRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT learner_id, milestone, achieved_at, evidence
                 FROM milestone_achievements WHERE learner_id = ?1 ORDER BY achieved_at ASC",
            )?;
            let records = stmt
                .query_map(params![learner_id], |row| {
                    Ok(MilestoneRecord {
                        learner_id: row.get(0)?,
                        milestone: row.get(1)?,
                        achieved_at: parse_datetime(row.get::<_, String>(2)?),
                        evidence: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
    }
}

/// Fixed-width RFC 3339 so stored timestamps sort lexicographically.
fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_datetime(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn uuid_column(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    serde_json::from_str(&s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn invalid_value(idx: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        Type::Text,
        format!("unknown value '{}'", value).into(),
    )
}
