//! Three-tier learner memory.
//!
//! Each learner owns one [`WritingPad`] with three tiers:
//!
//! - **Conscious**: working thoughts and ephemeral notes for the current
//!   interaction; cleared at the end of every memory cycle
//! - **Preconscious**: patterns that are reinforced while they recur and
//!   fade once stale, plus provisional rules derived from strong patterns
//! - **Unconscious**: permanent traces consolidated from recognition
//!   moments, the learner archetype, and recorded conflicts
//!
//! ## Example
//!
//! ```rust,ignore
//! use recognition_core::memory::{MemoryDynamics, SqliteMemoryStore, TraceQuery};
//!
//! let store = Arc::new(SqliteMemoryStore::open("memory.db")?);
//! let pad = store.get_or_initialize_writing_pad("learner-1", 20)?;
//!
//! let dynamics = MemoryDynamics::new(store.clone(), MemoryConfig::default());
//! let report = dynamics.run_cycle("learner-1", Some(&TraceQuery::new()), Utc::now())?;
//!
//! // Periodically
//! dynamics.run_maintenance(Utc::now())?;
//! ```

mod dynamics;
mod recent;
mod schema;
mod store;
mod types;

pub use dynamics::{
    decay, promote, retrieve_context, survives_decay, ConsolidationReport, DecayReport,
    MaintenanceReport, MemoryCycleReport, MemoryDynamics, PromotionStats,
};
pub use recent::{RecentMoments, DEFAULT_LEARNER_LIMIT};
pub use schema::{get_schema_version, initialize_schema, is_initialized, SCHEMA_VERSION};
pub use store::SqliteMemoryStore;
pub use types::{
    most_recent_distinct, ConflictPattern, ConsciousTier, LearnerArchetype, LearnerEvent,
    LearnerEventKind, LearnerEventType, MemoryContext, MilestoneRecord, PadMetrics, Pattern,
    PatternType, PersistenceLayer, Position, PreconsciousTier, ProvisionalRule,
    RecognitionMoment, RecognitionType, SessionRecord, SuperegoTrace, SynthesisStrategy,
    ThoughtRecord, Trace, TraceQuery, Transformations, UnconsciousTier, WritingPad,
    ARCHETYPE_LIST_LIMIT, INITIAL_PATTERN_CONFIDENCE, REINFORCEMENT_STEP,
};
