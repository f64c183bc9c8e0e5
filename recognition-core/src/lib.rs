//! # recognition-core
//!
//! Dialectical negotiation between a suggestion generator and a critique
//! reviewer, with a three-tier learner memory that turns negotiation
//! outcomes into lasting recognition.
//!
//! ## Core Components
//!
//! - **Negotiation**: draft, critique and revise until convergence
//! - **Dialectic**: thesis, antithesis and synthesis producing recognition moments
//! - **Memory**: conscious, preconscious and unconscious tiers with promotion,
//!   consolidation and decay
//! - **Metrics**: recognition depth, milestones, flow and continuity
//! - **Pipeline**: one interaction end to end
//!
//! ## Example
//!
//! ```rust,ignore
//! use recognition_core::{
//!     CurriculumContext, EngineConfig, Interaction, LearnerContext, PipelineOrchestrator,
//!     SqliteMemoryStore,
//! };
//!
//! let store = Arc::new(SqliteMemoryStore::open("memory.db")?);
//! let pipeline = PipelineOrchestrator::new(store, text_generator, EngineConfig::default())?;
//!
//! let learner = LearnerContext::new("learner-1", "Stuck on recursion").with_session("s-1");
//! let outcome = pipeline
//!     .process_interaction(Interaction::new(learner, CurriculumContext::new()))
//!     .await?;
//! for suggestion in &outcome.suggestions {
//!     println!("{}", suggestion.render());
//! }
//! ```

pub mod config;
pub mod dialectic;
pub mod error;
pub mod events;
pub mod llm;
pub mod memory;
pub mod metrics;
pub mod negotiation;
pub mod parse;
pub mod pipeline;
pub mod retry;
pub mod roles;

// Re-exports for convenience
pub use config::{
    DialecticalConfig, EngineConfig, GenerationConfig, MemoryConfig, NegotiationConfig,
};
pub use dialectic::{DialecticalNegotiator, DialecticalParams, DialecticalResult, TranscriptEntry};
pub use error::{Error, Result};
pub use events::LearnerEventClassifier;
pub use llm::{
    GenerationRequest, GenerationResponse, ModelTier, ScriptedGenerator, TextGenerator,
    TimeoutGenerator, TokenUsage, TrackedGenerator,
};
pub use memory::{
    LearnerEvent, LearnerEventKind, MemoryContext, MemoryDynamics, PersistenceLayer,
    RecognitionMoment, RecognitionType, SqliteMemoryStore, SynthesisStrategy, TraceQuery,
    WritingPad,
};
pub use metrics::{
    Continuity, DepthTrend, FlowState, LayerProgression, Milestone, MilestoneStatus,
    RecognitionDepth, RecognitionMetrics, RecognitionSnapshot, SessionFlow,
};
pub use negotiation::{NegotiationController, NegotiationOptions, NegotiationResult};
pub use parse::ParseOutcome;
pub use pipeline::{
    Interaction, InteractionOutcome, LearnerGuard, LearnerLocks, NegotiationMode,
    PipelineOrchestrator,
};
pub use retry::EscalationPolicy;
pub use roles::{
    CritiqueReviewer, CurriculumContext, LearnerContext, PedagogicalPrinciple, Suggestion,
    SuggestionGenerator, SuggestionKind,
};
