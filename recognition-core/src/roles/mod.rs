//! The two negotiation roles.
//!
//! The suggestion generator (ego) drafts learner-facing suggestions and
//! revises them; the critique reviewer (superego) evaluates them against the
//! [`PedagogicalPrinciple`] catalogue. Both parse model output through the
//! typed boundary in [`crate::parse`] and escalate through
//! [`crate::retry::EscalationPolicy`].

mod call;
mod critic;
mod generator;
mod heuristic;
mod principles;
pub mod prompts;
mod types;

pub use call::{RoleModel, RoleReply};
pub use critic::CritiqueReviewer;
pub use generator::SuggestionGenerator;
pub use heuristic::{HeuristicClassifier, HeuristicFinding, HeuristicRule};
pub use principles::PedagogicalPrinciple;
pub use types::{
    CurriculumContext, EgoResponse, LearnerContext, Priority, ReviewReply, ReviewVerdict,
    RevisionReview, StructuredCritique, Suggestion, SuggestionKind, SuggestionSet,
    VerdictSource,
};
