//! Simple-mode negotiation between the suggestion generator and the critique
//! reviewer.
//!
//! A negotiation drafts once, then alternates review and revision for at
//! most `max_rounds` rounds. It converges when the reviewer approves (an
//! optional incorporation pass applies minor refinements) or when a revision
//! is at least `similarity_threshold` similar to the draft it replaces.
//! Review failures never block the learner: see
//! [`crate::retry::EscalationPolicy::review`].

mod controller;
mod similarity;
mod types;

pub use controller::NegotiationController;
pub use similarity::similarity;
pub use types::{NegotiationOptions, NegotiationResult, Termination, TraceEntry};
