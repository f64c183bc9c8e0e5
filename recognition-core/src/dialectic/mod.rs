//! Dialectical negotiation mode.
//!
//! The generator's draft is the thesis and the reviewer's structured
//! critique the antithesis. When the critique disapproves, the generator
//! acknowledges and revises for a bounded number of rounds while the
//! reviewer accepts or raises remaining concerns. The outcome is classified
//! into a [`SynthesisStrategy`](crate::memory::SynthesisStrategy) and
//! recorded as a [`RecognitionMoment`](crate::memory::RecognitionMoment).
//!
//! An unresolved conflict is a valid outcome: with
//! `allow_genuine_conflict` set, exhausted rounds end with no resolution
//! instead of a forced compromise.

mod negotiator;
mod types;

pub use negotiator::{
    classify_recognition, classify_strategy, is_genuine_transformation, struggle_depth,
    DialecticalNegotiator,
};
pub use types::{DialecticalParams, DialecticalResult, TranscriptEntry};
