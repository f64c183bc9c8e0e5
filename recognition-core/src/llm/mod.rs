//! Text-generation collaborator abstraction.
//!
//! The negotiation roles never talk to a vendor directly. They build a
//! [`GenerationRequest`] with a [`ModelTier`] and hand it to a
//! [`TextGenerator`]; escalation to a stronger model is a tier bump.
//!
//! ## Example
//!
//! ```rust,ignore
//! use recognition_core::llm::{GenerationRequest, ModelTier, TimeoutGenerator};
//!
//! let generator = TimeoutGenerator::new(vendor_client, Duration::from_secs(60));
//! let request = GenerationRequest::new(system, prompt)
//!     .with_json_mode(true)
//!     .with_tier(ModelTier::Balanced);
//!
//! let response = generator.generate(request).await?;
//! ```

mod client;
mod types;

pub use client::{
    ScriptedGenerator, ScriptedReply, TextGenerator, TimeoutGenerator, TrackedGenerator,
};
pub use types::{
    GenerationRequest, GenerationResponse, ModelTier, ModelUsage, TokenUsage, UsageTracker,
};
