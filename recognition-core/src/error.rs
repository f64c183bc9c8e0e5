//! Error types for recognition-core.

use thiserror::Error;

/// Result type alias using recognition-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during negotiation and memory operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Text-generation provider error (auth, rate limit, empty completion)
    #[error("LLM API error: {provider} - {message}")]
    LlmApi { provider: String, message: String },

    /// Timeout during a text-generation call
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// Model output could not be turned into structured data
    #[error("Parse error: {0}")]
    Parse(String),

    /// Memory storage error
    #[error("Memory storage error: {0}")]
    MemoryStorage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation requires a writing pad that has not been initialized
    #[error("No writing pad for learner {learner_id}")]
    MissingWritingPad { learner_id: String },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an LLM API error.
    pub fn llm_api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::LlmApi {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(duration_ms: u64) -> Self {
        Self::Timeout { duration_ms }
    }

    /// Create a missing writing pad error.
    pub fn missing_pad(learner_id: impl Into<String>) -> Self {
        Self::MissingWritingPad {
            learner_id: learner_id.into(),
        }
    }

    /// Whether this error came from the text-generation collaborator rather
    /// than from parsing or storage.
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Self::LlmApi { .. } | Self::Timeout { .. })
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::MemoryStorage(err.to_string())
    }
}
