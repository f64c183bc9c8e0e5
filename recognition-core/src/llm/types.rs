//! Request, response and model-tier types for the text-generation service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Model tier used to resolve which model serves a request.
///
/// Ordering follows capability: `Flagship < Balanced < Fast`, so a smaller
/// value is a stronger model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Most capable, used as the escalation target
    Flagship = 0,
    /// Default tier for both negotiation roles
    Balanced = 1,
    /// Fast and cheap
    Fast = 2,
}

impl ModelTier {
    /// The next stronger tier, if any.
    pub fn stronger(&self) -> Option<ModelTier> {
        match self {
            Self::Fast => Some(Self::Balanced),
            Self::Balanced => Some(Self::Flagship),
            Self::Flagship => None,
        }
    }
}

impl Default for ModelTier {
    fn default() -> Self {
        Self::Balanced
    }
}

impl std::fmt::Display for ModelTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Flagship => write!(f, "flagship"),
            Self::Balanced => write!(f, "balanced"),
            Self::Fast => write!(f, "fast"),
        }
    }
}

/// A single text-generation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// System prompt describing the role
    pub system_prompt: String,
    /// User prompt carrying the task
    pub user_prompt: String,
    /// Sampling temperature (0.0 - 1.0)
    pub temperature: f64,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Nucleus sampling cutoff
    pub top_p: Option<f64>,
    /// Ask the provider for a JSON object response
    pub json_mode: bool,
    /// Tier the collaborator should resolve to a concrete model
    pub tier: ModelTier,
    /// Metadata for tracking (role, round, step)
    pub metadata: HashMap<String, String>,
}

impl GenerationRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature: 0.7,
            max_tokens: 1500,
            top_p: None,
            json_mode: false,
            tier: ModelTier::Balanced,
            metadata: HashMap::new(),
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p.clamp(0.0, 1.0));
        self
    }

    pub fn with_json_mode(mut self, json_mode: bool) -> Self {
        self.json_mode = json_mode;
        self
    }

    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Append text to the user prompt, used by the format-reminder retry.
    pub fn with_appended_prompt(mut self, addition: &str) -> Self {
        self.user_prompt.push_str("\n\n");
        self.user_prompt.push_str(addition);
        self
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A completed generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Generated content
    pub content: String,
    /// Model that served the request
    pub model: String,
    /// Token usage
    pub usage: TokenUsage,
    /// Response timestamp
    pub timestamp: DateTime<Utc>,
}

impl GenerationResponse {
    pub fn new(content: impl Into<String>, model: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            usage,
            timestamp: Utc::now(),
        }
    }
}

/// Usage accounting across roles and models.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageTracker {
    /// Total input tokens
    pub total_input_tokens: u64,
    /// Total output tokens
    pub total_output_tokens: u64,
    /// Number of successful requests
    pub request_count: u64,
    /// Number of failed requests
    pub failure_count: u64,
    /// Per-model breakdown
    pub by_model: HashMap<String, ModelUsage>,
    /// Requests per tier
    pub by_tier: HashMap<ModelTier, u64>,
}

/// Usage for a specific model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub request_count: u64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record usage from a response served at the given tier.
    pub fn record(&mut self, tier: ModelTier, response: &GenerationResponse) {
        self.total_input_tokens += response.usage.input_tokens;
        self.total_output_tokens += response.usage.output_tokens;
        self.request_count += 1;
        *self.by_tier.entry(tier).or_insert(0) += 1;

        let model_usage = self.by_model.entry(response.model.clone()).or_default();
        model_usage.input_tokens += response.usage.input_tokens;
        model_usage.output_tokens += response.usage.output_tokens;
        model_usage.request_count += 1;
    }

    /// Record a failed request.
    pub fn record_failure(&mut self) {
        self.failure_count += 1;
    }

    /// Merge another tracker into this one.
    pub fn merge(&mut self, other: &UsageTracker) {
        self.total_input_tokens += other.total_input_tokens;
        self.total_output_tokens += other.total_output_tokens;
        self.request_count += other.request_count;
        self.failure_count += other.failure_count;

        for (model, usage) in &other.by_model {
            let entry = self.by_model.entry(model.clone()).or_default();
            entry.input_tokens += usage.input_tokens;
            entry.output_tokens += usage.output_tokens;
            entry.request_count += usage.request_count;
        }
        for (tier, count) in &other.by_tier {
            *self.by_tier.entry(*tier).or_insert(0) += count;
        }
    }
}
