//! Engine configuration.
//!
//! Every section deserializes with defaults filled in, so a partial JSON
//! document only needs the values it overrides.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::llm::ModelTier;
use crate::memory::DEFAULT_LEARNER_LIMIT;

/// Lowest allowed mute level. Reviewers below this compliance never
/// disapprove, whatever the configuration says.
pub const MIN_MUTE_COMPLIANCE: f64 = 0.3;

/// Simple-mode negotiation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegotiationConfig {
    /// Maximum critique/revise rounds
    pub max_rounds: usize,
    /// Draft similarity at which revisions count as converged
    pub similarity_threshold: f64,
    /// Run one incorporation pass when approval carries refinements
    pub incorporate_refinements: bool,
    /// Tier for the suggestion generator
    pub generator_tier: ModelTier,
    /// Tier for the critique reviewer
    pub reviewer_tier: ModelTier,
    /// Generator temperature
    pub generator_temperature: f64,
    /// Reviewer temperature
    pub reviewer_temperature: f64,
    /// Max tokens per generation
    pub max_tokens: u32,
}

impl Default for NegotiationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 2,
            similarity_threshold: 0.85,
            incorporate_refinements: true,
            generator_tier: ModelTier::Balanced,
            reviewer_tier: ModelTier::Balanced,
            generator_temperature: 0.7,
            reviewer_temperature: 0.2,
            max_tokens: 1500,
        }
    }
}

impl NegotiationConfig {
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_incorporation(mut self, enabled: bool) -> Self {
        self.incorporate_refinements = enabled;
        self
    }
}

/// Dialectical negotiation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialecticalConfig {
    /// Rounds of acknowledgment/revision before termination
    pub max_negotiation_rounds: usize,
    /// Effective severity at or above which the reviewer disapproves
    pub rejection_threshold: f64,
    /// Leave the conflict unresolved instead of forcing a compromise
    pub allow_genuine_conflict: bool,
    /// Default reviewer compliance (0 mutes critique, 1 passes it through)
    pub compliance: f64,
    /// Compliance below which the reviewer never disapproves; at least
    /// [`MIN_MUTE_COMPLIANCE`]
    pub mute_below_compliance: f64,
    /// Tier for both dialectical roles
    pub tier: ModelTier,
}

impl Default for DialecticalConfig {
    fn default() -> Self {
        Self {
            max_negotiation_rounds: 2,
            rejection_threshold: 0.5,
            allow_genuine_conflict: true,
            compliance: 1.0,
            mute_below_compliance: 0.3,
            tier: ModelTier::Balanced,
        }
    }
}

/// Memory dynamics settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Days before a preconscious pattern fades
    pub fade_threshold_days: i64,
    /// Confidence above which a pattern never fades
    pub retention_confidence: f64,
    /// Minimum moment age before consolidation
    pub consolidation_threshold_days: i64,
    /// Struggle depth above which a non-transformative moment consolidates
    pub consolidation_struggle_depth: f64,
    /// Occurrences of a suggestion type needed to form a pattern
    pub promotion_min_occurrences: usize,
    /// Confidence at which a pattern yields a provisional rule
    pub provisional_rule_confidence: f64,
    /// Max traces returned by context retrieval
    pub retrieval_limit: usize,
    /// Capacity of the per-learner recent-moment buffer
    pub recent_moment_capacity: usize,
    /// Learners kept in the recent-moment buffer at once
    pub recent_learner_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            fade_threshold_days: 20,
            retention_confidence: 0.8,
            consolidation_threshold_days: 7,
            consolidation_struggle_depth: 0.6,
            promotion_min_occurrences: 2,
            provisional_rule_confidence: 0.8,
            retrieval_limit: 5,
            recent_moment_capacity: 50,
            recent_learner_limit: DEFAULT_LEARNER_LIMIT,
        }
    }
}

/// Text-generation call settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Timeout applied to every generation call
    pub timeout_secs: u64,
    /// Use JSON mode for structured role outputs
    pub json_mode: bool,
    /// Nucleus sampling cutoff
    pub top_p: Option<f64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            json_mode: true,
            top_p: None,
        }
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub negotiation: NegotiationConfig,
    pub dialectic: DialecticalConfig,
    pub memory: MemoryConfig,
    pub generation: GenerationConfig,
}

impl EngineConfig {
    /// Parse a JSON document, filling unspecified values with defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_negotiation(mut self, negotiation: NegotiationConfig) -> Self {
        self.negotiation = negotiation;
        self
    }

    pub fn with_dialectic(mut self, dialectic: DialecticalConfig) -> Self {
        self.dialectic = dialectic;
        self
    }

    pub fn with_memory(mut self, memory: MemoryConfig) -> Self {
        self.memory = memory;
        self
    }

    /// Reject values outside their meaningful range.
    pub fn validate(&self) -> Result<()> {
        check_unit("negotiation.similarity_threshold", self.negotiation.similarity_threshold)?;
        check_unit("dialectic.rejection_threshold", self.dialectic.rejection_threshold)?;
        check_unit("dialectic.compliance", self.dialectic.compliance)?;
        check_unit("dialectic.mute_below_compliance", self.dialectic.mute_below_compliance)?;
        if self.dialectic.mute_below_compliance < MIN_MUTE_COMPLIANCE {
            return Err(Error::Config(format!(
                "dialectic.mute_below_compliance must be at least {}, got {}",
                MIN_MUTE_COMPLIANCE, self.dialectic.mute_below_compliance
            )));
        }
        check_unit("memory.retention_confidence", self.memory.retention_confidence)?;
        check_unit(
            "memory.consolidation_struggle_depth",
            self.memory.consolidation_struggle_depth,
        )?;
        check_unit(
            "memory.provisional_rule_confidence",
            self.memory.provisional_rule_confidence,
        )?;

        if self.memory.fade_threshold_days < 0 || self.memory.consolidation_threshold_days < 0 {
            return Err(Error::Config("memory thresholds must be non-negative".into()));
        }
        if self.memory.promotion_min_occurrences == 0 {
            return Err(Error::Config(
                "memory.promotion_min_occurrences must be at least 1".into(),
            ));
        }
        if self.memory.recent_moment_capacity == 0 || self.memory.recent_learner_limit == 0 {
            return Err(Error::Config(
                "memory.recent_moment_capacity and memory.recent_learner_limit must be at least 1"
                    .into(),
            ));
        }
        if self.generation.timeout_secs == 0 {
            return Err(Error::Config("generation.timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::Config(format!("{} must be within [0, 1], got {}", name, value)))
    }
}
