//! Model access shared by both roles.

use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::debug;

use super::prompts::FORMAT_REMINDER;
use super::types::VerdictSource;
use crate::config::GenerationConfig;
use crate::llm::{GenerationRequest, ModelTier, TextGenerator};
use crate::parse::{parse_structured, ParseOutcome, Validate};
use crate::retry::{AttemptFailure, StepKind, StepOutcome};

/// Generator handle plus the request settings one role uses.
#[derive(Clone)]
pub struct RoleModel {
    generator: Arc<dyn TextGenerator>,
    system_prompt: String,
    tier: ModelTier,
    temperature: f64,
    max_tokens: u32,
    json_mode: bool,
    top_p: Option<f64>,
}

impl RoleModel {
    pub fn new(generator: Arc<dyn TextGenerator>, system_prompt: impl Into<String>) -> Self {
        Self {
            generator,
            system_prompt: system_prompt.into(),
            tier: ModelTier::default(),
            temperature: 0.7,
            max_tokens: 1500,
            json_mode: true,
            top_p: None,
        }
    }

    pub fn with_tier(mut self, tier: ModelTier) -> Self {
        self.tier = tier;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Apply call-level settings.
    pub fn with_generation(mut self, config: &GenerationConfig) -> Self {
        self.json_mode = config.json_mode;
        self.top_p = config.top_p;
        self
    }

    pub fn tier(&self) -> ModelTier {
        self.tier
    }

    pub fn provider(&self) -> &str {
        self.generator.name()
    }

    /// Run one model step and parse its reply.
    ///
    /// Only model-calling step kinds are valid here; local fallbacks belong
    /// to the role.
    pub(crate) async fn call<T>(&self, kind: StepKind, prompt: &str) -> StepOutcome<T>
    where
        T: DeserializeOwned + Validate,
    {
        let tier = match kind {
            StepKind::StrongerModel => match self.tier.stronger() {
                Some(tier) => tier,
                None => {
                    return StepOutcome::Failed(AttemptFailure::parse(format!(
                        "no tier stronger than {}",
                        self.tier
                    )))
                }
            },
            StepKind::Primary | StepKind::FormatReminder => self.tier,
            StepKind::Heuristic | StepKind::FailOpen => {
                return StepOutcome::Failed(AttemptFailure::provider(format!(
                    "{} is not a model step",
                    kind
                )))
            }
        };

        let mut request = GenerationRequest::new(self.system_prompt.as_str(), prompt)
            .with_tier(tier)
            .with_temperature(self.temperature)
            .with_max_tokens(self.max_tokens)
            .with_json_mode(self.json_mode)
            .with_metadata("step", kind.to_string());
        if let Some(top_p) = self.top_p {
            request = request.with_top_p(top_p);
        }
        if kind == StepKind::FormatReminder {
            request = request.with_appended_prompt(FORMAT_REMINDER);
        }

        match self.generator.generate(request).await {
            Ok(response) => {
                debug!(
                    model = %response.model,
                    output_tokens = response.usage.output_tokens,
                    "role reply received"
                );
                match parse_structured::<T>(&response.content) {
                    ParseOutcome::Parsed { value } => StepOutcome::Success(value),
                    ParseOutcome::Rejected { reason } => {
                        StepOutcome::Failed(AttemptFailure::parse(reason))
                    }
                }
            }
            Err(e) => StepOutcome::Failed(AttemptFailure::provider(e.to_string())),
        }
    }
}

/// A role's answer and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleReply<T> {
    pub value: T,
    pub source: VerdictSource,
}

impl<T> RoleReply<T> {
    pub fn model(value: T) -> Self {
        Self {
            value,
            source: VerdictSource::Model,
        }
    }

    pub fn heuristic(value: T) -> Self {
        Self {
            value,
            source: VerdictSource::Heuristic,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source != VerdictSource::Model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedGenerator;
    use crate::roles::types::SuggestionSet;

    #[tokio::test]
    async fn test_format_reminder_appended() {
        let scripted = ScriptedGenerator::new()
            .with_reply(r#"{"suggestions": [{"type": "practice", "title": "t", "message": "m"}]}"#);
        let model = RoleModel::new(Arc::new(scripted.clone()), "sys");

        let outcome: StepOutcome<SuggestionSet> = model.call(StepKind::FormatReminder, "draft").await;
        assert!(matches!(outcome, StepOutcome::Success(_)));
        assert!(scripted.requests()[0].user_prompt.ends_with(FORMAT_REMINDER));
    }

    #[tokio::test]
    async fn test_stronger_model_bumps_tier() {
        let scripted = ScriptedGenerator::new().with_reply("not json");
        let model = RoleModel::new(Arc::new(scripted.clone()), "sys").with_tier(ModelTier::Fast);

        let outcome: StepOutcome<SuggestionSet> = model.call(StepKind::StrongerModel, "p").await;
        assert!(matches!(outcome, StepOutcome::Failed(AttemptFailure::Parse { .. })));
        assert_eq!(scripted.requests()[0].tier, ModelTier::Balanced);
    }

    #[tokio::test]
    async fn test_no_stronger_tier_skips_call() {
        let scripted = ScriptedGenerator::new().with_reply("{}");
        let model =
            RoleModel::new(Arc::new(scripted.clone()), "sys").with_tier(ModelTier::Flagship);

        let outcome: StepOutcome<SuggestionSet> = model.call(StepKind::StrongerModel, "p").await;
        assert!(matches!(outcome, StepOutcome::Failed(_)));
        assert!(scripted.requests().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_classified() {
        let scripted = ScriptedGenerator::new().with_failure("rate limited");
        let model = RoleModel::new(Arc::new(scripted), "sys");

        let outcome: StepOutcome<SuggestionSet> = model.call(StepKind::Primary, "p").await;
        match outcome {
            StepOutcome::Failed(failure) => assert!(failure.is_provider()),
            StepOutcome::Success(_) => panic!("expected failure"),
        }
    }
}
