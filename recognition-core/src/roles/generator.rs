//! Suggestion generator (ego).

use std::sync::Arc;
use tracing::{info, instrument, warn};

use super::call::{RoleModel, RoleReply};
use super::heuristic::HeuristicClassifier;
use super::prompts;
use super::types::{
    CurriculumContext, EgoResponse, LearnerContext, ReviewVerdict, StructuredCritique,
    SuggestionSet,
};
use crate::config::EngineConfig;
use crate::llm::TextGenerator;
use crate::retry::{EscalationPolicy, StepKind, StepOutcome};

pub struct SuggestionGenerator {
    model: RoleModel,
    classifier: HeuristicClassifier,
    drafting_policy: EscalationPolicy,
    dialectical_policy: EscalationPolicy,
}

impl SuggestionGenerator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            model: RoleModel::new(generator, prompts::ego_system_prompt()),
            classifier: HeuristicClassifier::default(),
            drafting_policy: EscalationPolicy::drafting(),
            dialectical_policy: EscalationPolicy::dialectical(),
        }
    }

    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &EngineConfig) -> Self {
        let model = RoleModel::new(generator, prompts::ego_system_prompt())
            .with_tier(config.negotiation.generator_tier)
            .with_temperature(config.negotiation.generator_temperature)
            .with_max_tokens(config.negotiation.max_tokens)
            .with_generation(&config.generation);

        Self {
            model,
            classifier: HeuristicClassifier::new(config.dialectic.rejection_threshold),
            drafting_policy: EscalationPolicy::drafting(),
            dialectical_policy: EscalationPolicy::dialectical(),
        }
    }

    pub fn with_model(mut self, model: RoleModel) -> Self {
        self.model = model;
        self
    }

    /// Initial draft. `None` when neither the primary call nor the
    /// format-reminder retry produced a usable set.
    #[instrument(skip_all, fields(learner_id = %learner.learner_id))]
    pub async fn draft(
        &self,
        learner: &LearnerContext,
        curriculum: &CurriculumContext,
    ) -> Option<SuggestionSet> {
        let prompt = prompts::draft_prompt(learner, curriculum);
        self.generate_set(&prompt, "draft").await
    }

    /// Revise a rejected draft using the reviewer's feedback.
    #[instrument(skip_all, fields(learner_id = %learner.learner_id))]
    pub async fn revise(
        &self,
        learner: &LearnerContext,
        curriculum: &CurriculumContext,
        draft: &SuggestionSet,
        verdict: &ReviewVerdict,
    ) -> Option<SuggestionSet> {
        let prompt = prompts::revision_prompt(learner, curriculum, draft, verdict);
        self.generate_set(&prompt, "revision").await
    }

    /// Apply an approving reviewer's refinements.
    pub async fn incorporate(
        &self,
        draft: &SuggestionSet,
        refinements: &[String],
    ) -> Option<SuggestionSet> {
        let prompt = prompts::incorporation_prompt(draft, refinements);
        self.generate_set(&prompt, "incorporation").await
    }

    async fn generate_set(&self, prompt: &str, purpose: &'static str) -> Option<SuggestionSet> {
        let escalation = self
            .drafting_policy
            .run(|kind| self.model.call::<SuggestionSet>(kind, prompt))
            .await;
        let attempts = escalation.attempted().len();

        match escalation.value {
            Some(set) => {
                info!(
                    purpose,
                    suggestions = set.suggestions.len(),
                    attempts,
                    "suggestions generated"
                );
                Some(set)
            }
            None => {
                warn!(purpose, failures = escalation.failures.len(), "no usable suggestions");
                None
            }
        }
    }

    /// Acknowledge a critique and revise (dialectical mode).
    #[instrument(skip_all, fields(learner_id = %learner.learner_id))]
    pub async fn respond_to_critique(
        &self,
        draft: &str,
        critique: &StructuredCritique,
        concerns: &[String],
        learner: &LearnerContext,
        memory: Option<&str>,
    ) -> RoleReply<EgoResponse> {
        let prompt = prompts::ego_response_prompt(draft, critique, concerns, learner, memory);

        let escalation = self
            .dialectical_policy
            .run(|kind| self.response_step(kind, &prompt, draft, critique))
            .await;

        match escalation.value {
            Some(response) if escalation.from_model() => RoleReply::model(response),
            Some(response) => RoleReply::heuristic(response),
            None => RoleReply::heuristic(self.heuristic_response(draft, critique)),
        }
    }

    async fn response_step(
        &self,
        kind: StepKind,
        prompt: &str,
        draft: &str,
        critique: &StructuredCritique,
    ) -> StepOutcome<EgoResponse> {
        match kind {
            StepKind::Heuristic | StepKind::FailOpen => {
                StepOutcome::Success(self.heuristic_response(draft, critique))
            }
            _ => self.model.call(kind, prompt).await,
        }
    }

    /// Deterministic answer: concede and soften commanding phrasing.
    fn heuristic_response(&self, draft: &str, critique: &StructuredCritique) -> EgoResponse {
        let acknowledgment = if critique.principle.is_empty() {
            "Understood, revising the suggestion.".to_string()
        } else {
            format!("Understood, revising with {} in mind.", critique.principle)
        };

        EgoResponse {
            acknowledgment,
            revision: self.classifier.soften(draft),
            transformation: String::new(),
        }
    }
}
