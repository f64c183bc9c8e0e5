//! Critique reviewer (superego).
//!
//! Every call runs through an [`EscalationPolicy`]. A model reply is used
//! when it passes the parse boundary; otherwise the policy decides between a
//! stronger tier, the [`HeuristicClassifier`], and failing open. A review
//! never returns an error to the caller.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::call::{RoleModel, RoleReply};
use super::heuristic::HeuristicClassifier;
use super::prompts;
use super::types::{
    LearnerContext, ReviewReply, ReviewVerdict, RevisionReview, StructuredCritique,
    SuggestionSet,
};
use crate::config::EngineConfig;
use crate::llm::TextGenerator;
use crate::retry::{EscalationPolicy, StepKind, StepOutcome};

pub struct CritiqueReviewer {
    model: RoleModel,
    classifier: HeuristicClassifier,
    review_policy: EscalationPolicy,
    dialectical_policy: EscalationPolicy,
}

impl CritiqueReviewer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            model: RoleModel::new(generator, prompts::superego_system_prompt()).with_temperature(0.2),
            classifier: HeuristicClassifier::default(),
            review_policy: EscalationPolicy::review(),
            dialectical_policy: EscalationPolicy::dialectical(),
        }
    }

    pub fn from_config(generator: Arc<dyn TextGenerator>, config: &EngineConfig) -> Self {
        let model = RoleModel::new(generator, prompts::superego_system_prompt())
            .with_tier(config.negotiation.reviewer_tier)
            .with_temperature(config.negotiation.reviewer_temperature)
            .with_max_tokens(config.negotiation.max_tokens)
            .with_generation(&config.generation);

        Self {
            model,
            classifier: HeuristicClassifier::new(config.dialectic.rejection_threshold),
            review_policy: EscalationPolicy::review(),
            dialectical_policy: EscalationPolicy::dialectical(),
        }
    }

    pub fn with_model(mut self, model: RoleModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_classifier(mut self, classifier: HeuristicClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn classifier(&self) -> &HeuristicClassifier {
        &self.classifier
    }

    /// Simple-mode review of a draft.
    #[instrument(skip(self, learner, draft), fields(learner_id = %learner.learner_id))]
    pub async fn review(&self, learner: &LearnerContext, draft: &SuggestionSet) -> ReviewVerdict {
        let prompt = prompts::review_prompt(learner, draft);
        let text = draft.render();

        let escalation = self
            .review_policy
            .run(|kind| self.review_step(kind, &prompt, &text))
            .await;

        let verdict = escalation.value.unwrap_or_else(ReviewVerdict::fail_open);
        info!(
            approved = verdict.approved,
            source = ?verdict.source,
            refinements = verdict.refinements.len(),
            "review complete"
        );
        verdict
    }

    async fn review_step(&self, kind: StepKind, prompt: &str, text: &str) -> StepOutcome<ReviewVerdict> {
        match kind {
            StepKind::Heuristic => StepOutcome::Success(self.classifier.verdict(text)),
            StepKind::FailOpen => StepOutcome::Success(ReviewVerdict::fail_open()),
            _ => match self.model.call::<ReviewReply>(kind, prompt).await {
                StepOutcome::Success(reply) => StepOutcome::Success(reply.into()),
                StepOutcome::Failed(failure) => StepOutcome::Failed(failure),
            },
        }
    }

    /// Dialectical critique (antithesis) of a draft.
    ///
    /// The returned severity is the raw severity; compliance scaling is the
    /// negotiator's concern.
    #[instrument(skip_all, fields(learner_id = %learner.learner_id))]
    pub async fn critique_structured(
        &self,
        draft: &str,
        learner: &LearnerContext,
        memory: Option<&str>,
    ) -> RoleReply<StructuredCritique> {
        let prompt = prompts::critique_prompt(draft, learner, memory);

        let escalation = self
            .dialectical_policy
            .run(|kind| self.critique_step(kind, &prompt, draft))
            .await;

        match escalation.value {
            Some(critique) if escalation.from_model() => RoleReply::model(critique),
            Some(critique) => RoleReply::heuristic(critique),
            None => RoleReply::heuristic(self.classifier.critique(draft)),
        }
    }

    async fn critique_step(
        &self,
        kind: StepKind,
        prompt: &str,
        draft: &str,
    ) -> StepOutcome<StructuredCritique> {
        match kind {
            StepKind::Heuristic | StepKind::FailOpen => {
                StepOutcome::Success(self.classifier.critique(draft))
            }
            _ => self.model.call(kind, prompt).await,
        }
    }

    /// Decide whether a revision resolves the critique.
    #[instrument(skip_all)]
    pub async fn evaluate_revision(
        &self,
        original: &str,
        critique: &StructuredCritique,
        acknowledgment: &str,
        revision: &str,
    ) -> RoleReply<RevisionReview> {
        let prompt = prompts::revision_review_prompt(original, critique, acknowledgment, revision);

        let escalation = self
            .dialectical_policy
            .run(|kind| self.revision_step(kind, &prompt, revision))
            .await;

        let reply = match escalation.value {
            Some(review) if escalation.from_model() => RoleReply::model(review),
            Some(review) => RoleReply::heuristic(review),
            None => RoleReply::heuristic(self.heuristic_revision_review(revision)),
        };
        debug!(accepts = reply.value.accepts, fallback = reply.is_fallback(), "revision evaluated");
        reply
    }

    async fn revision_step(
        &self,
        kind: StepKind,
        prompt: &str,
        revision: &str,
    ) -> StepOutcome<RevisionReview> {
        match kind {
            StepKind::Heuristic | StepKind::FailOpen => {
                StepOutcome::Success(self.heuristic_revision_review(revision))
            }
            _ => self.model.call(kind, prompt).await,
        }
    }

    fn heuristic_revision_review(&self, revision: &str) -> RevisionReview {
        let critique = self.classifier.critique(revision);
        RevisionReview {
            accepts: !critique.disapproves,
            remaining_concerns: if critique.disapproves {
                vec![critique.critique]
            } else {
                Vec::new()
            },
            transformation: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ModelTier, ScriptedGenerator};
    use crate::roles::types::{Suggestion, SuggestionKind, VerdictSource};

    fn draft(message: &str) -> SuggestionSet {
        SuggestionSet::new(vec![Suggestion::new(SuggestionKind::Practice, "Recursion", message)])
    }

    fn learner() -> LearnerContext {
        LearnerContext::new("learner-1", "Working through recursion")
    }

    #[tokio::test]
    async fn test_review_model_verdict() {
        let scripted = ScriptedGenerator::new()
            .with_reply(r#"{"approved": false, "feedback": "Gives the answer away", "principle": "productive struggle"}"#);
        let reviewer = CritiqueReviewer::new(Arc::new(scripted));

        let verdict = reviewer.review(&learner(), &draft("Try the exercise")).await;
        assert!(!verdict.approved);
        assert_eq!(verdict.source, VerdictSource::Model);
        assert_eq!(
            verdict.principle,
            Some(crate::roles::PedagogicalPrinciple::ProductiveStruggle)
        );
    }

    #[tokio::test]
    async fn test_review_unparseable_retries_stronger_then_fails_open() {
        let scripted = ScriptedGenerator::new()
            .with_reply("Looks fine to me!")
            .with_reply("Still prose.");
        let reviewer = CritiqueReviewer::new(Arc::new(scripted.clone()));

        let verdict = reviewer.review(&learner(), &draft("The answer is 42")).await;
        assert!(verdict.approved);
        assert_eq!(verdict.source, VerdictSource::FailOpen);

        let tiers: Vec<_> = scripted.requests().iter().map(|r| r.tier).collect();
        assert_eq!(tiers, vec![ModelTier::Balanced, ModelTier::Flagship]);
    }

    #[tokio::test]
    async fn test_review_provider_failure_uses_heuristic() {
        let scripted = ScriptedGenerator::new().with_failure("401 unauthorized");
        let reviewer = CritiqueReviewer::new(Arc::new(scripted));

        let verdict = reviewer
            .review(&learner(), &draft("The answer is 42, just copy it"))
            .await;
        assert!(!verdict.approved);
        assert_eq!(verdict.source, VerdictSource::Heuristic);
    }

    #[tokio::test]
    async fn test_critique_structured_falls_back_to_classifier() {
        let scripted = ScriptedGenerator::new().with_failure("timeout");
        let reviewer = CritiqueReviewer::new(Arc::new(scripted));

        let reply = reviewer
            .critique_structured("Here is the solution: return n * fact(n - 1).", &learner(), None)
            .await;
        assert!(reply.is_fallback());
        assert!(reply.value.disapproves);
        assert_eq!(reply.value.principle, "productive_struggle");
    }

    #[tokio::test]
    async fn test_evaluate_revision_model_reply() {
        let scripted = ScriptedGenerator::new().with_reply(
            r#"{"accepts": true, "transformation": "I see that a worked example can still leave room to think"}"#,
        );
        let reviewer = CritiqueReviewer::new(Arc::new(scripted));

        let reply = reviewer
            .evaluate_revision("orig", &StructuredCritique::approval(), "ack", "What happens at n = 0?")
            .await;
        assert_eq!(reply.source, VerdictSource::Model);
        assert!(reply.value.accepts);
        assert!(!reply.value.transformation.is_empty());
    }
}
