//! Simple-mode negotiation loop.

use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use super::similarity::similarity;
use super::types::{NegotiationOptions, NegotiationResult, Termination, TraceEntry};
use crate::config::NegotiationConfig;
use crate::roles::{CritiqueReviewer, CurriculumContext, LearnerContext, SuggestionGenerator};

/// Drives draft, review and revision rounds until the reviewer approves,
/// drafts stop changing, or rounds run out.
pub struct NegotiationController {
    generator: Arc<SuggestionGenerator>,
    reviewer: Arc<CritiqueReviewer>,
    config: NegotiationConfig,
}

impl NegotiationController {
    pub fn new(
        generator: Arc<SuggestionGenerator>,
        reviewer: Arc<CritiqueReviewer>,
        config: NegotiationConfig,
    ) -> Self {
        Self {
            generator,
            reviewer,
            config,
        }
    }

    pub fn config(&self) -> &NegotiationConfig {
        &self.config
    }

    #[instrument(skip_all, fields(learner_id = %learner.learner_id))]
    pub async fn negotiate(
        &self,
        learner: &LearnerContext,
        curriculum: &CurriculumContext,
        options: &NegotiationOptions,
    ) -> NegotiationResult {
        let config = options.resolve(&self.config);
        let mut trace = Vec::new();

        let Some(mut draft) = self.generator.draft(learner, curriculum).await else {
            warn!("no usable initial draft");
            trace.push(TraceEntry::DraftFailed);
            return NegotiationResult::finish(Vec::new(), 0, Termination::DraftFailed, trace);
        };
        trace.push(TraceEntry::Drafted {
            suggestions: draft.suggestions.len(),
        });

        for round in 1..=config.max_rounds {
            let verdict = self.reviewer.review(learner, &draft).await;
            trace.push(TraceEntry::Reviewed {
                round,
                approved: verdict.approved,
                source: verdict.source,
                feedback: verdict.feedback.clone(),
                refinements: verdict.refinements.clone(),
            });

            if verdict.approved {
                if config.incorporate_refinements && verdict.has_refinements() {
                    let refined = self.generator.incorporate(&draft, &verdict.refinements).await;
                    trace.push(TraceEntry::Incorporated {
                        refinements: verdict.refinements.len(),
                        applied: refined.is_some(),
                    });
                    if let Some(refined) = refined {
                        draft = refined;
                    }
                }
                info!(round, "negotiation converged on approval");
                return NegotiationResult::finish(draft.suggestions, round, Termination::Approved, trace);
            }

            let Some(revised) = self.generator.revise(learner, curriculum, &draft, &verdict).await
            else {
                trace.push(TraceEntry::RevisionFailed { round });
                continue;
            };

            let ratio = similarity(&draft.render(), &revised.render());
            trace.push(TraceEntry::Revised {
                round,
                similarity: ratio,
            });
            draft = revised;

            if ratio >= config.similarity_threshold {
                info!(round, similarity = ratio, "negotiation converged on similarity");
                return NegotiationResult::finish(draft.suggestions, round, Termination::Similarity, trace);
            }
            debug!(round, similarity = ratio, "draft revised");
        }

        info!(rounds = config.max_rounds, "rounds exhausted without approval");
        NegotiationResult::finish(
            draft.suggestions,
            config.max_rounds,
            Termination::RoundsExhausted,
            trace,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedGenerator;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    const DRAFT: &str = r#"{"suggestions": [{"type": "lecture", "title": "Recursion", "message": "Watch the recursion lecture, the answer is explained there"}]}"#;
    const REVISED: &str = r#"{"suggestions": [{"type": "practice", "title": "Base cases", "message": "What do you expect fact(0) to return? Try it before reading on."}]}"#;
    const APPROVE: &str = r#"{"approved": true, "feedback": "Good"}"#;
    const REJECT: &str = r#"{"approved": false, "feedback": "Too passive"}"#;

    fn controller(ego: ScriptedGenerator, superego: ScriptedGenerator) -> NegotiationController {
        NegotiationController::new(
            Arc::new(SuggestionGenerator::new(Arc::new(ego))),
            Arc::new(CritiqueReviewer::new(Arc::new(superego))),
            NegotiationConfig::default(),
        )
    }

    fn learner() -> LearnerContext {
        LearnerContext::new("learner-1", "Stuck on recursion")
    }

    #[tokio::test]
    async fn test_approved_first_round() {
        let ctrl = controller(
            ScriptedGenerator::new().with_reply(DRAFT),
            ScriptedGenerator::new().with_reply(APPROVE),
        );
        let result = ctrl
            .negotiate(&learner(), &CurriculumContext::new(), &NegotiationOptions::new())
            .await;

        assert!(result.converged);
        assert_eq!(result.rounds, 1);
        assert_eq!(result.termination, Termination::Approved);
    }

    #[tokio::test]
    async fn test_reject_then_approve() {
        let ctrl = controller(
            ScriptedGenerator::new().with_reply(DRAFT).with_reply(REVISED),
            ScriptedGenerator::new().with_reply(REJECT).with_reply(APPROVE),
        );
        let result = ctrl
            .negotiate(&learner(), &CurriculumContext::new(), &NegotiationOptions::new())
            .await;

        assert!(result.converged);
        assert_eq!(result.rounds, 2);
        assert_eq!(result.suggestions[0].title, "Base cases");
    }

    #[tokio::test]
    async fn test_identical_revision_converges_immediately() {
        let ctrl = controller(
            ScriptedGenerator::new().with_reply(DRAFT).with_reply(DRAFT),
            ScriptedGenerator::new().with_reply(REJECT),
        );
        let result = ctrl
            .negotiate(&learner(), &CurriculumContext::new(), &NegotiationOptions::new())
            .await;

        assert!(result.converged);
        assert_eq!(result.rounds, 1);
        assert_eq!(result.termination, Termination::Similarity);
        assert!(result
            .trace
            .contains(&TraceEntry::Revised { round: 1, similarity: 1.0 }));
    }

    #[tokio::test]
    async fn test_rounds_exhausted() {
        let ctrl = controller(
            ScriptedGenerator::new()
                .with_reply(DRAFT)
                .with_reply(REVISED)
                .with_reply(DRAFT),
            ScriptedGenerator::new().with_reply(REJECT).with_reply(REJECT),
        );
        let result = ctrl
            .negotiate(&learner(), &CurriculumContext::new(), &NegotiationOptions::new())
            .await;

        assert!(!result.converged);
        assert_eq!(result.rounds, 2);
        assert_eq!(result.termination, Termination::RoundsExhausted);
        assert_eq!(result.suggestions[0].title, "Recursion");
    }

    #[tokio::test]
    async fn test_empty_draft_after_reminder() {
        let ctrl = controller(
            ScriptedGenerator::new().with_reply("").with_reply("no json here"),
            ScriptedGenerator::new(),
        );
        let result = ctrl
            .negotiate(&learner(), &CurriculumContext::new(), &NegotiationOptions::new())
            .await;

        assert!(!result.converged);
        assert_eq!(result.rounds, 0);
        assert!(result.suggestions.is_empty());
    }

    #[tokio::test]
    async fn test_incorporation_pass() {
        let ctrl = controller(
            ScriptedGenerator::new().with_reply(DRAFT).with_reply(REVISED),
            ScriptedGenerator::new()
                .with_reply(r#"{"approved": true, "refinements": ["Ask a question instead"], "feedback": "Close"}"#),
        );
        let result = ctrl
            .negotiate(&learner(), &CurriculumContext::new(), &NegotiationOptions::new())
            .await;

        assert!(result.converged);
        assert_eq!(result.suggestions[0].title, "Base cases");
        assert!(result.trace.contains(&TraceEntry::Incorporated {
            refinements: 1,
            applied: true
        }));
    }

    #[tokio::test]
    async fn test_unparseable_review_fails_open() {
        let ctrl = controller(
            ScriptedGenerator::new().with_reply(DRAFT),
            ScriptedGenerator::new().with_reply("LGTM").with_reply("LGTM!"),
        );
        let result = ctrl
            .negotiate(&learner(), &CurriculumContext::new(), &NegotiationOptions::new())
            .await;

        assert!(result.converged);
        assert_eq!(result.fallback_reviews(), 1);
    }

    #[tokio::test]
    async fn test_round_override() {
        let ctrl = controller(
            ScriptedGenerator::new().with_reply(DRAFT),
            ScriptedGenerator::new(),
        );
        let result = ctrl
            .negotiate(
                &learner(),
                &CurriculumContext::new(),
                &NegotiationOptions::new().with_max_rounds(0),
            )
            .await;

        assert!(!result.converged);
        assert_eq!(result.rounds, 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_rounds_never_exceed_cap(
            max_rounds in 0usize..6,
            approvals in proptest::collection::vec(any::<bool>(), 0..8),
        ) {
            let mut ego = ScriptedGenerator::new().with_reply(DRAFT);
            for i in 0..approvals.len() {
                ego = ego.with_reply(if i % 2 == 0 { REVISED } else { DRAFT });
            }
            let superego = approvals
                .iter()
                .fold(ScriptedGenerator::new(), |script, approved| {
                    script.with_reply(if *approved { APPROVE } else { REJECT })
                });
            let ctrl = controller(ego, superego);

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let result = runtime.block_on(ctrl.negotiate(
                &learner(),
                &CurriculumContext::new(),
                &NegotiationOptions::new().with_max_rounds(max_rounds),
            ));

            prop_assert!(result.rounds <= max_rounds);
        }
    }
}
