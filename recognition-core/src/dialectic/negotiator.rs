//! Thesis, antithesis and synthesis.

use chrono::Utc;
use regex::Regex;
use serde_json::json;
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::types::{DialecticalParams, DialecticalResult, ResolvedParams, TranscriptEntry};
use crate::config::DialecticalConfig;
use crate::error::{Error, Result};
use crate::memory::{
    MemoryContext, PersistenceLayer, Position, RecentMoments, RecognitionMoment, RecognitionType,
    SqliteMemoryStore, SynthesisStrategy, WritingPad,
};
use crate::roles::{CritiqueReviewer, LearnerContext, SuggestionGenerator};

static CONCESSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(i\s+concede|i('ll|\s+will)\s+defer|if\s+you\s+insist|fine,\s+i('ll|\s+will)|whatever\s+you\s+(say|prefer|think)|i\s+give\s+in|as\s+you\s+wish|i\s+(just\s+)?did\s+what\s+(was|you)\s+asked)\b")
        .expect("invalid regex")
});

/// Whether a transformation statement describes real change rather than
/// giving in.
pub fn is_genuine_transformation(text: &str) -> bool {
    !text.trim().is_empty() && !CONCESSION_PATTERN.is_match(text)
}

/// `severity×0.5 + (rounds/3)×0.3 + 0.2 if mutual`, capped at 1.
pub fn struggle_depth(severity: f64, rounds_used: usize, mutual: bool) -> f64 {
    let mutual_bonus = if mutual { 0.2 } else { 0.0 };
    (severity * 0.5 + (rounds_used as f64 / 3.0) * 0.3 + mutual_bonus).clamp(0.0, 1.0)
}

/// Strategy from how the exchange ended and who changed.
pub fn classify_strategy(
    resolved: bool,
    forced: bool,
    ego_transformed: bool,
    superego_transformed: bool,
) -> SynthesisStrategy {
    if !resolved {
        return SynthesisStrategy::NoSynthesis;
    }
    if forced {
        return SynthesisStrategy::Compromise;
    }
    match (ego_transformed, superego_transformed) {
        (true, true) => SynthesisStrategy::DialecticalSynthesis,
        (true, false) => SynthesisStrategy::GhostDominates,
        (false, true) => SynthesisStrategy::LearnerDominates,
        (false, false) => SynthesisStrategy::Compromise,
    }
}

pub fn classify_recognition(
    resolved: bool,
    ego_transformed: bool,
    superego_transformed: bool,
) -> RecognitionType {
    if !resolved {
        RecognitionType::Existential
    } else if ego_transformed && superego_transformed {
        RecognitionType::Metacognitive
    } else {
        RecognitionType::Pedagogical
    }
}

/// Runs the dialectical exchange between the two roles and records the
/// outcome as a recognition moment.
pub struct DialecticalNegotiator {
    generator: Arc<SuggestionGenerator>,
    reviewer: Arc<CritiqueReviewer>,
    config: DialecticalConfig,
    store: Option<Arc<SqliteMemoryStore>>,
    recent: Option<Arc<RecentMoments>>,
}

impl DialecticalNegotiator {
    pub fn new(
        generator: Arc<SuggestionGenerator>,
        reviewer: Arc<CritiqueReviewer>,
        config: DialecticalConfig,
    ) -> Self {
        Self {
            generator,
            reviewer,
            config,
            store: None,
            recent: None,
        }
    }

    /// Persist recognition moments to this store.
    pub fn with_store(mut self, store: Arc<SqliteMemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Also keep moments in a bounded in-memory buffer.
    pub fn with_recent(mut self, recent: Arc<RecentMoments>) -> Self {
        self.recent = Some(recent);
        self
    }

    pub fn config(&self) -> &DialecticalConfig {
        &self.config
    }

    /// Negotiate a draft suggestion dialectically.
    ///
    /// Model failures fall back to the heuristic classifier and never fail
    /// the call. The only error is a missing writing pad when a store is
    /// configured; other store failures are logged and reported through
    /// [`DialecticalResult::persisted`].
    #[instrument(skip(self, draft, learner, memory, params))]
    pub async fn negotiate_dialectically(
        &self,
        learner_id: &str,
        draft: &str,
        learner: &LearnerContext,
        memory: Option<&MemoryContext>,
        params: &DialecticalParams,
    ) -> Result<DialecticalResult> {
        let resolved = params.resolve(&self.config);
        let pad = self.load_pad(learner_id)?;

        let mut transcript = vec![TranscriptEntry::Thesis {
            agent: "ego".into(),
            position: draft.to_string(),
        }];

        if resolved.compliance < resolved.mute_below {
            debug!(compliance = resolved.compliance, "reviewer muted");
            transcript.push(TranscriptEntry::Muted {
                compliance: resolved.compliance,
            });
            return Ok(DialecticalResult::no_conflict(draft, transcript, 0.0));
        }

        let memory_text = memory.filter(|m| !m.is_empty()).map(MemoryContext::render);
        let memory_text = memory_text.as_deref();

        let critique = self
            .reviewer
            .critique_structured(draft, learner, memory_text)
            .await;
        let raw_severity = critique.value.severity;
        let severity = (raw_severity * resolved.compliance).clamp(0.0, 1.0);
        let disapproves = critique.value.disapproves && severity >= resolved.rejection_threshold;
        transcript.push(TranscriptEntry::Antithesis {
            agent: "superego".into(),
            critique: critique.value.critique.clone(),
            principle: critique.value.principle.clone(),
            raw_severity,
            severity,
            disapproves,
            source: critique.source,
        });

        if !disapproves {
            info!(severity, "draft approved without conflict");
            return Ok(DialecticalResult::no_conflict(draft, transcript, severity));
        }
        let critique = critique.value;

        let mut current = draft.to_string();
        let mut concerns: Vec<String> = Vec::new();
        let mut accepted = false;
        let mut rounds_used = 0;
        let mut acknowledgment = String::new();
        let mut ego_transformation: Option<String> = None;
        let mut superego_transformation: Option<String> = None;

        for round in 1..=resolved.max_rounds {
            rounds_used = round;

            let response = self
                .generator
                .respond_to_critique(&current, &critique, &concerns, learner, memory_text)
                .await;
            transcript.push(TranscriptEntry::EgoResponse {
                round,
                acknowledgment: response.value.acknowledgment.clone(),
                revision: response.value.revision.clone(),
                transformation: response.value.transformation.clone(),
                source: response.source,
            });
            if is_genuine_transformation(&response.value.transformation) {
                ego_transformation = Some(response.value.transformation.clone());
            }
            acknowledgment = response.value.acknowledgment.clone();
            current = response.value.revision;

            let review = self
                .reviewer
                .evaluate_revision(draft, &critique, &acknowledgment, &current)
                .await;
            transcript.push(TranscriptEntry::SuperegoEvaluation {
                round,
                accepts: review.value.accepts,
                remaining_concerns: review.value.remaining_concerns.clone(),
                transformation: review.value.transformation.clone(),
                source: review.source,
            });
            if is_genuine_transformation(&review.value.transformation) {
                superego_transformation = Some(review.value.transformation.clone());
            }

            if review.value.accepts {
                accepted = true;
                break;
            }
            concerns = review.value.remaining_concerns;
            debug!(round, concerns = concerns.len(), "revision not accepted");
        }

        let forced = !accepted && !resolved.allow_genuine_conflict;
        let resolution = if accepted || forced {
            Some(current.clone())
        } else {
            None
        };
        if forced {
            transcript.push(TranscriptEntry::ForcedCompromise {
                rounds: rounds_used,
            });
        } else if !accepted {
            transcript.push(TranscriptEntry::GenuineConflict {
                rounds: rounds_used,
            });
        }

        let ego_transformed = ego_transformation.is_some();
        let superego_transformed = superego_transformation.is_some();
        let mutual = accepted && !acknowledgment.trim().is_empty();
        let strategy =
            classify_strategy(resolution.is_some(), forced, ego_transformed, superego_transformed);
        let recognition_type =
            classify_recognition(resolution.is_some(), ego_transformed, superego_transformed);
        let depth = struggle_depth(severity, rounds_used, mutual);
        let transformative = resolution.is_some()
            && (ego_transformed || superego_transformed)
            && strategy != SynthesisStrategy::Compromise;

        let moment = RecognitionMoment {
            id: Uuid::new_v4(),
            writing_pad_id: pad.as_ref().map_or_else(Uuid::nil, |p| p.id),
            session_id: params
                .session_id
                .clone()
                .or_else(|| learner.session_id.clone()),
            created_at: Utc::now(),
            thesis: Position::new("ego", draft, "initial suggestion"),
            antithesis: Position::new("superego", critique.critique.as_str(), critique.principle.as_str()),
            synthesis_resolution: resolution.clone(),
            ego_transformation,
            superego_transformation,
            learner_insight: None,
            mutual_acknowledgment: mutual,
            recognition_type,
            struggle_depth: depth,
            persistence_layer: PersistenceLayer::Conscious,
            synthesis_strategy: strategy,
            transformative,
            parameters: moment_parameters(&resolved, raw_severity, severity, &transcript),
            consolidated_at: None,
        };

        let persisted = pad.is_some() && self.persist(learner_id, &moment);
        if let Some(ref recent) = self.recent {
            if let Err(e) = recent.record(learner_id, moment.clone()) {
                warn!(error = %e, "failed to buffer recognition moment");
            }
        }

        info!(
            strategy = %strategy,
            recognition_type = %recognition_type,
            rounds = rounds_used,
            struggle_depth = depth,
            persisted,
            "dialectical negotiation complete"
        );

        Ok(DialecticalResult {
            synthesized: resolution.is_some(),
            resolution,
            recognition_moment: Some(moment),
            transcript,
            strategy,
            rounds: rounds_used,
            severity,
            struggle_depth: depth,
            mutual_acknowledgment: mutual,
            persisted,
        })
    }

    /// The learner's pad when a store is configured. A missing pad is fatal;
    /// an unavailable store only disables persistence.
    fn load_pad(&self, learner_id: &str) -> Result<Option<WritingPad>> {
        let Some(ref store) = self.store else {
            return Ok(None);
        };
        match store.require_writing_pad(learner_id) {
            Ok(pad) => Ok(Some(pad)),
            Err(e @ Error::MissingWritingPad { .. }) => Err(e),
            Err(e) => {
                warn!(error = %e, "memory store unavailable, moment will not be persisted");
                Ok(None)
            }
        }
    }

    /// Insert the moment and fold it into the pad metrics. The pad is read
    /// again here because maintenance may have written other tiers while
    /// the exchange was awaiting the models.
    fn persist(&self, learner_id: &str, moment: &RecognitionMoment) -> bool {
        let Some(ref store) = self.store else {
            return false;
        };
        if let Err(e) = store.insert_moment(moment) {
            warn!(error = %e, "failed to persist recognition moment");
            return false;
        }

        let pad = match store.require_writing_pad(learner_id) {
            Ok(pad) => pad,
            Err(e) => {
                warn!(error = %e, "failed to reload pad for metrics");
                return false;
            }
        };
        let metrics = pad.metrics.with_moment(moment);
        let pad = pad.with_metrics(metrics).touched(moment.created_at);
        if let Err(e) = store.save_writing_pad(&pad) {
            warn!(error = %e, "failed to update pad metrics");
            return false;
        }
        true
    }
}

fn moment_parameters(
    resolved: &ResolvedParams,
    raw_severity: f64,
    severity: f64,
    transcript: &[TranscriptEntry],
) -> serde_json::Value {
    json!({
        "compliance": resolved.compliance,
        "max_rounds": resolved.max_rounds,
        "allow_genuine_conflict": resolved.allow_genuine_conflict,
        "rejection_threshold": resolved.rejection_threshold,
        "raw_severity": raw_severity,
        "severity": severity,
        "transcript": transcript,
    })
}
