//! Read-only recognition metrics.
//!
//! Derived on demand from a learner's writing pad, recognition moments,
//! learner events and sessions. Nothing here writes to the store; the
//! pipeline persists newly achieved milestones so they stay achieved.

mod continuity;
mod depth;
mod flow;
mod layers;
mod milestones;

pub use continuity::{compute_continuity, Continuity};
pub use depth::{compute_depth, depth_trend, DepthTrend, RecognitionDepth, TREND_TOLERANCE, TREND_WINDOW};
pub use flow::{session_flow, FlowState, SessionFlow, ENGAGEMENT_SATURATION, IDEAL_BAND};
pub use layers::LayerProgression;
pub use milestones::{
    evaluate_milestones, merge_with_records, Achievement, Milestone, MilestoneStatus, HIGH_DEPTH,
    METACOGNITIVE_COUNT, SUSTAINED_DEPTH_SESSIONS,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::memory::SqliteMemoryStore;

/// Every metric for one learner at once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionSnapshot {
    pub learner_id: String,
    pub depth: RecognitionDepth,
    pub milestones: Vec<MilestoneStatus>,
    pub layers: LayerProgression,
    pub continuity: Continuity,
    pub flows: Vec<SessionFlow>,
}

impl RecognitionSnapshot {
    pub fn achieved(&self) -> impl Iterator<Item = Milestone> + '_ {
        self.milestones
            .iter()
            .filter(|s| s.achieved)
            .map(|s| s.milestone)
    }
}

/// Computes metrics from the memory store.
#[derive(Clone)]
pub struct RecognitionMetrics {
    store: Arc<SqliteMemoryStore>,
}

impl RecognitionMetrics {
    pub fn new(store: Arc<SqliteMemoryStore>) -> Self {
        Self { store }
    }

    pub fn depth(&self, learner_id: &str) -> Result<RecognitionDepth> {
        let pad = self.store.require_writing_pad(learner_id)?;
        let moments = self.store.moments_for_pad(pad.id)?;
        let events = self.store.events_for_learner(learner_id)?;
        Ok(compute_depth(&pad, &moments, &events))
    }

    /// Evaluated milestones, with persisted achievements taking precedence.
    pub fn milestones(&self, learner_id: &str) -> Result<Vec<MilestoneStatus>> {
        let pad = self.store.require_writing_pad(learner_id)?;
        let moments = self.store.moments_for_pad(pad.id)?;
        let records = self.store.milestones_for_learner(learner_id)?;
        Ok(merge_with_records(evaluate_milestones(&pad, &moments), &records))
    }

    pub fn flow(&self, learner_id: &str, session_id: &str) -> Result<SessionFlow> {
        let pad = self.store.require_writing_pad(learner_id)?;
        let moments = self.store.moments_for_pad(pad.id)?;
        let events = self.store.events_for_learner(learner_id)?;
        Ok(session_flow(session_id, &moments, &events))
    }

    /// Flow for every known session, oldest first.
    pub fn session_flows(&self, learner_id: &str) -> Result<Vec<SessionFlow>> {
        let pad = self.store.require_writing_pad(learner_id)?;
        let moments = self.store.moments_for_pad(pad.id)?;
        let events = self.store.events_for_learner(learner_id)?;
        let sessions = self.store.sessions_for_learner(learner_id)?;
        Ok(sessions
            .iter()
            .map(|s| session_flow(&s.session_id, &moments, &events))
            .collect())
    }

    pub fn continuity(&self, learner_id: &str) -> Result<Continuity> {
        let pad = self.store.require_writing_pad(learner_id)?;
        let moments = self.store.moments_for_pad(pad.id)?;
        let sessions = self.store.sessions_for_learner(learner_id)?;
        Ok(compute_continuity(&sessions, &moments))
    }

    pub fn layer_progression(&self, learner_id: &str) -> Result<LayerProgression> {
        let pad = self.store.require_writing_pad(learner_id)?;
        Ok(LayerProgression::from_counts(&self.store.layer_counts(pad.id)?))
    }

    /// All metrics from a single read of the learner's records.
    pub fn snapshot(&self, learner_id: &str) -> Result<RecognitionSnapshot> {
        let pad = self.store.require_writing_pad(learner_id)?;
        let moments = self.store.moments_for_pad(pad.id)?;
        let events = self.store.events_for_learner(learner_id)?;
        let sessions = self.store.sessions_for_learner(learner_id)?;
        let records = self.store.milestones_for_learner(learner_id)?;

        Ok(RecognitionSnapshot {
            learner_id: learner_id.to_string(),
            depth: compute_depth(&pad, &moments, &events),
            milestones: merge_with_records(evaluate_milestones(&pad, &moments), &records),
            layers: LayerProgression::from_counts(&self.store.layer_counts(pad.id)?),
            continuity: compute_continuity(&sessions, &moments),
            flows: sessions
                .iter()
                .map(|s| session_flow(&s.session_id, &moments, &events))
                .collect(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::Error;
    use crate::memory::{
        PersistenceLayer, Position, RecognitionMoment, RecognitionType, SynthesisStrategy,
        WritingPad,
    };
    use chrono::{DateTime, Utc};
    use serde_json::json;
    use uuid::Uuid;

    /// A resolved pedagogical moment on `pad`.
    pub(crate) fn moment_at(pad: &WritingPad, created_at: DateTime<Utc>, depth: f64) -> RecognitionMoment {
        RecognitionMoment {
            id: Uuid::new_v4(),
            writing_pad_id: pad.id,
            session_id: None,
            created_at,
            thesis: Position::new("ego", "Try writing the loop first", "initial suggestion"),
            antithesis: Position::new("superego", "Too prescriptive", "learner_autonomy"),
            synthesis_resolution: Some("What could the loop look like?".into()),
            ego_transformation: None,
            superego_transformation: None,
            learner_insight: None,
            mutual_acknowledgment: false,
            recognition_type: RecognitionType::Pedagogical,
            struggle_depth: depth,
            persistence_layer: PersistenceLayer::Conscious,
            synthesis_strategy: SynthesisStrategy::GhostDominates,
            transformative: false,
            parameters: json!({}),
            consolidated_at: None,
        }
    }

    #[test]
    fn test_missing_pad_is_an_error() {
        let store = Arc::new(SqliteMemoryStore::in_memory().unwrap());
        let metrics = RecognitionMetrics::new(store);
        assert!(matches!(
            metrics.depth("nobody"),
            Err(Error::MissingWritingPad { .. })
        ));
    }

    #[test]
    fn test_snapshot_of_fresh_learner() {
        let store = Arc::new(SqliteMemoryStore::in_memory().unwrap());
        store.get_or_initialize_writing_pad("learner-1", 20).unwrap();
        let metrics = RecognitionMetrics::new(store);

        let snapshot = metrics.snapshot("learner-1").unwrap();
        assert_eq!(snapshot.depth.composite_depth, 0.0);
        assert_eq!(snapshot.depth.trend, DepthTrend::None);
        assert_eq!(snapshot.achieved().count(), 0);
        assert_eq!(snapshot.layers.total, 0);
        assert!(snapshot.flows.is_empty());
    }

    #[test]
    fn test_snapshot_reads_moments_and_sessions() {
        let store = Arc::new(SqliteMemoryStore::in_memory().unwrap());
        let pad = store.get_or_initialize_writing_pad("learner-1", 20).unwrap();
        let now = Utc::now();
        store.touch_session("learner-1", "s-1", now).unwrap();

        let mut moment = moment_at(&pad, now, 0.5);
        moment.session_id = Some("s-1".into());
        moment.recognition_type = RecognitionType::Existential;
        moment.synthesis_resolution = None;
        store.insert_moment(&moment).unwrap();

        let metrics = RecognitionMetrics::new(store);
        let snapshot = metrics.snapshot("learner-1").unwrap();
        assert_eq!(snapshot.layers.conscious, 1);
        assert_eq!(snapshot.continuity.recognition_sessions, 1);
        assert_eq!(snapshot.flows.len(), 1);
        assert_eq!(snapshot.flows[0].synthesis_ratio, 0.0);
        assert!(snapshot
            .achieved()
            .any(|m| m == Milestone::FirstExistentialMoment));
    }
}
