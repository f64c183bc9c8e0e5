//! Bounded per-learner buffer of recent recognition moments.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::types::RecognitionMoment;
use crate::error::{Error, Result};

/// Learners buffered at once unless configured otherwise.
pub const DEFAULT_LEARNER_LIMIT: usize = 1024;

#[derive(Default)]
struct Buffers {
    tick: u64,
    by_learner: HashMap<String, LearnerBuffer>,
}

#[derive(Default)]
struct LearnerBuffer {
    last_recorded: u64,
    moments: VecDeque<RecognitionMoment>,
}

/// Keeps the latest moments per learner, evicting the oldest when full.
///
/// The number of learners is bounded too: recording for a new learner
/// when the limit is reached drops the learner recorded least recently.
pub struct RecentMoments {
    capacity: usize,
    learner_limit: usize,
    buffers: Mutex<Buffers>,
}

impl RecentMoments {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            learner_limit: DEFAULT_LEARNER_LIMIT,
            buffers: Mutex::new(Buffers::default()),
        }
    }

    pub fn with_learner_limit(mut self, learner_limit: usize) -> Self {
        self.learner_limit = learner_limit.max(1);
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn learner_limit(&self) -> usize {
        self.learner_limit
    }

    /// Append a moment; returns the evicted one, if any.
    pub fn record(
        &self,
        learner_id: &str,
        moment: RecognitionMoment,
    ) -> Result<Option<RecognitionMoment>> {
        if self.capacity == 0 {
            return Ok(Some(moment));
        }

        let mut buffers = self.lock()?;
        buffers.tick += 1;
        let tick = buffers.tick;

        if !buffers.by_learner.contains_key(learner_id)
            && buffers.by_learner.len() >= self.learner_limit
        {
            let stalest = buffers
                .by_learner
                .iter()
                .min_by_key(|(_, b)| b.last_recorded)
                .map(|(id, _)| id.clone());
            if let Some(id) = stalest {
                buffers.by_learner.remove(&id);
            }
        }

        let buffer = buffers.by_learner.entry(learner_id.to_string()).or_default();
        buffer.last_recorded = tick;
        let evicted = if buffer.moments.len() >= self.capacity {
            buffer.moments.pop_front()
        } else {
            None
        };
        buffer.moments.push_back(moment);
        Ok(evicted)
    }

    /// Buffered moments for a learner, oldest first.
    pub fn recent(&self, learner_id: &str) -> Result<Vec<RecognitionMoment>> {
        let buffers = self.lock()?;
        Ok(buffers
            .by_learner
            .get(learner_id)
            .map(|b| b.moments.iter().cloned().collect())
            .unwrap_or_default())
    }

    pub fn clear(&self, learner_id: &str) -> Result<()> {
        self.lock()?.by_learner.remove(learner_id);
        Ok(())
    }

    /// Learners with a buffer.
    pub fn learner_count(&self) -> usize {
        self.lock().map(|b| b.by_learner.len()).unwrap_or(0)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Buffers>> {
        self.buffers
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock recent moments: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::types::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn moment(depth: f64) -> RecognitionMoment {
        RecognitionMoment {
            id: Uuid::new_v4(),
            writing_pad_id: Uuid::new_v4(),
            session_id: None,
            created_at: Utc::now(),
            thesis: Position::default(),
            antithesis: Position::default(),
            synthesis_resolution: None,
            ego_transformation: None,
            superego_transformation: None,
            learner_insight: None,
            mutual_acknowledgment: false,
            recognition_type: RecognitionType::Existential,
            struggle_depth: depth,
            persistence_layer: PersistenceLayer::Conscious,
            synthesis_strategy: SynthesisStrategy::NoSynthesis,
            transformative: false,
            parameters: serde_json::Value::Null,
            consolidated_at: None,
        }
    }

    #[test]
    fn test_evicts_oldest_at_capacity() {
        let recent = RecentMoments::new(2);
        assert!(recent.record("a", moment(0.1)).unwrap().is_none());
        assert!(recent.record("a", moment(0.2)).unwrap().is_none());
        let evicted = recent.record("a", moment(0.3)).unwrap().unwrap();
        assert_eq!(evicted.struggle_depth, 0.1);

        let depths: Vec<f64> = recent.recent("a").unwrap().iter().map(|m| m.struggle_depth).collect();
        assert_eq!(depths, vec![0.2, 0.3]);
    }

    #[test]
    fn test_learners_are_isolated() {
        let recent = RecentMoments::new(1);
        recent.record("a", moment(0.1)).unwrap();
        recent.record("b", moment(0.2)).unwrap();
        assert_eq!(recent.recent("a").unwrap().len(), 1);
        recent.clear("a").unwrap();
        assert!(recent.recent("a").unwrap().is_empty());
        assert_eq!(recent.recent("b").unwrap().len(), 1);
    }

    #[test]
    fn test_least_recent_learner_dropped_at_limit() {
        let recent = RecentMoments::new(2).with_learner_limit(2);
        recent.record("a", moment(0.1)).unwrap();
        recent.record("b", moment(0.2)).unwrap();
        recent.record("a", moment(0.3)).unwrap();
        recent.record("c", moment(0.4)).unwrap();

        assert_eq!(recent.learner_count(), 2);
        assert!(recent.recent("b").unwrap().is_empty());
        assert_eq!(recent.recent("a").unwrap().len(), 2);
        assert_eq!(recent.recent("c").unwrap().len(), 1);
    }
}
