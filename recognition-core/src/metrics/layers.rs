use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::memory::PersistenceLayer;

/// Moments per persistence layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerProgression {
    pub conscious: u64,
    pub preconscious: u64,
    pub unconscious: u64,
    pub total: u64,
    /// Share of moments that reached the unconscious layer
    pub consolidation_ratio: f64,
}

impl LayerProgression {
    pub fn from_counts(counts: &HashMap<PersistenceLayer, u64>) -> Self {
        let get = |layer| counts.get(&layer).copied().unwrap_or(0);
        let conscious = get(PersistenceLayer::Conscious);
        let preconscious = get(PersistenceLayer::Preconscious);
        let unconscious = get(PersistenceLayer::Unconscious);
        let total = conscious + preconscious + unconscious;
        Self {
            conscious,
            preconscious,
            unconscious,
            total,
            consolidation_ratio: if total == 0 {
                0.0
            } else {
                unconscious as f64 / total as f64
            },
        }
    }
}
