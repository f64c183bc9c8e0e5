//! Per-session engagement flow.

use serde::{Deserialize, Serialize};

use crate::memory::{LearnerEvent, LearnerEventType, RecognitionMoment};

/// Struggle-depth band considered productive.
pub const IDEAL_BAND: (f64, f64) = (0.3, 0.7);

/// Moments plus events at which engagement density saturates.
pub const ENGAGEMENT_SATURATION: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowState {
    Deepening,
    Emerging,
    Plateauing,
    Disrupted,
}

impl FlowState {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.7 {
            Self::Deepening
        } else if score >= 0.5 {
            Self::Emerging
        } else if score >= 0.3 {
            Self::Plateauing
        } else {
            Self::Disrupted
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deepening => "deepening",
            Self::Emerging => "emerging",
            Self::Plateauing => "plateauing",
            Self::Disrupted => "disrupted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionFlow {
    pub session_id: String,
    pub moment_count: usize,
    pub event_count: usize,
    /// Fraction of moments with struggle depth inside the ideal band
    pub band_ratio: f64,
    /// Fraction of moments that reached a resolution
    pub synthesis_ratio: f64,
    /// Fraction of resistance events later followed by a breakthrough
    pub resistance_productivity: f64,
    pub engagement_density: f64,
    pub composite: f64,
    pub state: FlowState,
}

/// Flow for one session. Records from other sessions are ignored.
pub fn session_flow(
    session_id: &str,
    moments: &[RecognitionMoment],
    events: &[LearnerEvent],
) -> SessionFlow {
    let moments: Vec<&RecognitionMoment> = moments
        .iter()
        .filter(|m| m.session_id.as_deref() == Some(session_id))
        .collect();
    let mut events: Vec<&LearnerEvent> = events
        .iter()
        .filter(|e| e.session_id.as_deref() == Some(session_id))
        .collect();
    events.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let ratio = |count: usize, total: usize| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    };

    let in_band = moments
        .iter()
        .filter(|m| (IDEAL_BAND.0..=IDEAL_BAND.1).contains(&m.struggle_depth))
        .count();
    let band_ratio = ratio(in_band, moments.len());
    let synthesis_ratio = ratio(moments.iter().filter(|m| m.is_resolved()).count(), moments.len());

    let resistance_productivity = resistance_productivity(&events);
    let engagement_density =
        ((moments.len() + events.len()) as f64 / ENGAGEMENT_SATURATION).min(1.0);

    let composite = 0.3 * band_ratio
        + 0.3 * synthesis_ratio
        + 0.2 * resistance_productivity
        + 0.2 * engagement_density;

    SessionFlow {
        session_id: session_id.to_string(),
        moment_count: moments.len(),
        event_count: events.len(),
        band_ratio,
        synthesis_ratio,
        resistance_productivity,
        engagement_density,
        composite,
        state: FlowState::from_score(composite),
    }
}

/// Neutral 0.5 when the session had no resistance.
fn resistance_productivity(ordered: &[&LearnerEvent]) -> f64 {
    let resistances: Vec<usize> = ordered
        .iter()
        .enumerate()
        .filter(|(_, e)| e.event_type() == LearnerEventType::Resistance)
        .map(|(i, _)| i)
        .collect();
    if resistances.is_empty() {
        return 0.5;
    }

    let productive = resistances
        .iter()
        .filter(|&&i| {
            ordered[i + 1..]
                .iter()
                .any(|e| e.event_type() == LearnerEventType::Breakthrough)
        })
        .count();
    productive as f64 / resistances.len() as f64
}
