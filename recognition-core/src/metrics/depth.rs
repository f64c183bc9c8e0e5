//! Recognition depth and its trend.

use serde::{Deserialize, Serialize};

use crate::memory::{LearnerEvent, LearnerEventType, RecognitionMoment, WritingPad};

/// Moments per trend window.
pub const TREND_WINDOW: usize = 5;

/// Mean difference beyond which the trend is not stable.
pub const TREND_TOLERANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthTrend {
    Rising,
    Falling,
    Stable,
    /// Not enough moments to compare two windows
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionDepth {
    pub composite_depth: f64,
    pub dialectical_depth: f64,
    pub mutual_transformation_score: f64,
    pub pedagogical_attunement: f64,
    /// Breakthrough events over all events
    pub breakthrough_density: f64,
    pub trend: DepthTrend,
    pub moment_count: usize,
}

pub fn compute_depth(
    pad: &WritingPad,
    moments: &[RecognitionMoment],
    events: &[LearnerEvent],
) -> RecognitionDepth {
    let breakthroughs = events
        .iter()
        .filter(|e| e.event_type() == LearnerEventType::Breakthrough)
        .count();
    let breakthrough_density = if events.is_empty() {
        0.0
    } else {
        breakthroughs as f64 / events.len() as f64
    };

    let m = &pad.metrics;
    let composite_depth = 0.3 * m.dialectical_depth
        + 0.3 * m.mutual_transformation_score
        + 0.2 * m.pedagogical_attunement
        + 0.2 * breakthrough_density;

    RecognitionDepth {
        composite_depth: composite_depth.clamp(0.0, 1.0),
        dialectical_depth: m.dialectical_depth,
        mutual_transformation_score: m.mutual_transformation_score,
        pedagogical_attunement: m.pedagogical_attunement,
        breakthrough_density,
        trend: depth_trend(moments),
        moment_count: moments.len(),
    }
}

/// Compare the mean struggle depth of the latest window with the one before.
pub fn depth_trend(moments: &[RecognitionMoment]) -> DepthTrend {
    let mut ordered: Vec<&RecognitionMoment> = moments.iter().collect();
    ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let recent: Vec<f64> = ordered.iter().take(TREND_WINDOW).map(|m| m.struggle_depth).collect();
    let previous: Vec<f64> = ordered
        .iter()
        .skip(TREND_WINDOW)
        .take(TREND_WINDOW)
        .map(|m| m.struggle_depth)
        .collect();

    if recent.is_empty() || previous.is_empty() {
        return DepthTrend::None;
    }

    let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
    let delta = mean(&recent) - mean(&previous);
    if delta > TREND_TOLERANCE {
        DepthTrend::Rising
    } else if delta < -TREND_TOLERANCE {
        DepthTrend::Falling
    } else {
        DepthTrend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tests::moment_at;
    use chrono::{Duration, Utc};

    #[test]
    fn test_fresh_learner_depth() {
        let pad = WritingPad::new("learner-1", 20);
        let depth = compute_depth(&pad, &[], &[]);
        assert_eq!(depth.composite_depth, 0.0);
        assert_eq!(depth.trend, DepthTrend::None);
    }

    #[test]
    fn test_trend_needs_two_windows() {
        let pad = WritingPad::new("learner-1", 20);
        let now = Utc::now();
        let moments: Vec<_> = (0..5)
            .map(|i| moment_at(&pad, now + Duration::minutes(i), 0.5))
            .collect();
        assert_eq!(depth_trend(&moments), DepthTrend::None);
    }

    #[test]
    fn test_trend_rising_and_falling() {
        let pad = WritingPad::new("learner-1", 20);
        let now = Utc::now();
        let rising: Vec<_> = (0..10)
            .map(|i| moment_at(&pad, now + Duration::minutes(i), if i < 5 { 0.2 } else { 0.8 }))
            .collect();
        assert_eq!(depth_trend(&rising), DepthTrend::Rising);

        let falling: Vec<_> = (0..8)
            .map(|i| moment_at(&pad, now + Duration::minutes(i), if i < 3 { 0.9 } else { 0.3 }))
            .collect();
        assert_eq!(depth_trend(&falling), DepthTrend::Falling);

        let flat: Vec<_> = (0..10)
            .map(|i| moment_at(&pad, now + Duration::minutes(i), 0.5))
            .collect();
        assert_eq!(depth_trend(&flat), DepthTrend::Stable);
    }

    #[test]
    fn test_composite_weights() {
        let mut pad = WritingPad::new("learner-1", 20);
        pad.metrics.dialectical_depth = 1.0;
        pad.metrics.mutual_transformation_score = 1.0;
        pad.metrics.pedagogical_attunement = 1.0;
        let depth = compute_depth(&pad, &[], &[]);
        assert!((depth.composite_depth - 0.8).abs() < 1e-9);
    }
}
