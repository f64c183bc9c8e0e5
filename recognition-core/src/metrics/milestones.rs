//! Milestone checks.
//!
//! Every check derives its achievement time from the qualifying record, so
//! re-evaluating the same history gives the same answer. Achievements are
//! also persisted, which keeps them achieved even if the underlying records
//! change later.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::memory::{MilestoneRecord, RecognitionMoment, RecognitionType, SynthesisStrategy, WritingPad};

/// Struggle depth that counts as high for the sustained-depth milestone.
pub const HIGH_DEPTH: f64 = 0.6;

/// Distinct sessions with high depth needed for the sustained-depth milestone.
pub const SUSTAINED_DEPTH_SESSIONS: usize = 5;

/// Metacognitive moments needed for the metacognitive milestone.
pub const METACOGNITIVE_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    FirstExistentialMoment,
    FirstMutualAcknowledgment,
    FirstConsolidation,
    LearningStyleIdentified,
    MetacognitiveTriad,
    FirstDialecticalSynthesis,
    SustainedDepth,
}

impl Milestone {
    pub const ALL: [Milestone; 7] = [
        Self::FirstExistentialMoment,
        Self::FirstMutualAcknowledgment,
        Self::FirstConsolidation,
        Self::LearningStyleIdentified,
        Self::MetacognitiveTriad,
        Self::FirstDialecticalSynthesis,
        Self::SustainedDepth,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstExistentialMoment => "first_existential_moment",
            Self::FirstMutualAcknowledgment => "first_mutual_acknowledgment",
            Self::FirstConsolidation => "first_consolidation",
            Self::LearningStyleIdentified => "learning_style_identified",
            Self::MetacognitiveTriad => "metacognitive_triad",
            Self::FirstDialecticalSynthesis => "first_dialectical_synthesis",
            Self::SustainedDepth => "sustained_depth",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::FirstExistentialMoment => "First conflict left genuinely unresolved",
            Self::FirstMutualAcknowledgment => "First negotiation ending in mutual acknowledgment",
            Self::FirstConsolidation => "First moment consolidated into permanent memory",
            Self::LearningStyleIdentified => "Preferred learning style identified",
            Self::MetacognitiveTriad => "Three moments where both sides transformed",
            Self::FirstDialecticalSynthesis => "First full dialectical synthesis",
            Self::SustainedDepth => "High struggle depth across five distinct sessions",
        }
    }
}

impl std::fmt::Display for Milestone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The record that achieved a milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Achievement {
    pub achieved_at: DateTime<Utc>,
    pub evidence: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneStatus {
    pub milestone: Milestone,
    pub achieved: bool,
    pub achieved_at: Option<DateTime<Utc>>,
    pub evidence: Option<String>,
}

impl MilestoneStatus {
    pub fn to_record(&self, learner_id: &str) -> Option<MilestoneRecord> {
        Some(MilestoneRecord {
            learner_id: learner_id.to_string(),
            milestone: self.milestone.as_str().to_string(),
            achieved_at: self.achieved_at?,
            evidence: self.evidence.clone(),
        })
    }
}

/// Evaluate every milestone against a learner's history.
pub fn evaluate_milestones(pad: &WritingPad, moments: &[RecognitionMoment]) -> Vec<MilestoneStatus> {
    let mut ordered: Vec<&RecognitionMoment> = moments.iter().collect();
    ordered.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    Milestone::ALL
        .into_iter()
        .map(|milestone| {
            let achievement = check(milestone, pad, &ordered);
            MilestoneStatus {
                milestone,
                achieved: achievement.is_some(),
                achieved_at: achievement.as_ref().map(|a| a.achieved_at),
                evidence: achievement.and_then(|a| a.evidence),
            }
        })
        .collect()
}

fn check(milestone: Milestone, pad: &WritingPad, ordered: &[&RecognitionMoment]) -> Option<Achievement> {
    let first = |pred: fn(&RecognitionMoment) -> bool| {
        ordered.iter().copied().find(|m| pred(m)).map(from_moment)
    };

    match milestone {
        Milestone::FirstExistentialMoment => {
            first(|m| m.recognition_type == RecognitionType::Existential)
        }
        Milestone::FirstMutualAcknowledgment => first(|m| m.mutual_acknowledgment),
        Milestone::FirstDialecticalSynthesis => {
            first(|m| m.synthesis_strategy == SynthesisStrategy::DialecticalSynthesis)
        }
        Milestone::FirstConsolidation => ordered
            .iter()
            .filter_map(|m| m.consolidated_at.map(|at| (at, m.id)))
            .min_by_key(|(at, _)| *at)
            .map(|(at, id)| Achievement {
                achieved_at: at,
                evidence: Some(id.to_string()),
            }),
        Milestone::LearningStyleIdentified => {
            let archetype = &pad.unconscious.learner_archetype;
            archetype
                .preferred_learning_style
                .as_ref()
                .map(|style| Achievement {
                    achieved_at: archetype.last_updated.unwrap_or(pad.updated_at),
                    evidence: Some(style.clone()),
                })
        }
        Milestone::MetacognitiveTriad => ordered
            .iter()
            .filter(|m| m.recognition_type == RecognitionType::Metacognitive)
            .nth(METACOGNITIVE_COUNT - 1)
            .map(|m| from_moment(m)),
        Milestone::SustainedDepth => {
            let mut sessions: HashSet<&str> = HashSet::new();
            for moment in ordered.iter().copied() {
                if moment.struggle_depth < HIGH_DEPTH {
                    continue;
                }
                if let Some(session) = moment.session_id.as_deref() {
                    sessions.insert(session);
                    if sessions.len() >= SUSTAINED_DEPTH_SESSIONS {
                        return Some(from_moment(moment));
                    }
                }
            }
            None
        }
    }
}

fn from_moment(moment: &RecognitionMoment) -> Achievement {
    Achievement {
        achieved_at: moment.created_at,
        evidence: Some(moment.id.to_string()),
    }
}

/// Combine persisted achievements with a fresh evaluation. A persisted
/// achievement always wins, so milestones never become un-achieved.
pub fn merge_with_records(
    evaluated: Vec<MilestoneStatus>,
    records: &[MilestoneRecord],
) -> Vec<MilestoneStatus> {
    evaluated
        .into_iter()
        .map(|status| {
            match records
                .iter()
                .find(|r| r.milestone == status.milestone.as_str())
            {
                Some(record) => MilestoneStatus {
                    milestone: status.milestone,
                    achieved: true,
                    achieved_at: Some(record.achieved_at),
                    evidence: record.evidence.clone(),
                },
                None => status,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tests::moment_at;
    use chrono::Duration;

    fn achieved(statuses: &[MilestoneStatus], milestone: Milestone) -> bool {
        statuses
            .iter()
            .any(|s| s.milestone == milestone && s.achieved)
    }

    #[test]
    fn test_fresh_learner_has_nothing() {
        let pad = WritingPad::new("learner-1", 20);
        let statuses = evaluate_milestones(&pad, &[]);
        assert_eq!(statuses.len(), Milestone::ALL.len());
        assert!(statuses.iter().all(|s| !s.achieved));
    }

    #[test]
    fn test_first_existential_uses_earliest_moment() {
        let pad = WritingPad::new("learner-1", 20);
        let now = Utc::now();
        let mut later = moment_at(&pad, now, 0.5);
        later.recognition_type = RecognitionType::Existential;
        let mut earlier = moment_at(&pad, now - Duration::days(1), 0.5);
        earlier.recognition_type = RecognitionType::Existential;

        let statuses = evaluate_milestones(&pad, &[later, earlier.clone()]);
        let status = statuses
            .iter()
            .find(|s| s.milestone == Milestone::FirstExistentialMoment)
            .unwrap();
        assert_eq!(status.achieved_at, Some(earlier.created_at));
        assert_eq!(status.evidence, Some(earlier.id.to_string()));
    }

    #[test]
    fn test_metacognitive_triad_needs_three() {
        let pad = WritingPad::new("learner-1", 20);
        let now = Utc::now();
        let mut moments: Vec<_> = (0..2)
            .map(|i| {
                let mut m = moment_at(&pad, now + Duration::minutes(i), 0.5);
                m.recognition_type = RecognitionType::Metacognitive;
                m
            })
            .collect();
        assert!(!achieved(&evaluate_milestones(&pad, &moments), Milestone::MetacognitiveTriad));

        let mut third = moment_at(&pad, now + Duration::minutes(5), 0.5);
        third.recognition_type = RecognitionType::Metacognitive;
        moments.push(third);
        assert!(achieved(&evaluate_milestones(&pad, &moments), Milestone::MetacognitiveTriad));
    }

    #[test]
    fn test_sustained_depth_counts_distinct_sessions() {
        let pad = WritingPad::new("learner-1", 20);
        let now = Utc::now();
        let mut moments = Vec::new();
        for i in 0..6 {
            let mut m = moment_at(&pad, now + Duration::minutes(i), 0.7);
            m.session_id = Some(format!("s-{}", i % 4));
            moments.push(m);
        }
        assert!(!achieved(&evaluate_milestones(&pad, &moments), Milestone::SustainedDepth));

        let mut m = moment_at(&pad, now + Duration::minutes(10), 0.65);
        m.session_id = Some("s-9".into());
        moments.push(m);
        assert!(achieved(&evaluate_milestones(&pad, &moments), Milestone::SustainedDepth));
    }

    #[test]
    fn test_records_keep_milestones_achieved() {
        let pad = WritingPad::new("learner-1", 20);
        let record = MilestoneRecord {
            learner_id: "learner-1".into(),
            milestone: Milestone::LearningStyleIdentified.as_str().into(),
            achieved_at: Utc::now(),
            evidence: Some("practice".into()),
        };
        let merged = merge_with_records(evaluate_milestones(&pad, &[]), &[record]);
        assert!(achieved(&merged, Milestone::LearningStyleIdentified));
    }

    #[test]
    fn test_parse_round_trips_labels() {
        for milestone in Milestone::ALL {
            assert_eq!(Milestone::parse(milestone.as_str()), Some(milestone));
        }
    }
}
