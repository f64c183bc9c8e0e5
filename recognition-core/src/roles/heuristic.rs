//! Deterministic critique used when the reviewer's model is unavailable.
//!
//! Each rule is a phrasing pattern tied to the principle it violates and a
//! fixed severity. The classifier is less nuanced than a model review but
//! always answers.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use super::principles::PedagogicalPrinciple;
use super::types::{ReviewVerdict, StructuredCritique, VerdictSource};

static DIRECT_ANSWER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(the\s+answer\s+is|here('s|\s+is)\s+the\s+(solution|answer|code)|the\s+correct\s+(answer|solution)\s+is|just\s+copy|simply\s+(use|write|paste))")
        .expect("invalid regex")
});

static OVER_SCAFFOLDING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(step\s+\d+|let\s+me\s+walk\s+you\s+through|break\s+(it|this)\s+down\s+(for\s+you|into)|one\s+step\s+at\s+a\s+time|first,.+then,.+finally)")
        .expect("invalid regex")
});

static PRESCRIPTIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(you\s+must|you\s+have\s+to|you\s+need\s+to|do\s+this\s+now|you\s+should\s+always)\b")
        .expect("invalid regex")
});

static DISMISSIVE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(obviously|as\s+i\s+(already\s+)?said|that'?s\s+(simply\s+)?wrong|clearly\s+you)\b")
        .expect("invalid regex")
});

static VAGUE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\W*(keep\s+going|good\s+job|try\s+again|continue\s+learning|well\s+done)\W*$")
        .expect("invalid regex")
});

static LEARNER_REFERENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(you|your|you're|yourself)\b").expect("invalid regex"));

/// Below this many words a suggestion is too short to judge for learner reference.
const LEARNER_REFERENCE_MIN_WORDS: usize = 8;

static SOFTEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(you\s+must|you\s+have\s+to|you\s+need\s+to)\b").expect("invalid regex")
});

/// Named heuristic rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeuristicRule {
    DirectAnswer,
    OverScaffolding,
    Prescriptive,
    Dismissive,
    Vague,
    MissingLearnerReference,
}

impl HeuristicRule {
    pub fn principle(&self) -> PedagogicalPrinciple {
        match self {
            Self::DirectAnswer => PedagogicalPrinciple::ProductiveStruggle,
            Self::OverScaffolding => PedagogicalPrinciple::AdaptiveScaffolding,
            Self::Prescriptive => PedagogicalPrinciple::LearnerAutonomy,
            Self::Dismissive => PedagogicalPrinciple::MutualRecognition,
            Self::Vague => PedagogicalPrinciple::Clarity,
            Self::MissingLearnerReference => PedagogicalPrinciple::MutualRecognition,
        }
    }

    pub fn severity(&self) -> f64 {
        match self {
            Self::DirectAnswer => 0.8,
            Self::Dismissive => 0.7,
            Self::OverScaffolding => 0.6,
            Self::Prescriptive => 0.55,
            Self::MissingLearnerReference => 0.35,
            Self::Vague => 0.3,
        }
    }

    fn message(&self) -> &'static str {
        match self {
            Self::DirectAnswer => "Gives away the answer instead of leaving room to work it out",
            Self::OverScaffolding => "Prescribes every step, leaving nothing for the learner to decide",
            Self::Prescriptive => "Commands rather than invites",
            Self::Dismissive => "Dismisses the learner's own reasoning",
            Self::Vague => "Too generic to act on",
            Self::MissingLearnerReference => "Never addresses the learner directly",
        }
    }
}

/// One rule hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeuristicFinding {
    pub rule: HeuristicRule,
    pub principle: PedagogicalPrinciple,
    pub severity: f64,
    pub message: String,
}

/// Regex classifier over suggestion text.
#[derive(Debug, Clone)]
pub struct HeuristicClassifier {
    rejection_threshold: f64,
}

impl Default for HeuristicClassifier {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl HeuristicClassifier {
    pub fn new(rejection_threshold: f64) -> Self {
        Self {
            rejection_threshold,
        }
    }

    /// All rule hits, most severe first.
    pub fn classify(&self, text: &str) -> Vec<HeuristicFinding> {
        let checks: [(HeuristicRule, &LazyLock<Regex>); 5] = [
            (HeuristicRule::DirectAnswer, &DIRECT_ANSWER_PATTERN),
            (HeuristicRule::OverScaffolding, &OVER_SCAFFOLDING_PATTERN),
            (HeuristicRule::Prescriptive, &PRESCRIPTIVE_PATTERN),
            (HeuristicRule::Dismissive, &DISMISSIVE_PATTERN),
            (HeuristicRule::Vague, &VAGUE_PATTERN),
        ];

        let mut findings: Vec<HeuristicFinding> = checks
            .iter()
            .filter(|(_, pattern)| pattern.is_match(text))
            .map(|(rule, _)| HeuristicFinding {
                rule: *rule,
                principle: rule.principle(),
                severity: rule.severity(),
                message: rule.message().to_string(),
            })
            .collect();

        if text.split_whitespace().count() >= LEARNER_REFERENCE_MIN_WORDS
            && !LEARNER_REFERENCE_PATTERN.is_match(text)
        {
            let rule = HeuristicRule::MissingLearnerReference;
            findings.push(HeuristicFinding {
                rule,
                principle: rule.principle(),
                severity: rule.severity(),
                message: rule.message().to_string(),
            });
        }

        findings.sort_by(|a, b| b.severity.total_cmp(&a.severity));
        findings
    }

    /// Structured critique equivalent to a model critique.
    pub fn critique(&self, text: &str) -> StructuredCritique {
        let findings = self.classify(text);
        let Some(top) = findings.first() else {
            return StructuredCritique::approval();
        };

        StructuredCritique {
            disapproves: top.severity >= self.rejection_threshold,
            severity: top.severity,
            critique: findings
                .iter()
                .map(|f| f.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
            principle: top.principle.label().to_string(),
        }
    }

    /// Simple-mode verdict.
    pub fn verdict(&self, text: &str) -> ReviewVerdict {
        let critique = self.critique(text);
        let findings = self.classify(text);
        ReviewVerdict {
            approved: !critique.disapproves,
            refinements: findings
                .iter()
                .filter(|f| f.severity < self.rejection_threshold)
                .map(|f| f.message.clone())
                .collect(),
            feedback: critique.critique,
            principle: findings.first().map(|f| f.principle),
            source: VerdictSource::Heuristic,
        }
    }

    /// Whether a revision clears every blocking rule.
    pub fn accepts(&self, text: &str) -> bool {
        !self.critique(text).disapproves
    }

    /// Rewrite commanding phrasing as an invitation.
    pub fn soften(&self, text: &str) -> String {
        SOFTEN_PATTERN
            .replace_all(text, |caps: &regex::Captures| {
                if caps[0].starts_with('Y') {
                    "You might"
                } else {
                    "you might"
                }
            })
            .into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_answer_detected() {
        let classifier = HeuristicClassifier::default();
        let critique = classifier.critique("The answer is 42, just copy it into the box.");
        assert!(critique.disapproves);
        assert_eq!(critique.severity, 0.8);
        assert_eq!(critique.principle, "productive_struggle");
    }

    #[test]
    fn test_over_scaffolding_and_prescriptive_ranked() {
        let classifier = HeuristicClassifier::default();
        let findings =
            classifier.classify("You must do this. Step 1: open the file. Step 2: read it.");
        let rules: Vec<_> = findings.iter().map(|f| f.rule).collect();
        assert_eq!(rules, vec![HeuristicRule::OverScaffolding, HeuristicRule::Prescriptive]);
    }

    #[test]
    fn test_clean_invitation_approved() {
        let classifier = HeuristicClassifier::default();
        let text = "What do you notice when the list is empty? Try tracing one call by hand.";
        assert!(classifier.classify(text).is_empty());
        assert!(classifier.verdict(text).approved);
        assert_eq!(classifier.critique(text), StructuredCritique::approval());
    }

    #[test]
    fn test_vague_is_refinement_not_rejection() {
        let classifier = HeuristicClassifier::default();
        let verdict = classifier.verdict("Keep going!");
        assert!(verdict.approved);
        assert_eq!(verdict.refinements.len(), 1);
        assert_eq!(verdict.source, VerdictSource::Heuristic);
    }

    #[test]
    fn test_missing_learner_reference() {
        let classifier = HeuristicClassifier::default();
        let findings =
            classifier.classify("Recursion reduces a problem into smaller copies of the same problem.");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule, HeuristicRule::MissingLearnerReference);
        assert!(classifier.accepts("Recursion reduces a problem into smaller copies of itself."));
    }

    #[test]
    fn test_soften() {
        let classifier = HeuristicClassifier::default();
        assert_eq!(
            classifier.soften("You must review loops first."),
            "You might review loops first."
        );
        assert_eq!(
            classifier.soften("First you have to trace fact(2)."),
            "First you might trace fact(2)."
        );
        assert!(classifier.accepts(&classifier.soften("You need to reread chapter 2.")));
    }
}
