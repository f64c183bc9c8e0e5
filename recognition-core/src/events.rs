//! Learner-event classification.
//!
//! Pattern-based detection of resistance, breakthroughs and demands in a
//! learner's response to a tutor suggestion. Each response yields at most
//! one event of each type.

use regex::Regex;
use std::sync::LazyLock;

use crate::memory::LearnerEventKind;

// Resistance interpretations, checked in order
static FRUSTRATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(this\s+is\s+(so\s+)?(hard|frustrating|pointless|impossible)|i('m|\s+am)\s+(so\s+)?(frustrated|annoyed|stuck)|ugh+|i\s+hate\s+this)\b")
        .expect("invalid regex")
});

static DISENGAGEMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(i\s+don'?t\s+care|boring|can\s+we\s+skip|i\s+give\s+up|don'?t\s+want\s+to|what'?s\s+the\s+point)\b")
        .expect("invalid regex")
});

static CONFUSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(i\s+don'?t\s+(get|understand)|makes\s+no\s+sense|i('m|\s+am)\s+(confused|lost)|what\s+does\s+that\s+mean)\b")
        .expect("invalid regex")
});

static DISAGREEMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(that'?s\s+(wrong|not\s+right|not\s+true)|i\s+disagree|that\s+doesn'?t\s+work)\b")
        .expect("invalid regex")
});

static BREAKTHROUGH_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(oh+,?\s+i\s+(see|get\s+it)|now\s+i\s+(get|understand|see)|that\s+makes\s+sense|aha|it\s+clicked|i\s+figured\s+(it\s+)?out|got\s+it)\b")
        .expect("invalid regex")
});

/// Reflexive language that marks the learner recognizing their own change.
static RECOGNITION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(i\s+(realize|realise|understand\s+now)|i\s+was\s+(wrong|thinking\s+about\s+it\s+wrong)|my\s+mistake\s+was)\b")
        .expect("invalid regex")
});

static DEMAND_ANSWER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(just\s+(tell|give)\s+me\s+(the\s+)?(answer|solution|code)|what'?s\s+the\s+answer|give\s+me\s+the\s+(answer|solution|code))\b")
        .expect("invalid regex")
});

static DEMAND_EXAMPLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b((show|give)\s+me\s+an\s+example|can\s+i\s+see\s+an\s+example)\b")
        .expect("invalid regex")
});

static DEMAND_HINT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(give\s+me\s+a\s+hint|any\s+hints?|can\s+i\s+(get|have)\s+a\s+hint)\b")
        .expect("invalid regex")
});

static DEMAND_EXPLANATION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(can\s+you\s+explain|explain\s+(it|this|that)|why\s+does)\b")
        .expect("invalid regex")
});

static INSISTENCE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\bjust\b|\bnow\b|\balready\b|!)").expect("invalid regex"));

/// Trigger recorded for a breakthrough with no known tutor suggestion.
pub const UNKNOWN_TRIGGER: &str = "tutor_suggestion";

/// Classifies learner responses into learner events.
#[derive(Debug, Clone, Default)]
pub struct LearnerEventClassifier;

impl LearnerEventClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Events found in a response.
    ///
    /// `trigger` names what prompted the response (usually the type of the
    /// tutor's last suggestion) and becomes a breakthrough's trigger event.
    pub fn classify(&self, response: &str, trigger: Option<&str>) -> Vec<LearnerEventKind> {
        let mut events = Vec::new();

        if let Some(interpretation) = self.resistance(response) {
            events.push(LearnerEventKind::Resistance {
                interpretation: interpretation.to_string(),
            });
        }

        if let Some(found) = BREAKTHROUGH_PATTERN.find(response) {
            events.push(LearnerEventKind::Breakthrough {
                trigger_event: trigger.unwrap_or(UNKNOWN_TRIGGER).to_string(),
                evidence: found.as_str().to_string(),
                recognition_achieved: RECOGNITION_PATTERN.is_match(response),
            });
        }

        if let Some((category, strength)) = self.demand(response) {
            events.push(LearnerEventKind::Demand {
                category: category.to_string(),
                strength,
            });
        }

        events
    }

    fn resistance(&self, response: &str) -> Option<&'static str> {
        let checks: [(&'static str, &LazyLock<Regex>); 4] = [
            ("frustration", &FRUSTRATION_PATTERN),
            ("disengagement", &DISENGAGEMENT_PATTERN),
            ("confusion", &CONFUSION_PATTERN),
            ("disagreement", &DISAGREEMENT_PATTERN),
        ];
        checks
            .iter()
            .find(|(_, pattern)| pattern.is_match(response))
            .map(|(label, _)| *label)
    }

    /// Demand category and strength in [0.5, 1].
    fn demand(&self, response: &str) -> Option<(&'static str, f64)> {
        let checks: [(&'static str, &LazyLock<Regex>); 4] = [
            ("answer", &DEMAND_ANSWER_PATTERN),
            ("example", &DEMAND_EXAMPLE_PATTERN),
            ("hint", &DEMAND_HINT_PATTERN),
            ("explanation", &DEMAND_EXPLANATION_PATTERN),
        ];
        let (category, pattern) = checks.iter().find(|(_, pattern)| pattern.is_match(response))?;

        let mut strength: f64 = 0.5;
        if INSISTENCE_PATTERN.is_match(response) {
            strength += 0.25;
        }
        if pattern.find_iter(response).count() > 1 {
            strength += 0.25;
        }
        Some((*category, strength.min(1.0)))
    }
}
