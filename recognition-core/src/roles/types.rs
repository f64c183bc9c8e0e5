//! Learner-facing suggestion types and the structured replies of both roles.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::principles::PedagogicalPrinciple;
use crate::parse::Validate;

/// What the tutor knows about the learner for this interaction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearnerContext {
    pub learner_id: String,
    pub session_id: Option<String>,
    /// Free-form summary of the learner's situation
    pub summary: String,
    /// Recent activity, newest last
    pub recent_activity: Vec<String>,
    /// Known struggles
    pub struggles: Vec<String>,
    /// The learner's latest message, if any
    pub learner_message: Option<String>,
    pub metadata: HashMap<String, Value>,
}

impl LearnerContext {
    pub fn new(learner_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            learner_id: learner_id.into(),
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_activity(mut self, activity: impl Into<String>) -> Self {
        self.recent_activity.push(activity.into());
        self
    }

    pub fn with_struggle(mut self, struggle: impl Into<String>) -> Self {
        self.struggles.push(struggle.into());
        self
    }

    pub fn with_learner_message(mut self, message: impl Into<String>) -> Self {
        self.learner_message = Some(message.into());
        self
    }

    /// Render for inclusion in a prompt.
    pub fn render(&self) -> String {
        let mut out = format!("Learner: {}\n{}\n", self.learner_id, self.summary);
        if !self.recent_activity.is_empty() {
            out.push_str("Recent activity:\n");
            for item in &self.recent_activity {
                out.push_str(&format!("- {}\n", item));
            }
        }
        if !self.struggles.is_empty() {
            out.push_str("Known struggles:\n");
            for item in &self.struggles {
                out.push_str(&format!("- {}\n", item));
            }
        }
        if let Some(ref message) = self.learner_message {
            out.push_str(&format!("Learner said: \"{}\"\n", message));
        }
        out
    }
}

/// Where the learner is in the curriculum.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurriculumContext {
    pub course: Option<String>,
    pub current_lesson: Option<String>,
    pub objectives: Vec<String>,
    /// Content the suggestion may point at
    pub available_content: Vec<String>,
}

impl CurriculumContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_course(mut self, course: impl Into<String>) -> Self {
        self.course = Some(course.into());
        self
    }

    pub fn with_lesson(mut self, lesson: impl Into<String>) -> Self {
        self.current_lesson = Some(lesson.into());
        self
    }

    pub fn with_objective(mut self, objective: impl Into<String>) -> Self {
        self.objectives.push(objective.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.available_content.push(content.into());
        self
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(ref course) = self.course {
            out.push_str(&format!("Course: {}\n", course));
        }
        if let Some(ref lesson) = self.current_lesson {
            out.push_str(&format!("Current lesson: {}\n", lesson));
        }
        for objective in &self.objectives {
            out.push_str(&format!("Objective: {}\n", objective));
        }
        if !self.available_content.is_empty() {
            out.push_str(&format!("Available content: {}\n", self.available_content.join(", ")));
        }
        if out.is_empty() {
            out.push_str("No curriculum context.\n");
        }
        out
    }
}

/// Kind of pedagogical move a suggestion makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    Lecture,
    Practice,
    Review,
    Reflection,
    Exploration,
    Continue,
    #[serde(other)]
    Other,
}

impl std::fmt::Display for SuggestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lecture => write!(f, "lecture"),
            Self::Practice => write!(f, "practice"),
            Self::Review => write!(f, "review"),
            Self::Reflection => write!(f, "reflection"),
            Self::Exploration => write!(f, "exploration"),
            Self::Continue => write!(f, "continue"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

/// A learner-facing suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "type")]
    pub kind: SuggestionKind,
    #[serde(default)]
    pub priority: Priority,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub action_target: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl Suggestion {
    pub fn new(kind: SuggestionKind, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            priority: Priority::Medium,
            title: title.into(),
            message: message.into(),
            action_target: None,
            reasoning: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Learner-visible text.
    pub fn render(&self) -> String {
        format!("[{}] {}: {}", self.kind, self.title, self.message)
    }
}

/// The generator's structured reply: a set of suggestions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestionSet {
    pub suggestions: Vec<Suggestion>,
}

impl SuggestionSet {
    pub fn new(suggestions: Vec<Suggestion>) -> Self {
        Self { suggestions }
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }

    /// Text used for critique and similarity comparison.
    pub fn render(&self) -> String {
        self.suggestions
            .iter()
            .map(Suggestion::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Validate for SuggestionSet {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.suggestions.is_empty() {
            return Err("no suggestions".into());
        }
        for (i, s) in self.suggestions.iter().enumerate() {
            if s.title.trim().is_empty() || s.message.trim().is_empty() {
                return Err(format!("suggestion {} has an empty title or message", i));
            }
        }
        Ok(())
    }
}

/// Simple-mode review reply as produced by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewReply {
    pub approved: bool,
    #[serde(default)]
    pub refinements: Vec<String>,
    #[serde(default)]
    pub feedback: String,
    #[serde(default)]
    pub principle: Option<String>,
}

impl Validate for ReviewReply {
    fn validate(&self) -> std::result::Result<(), String> {
        if !self.approved && self.feedback.trim().is_empty() {
            return Err("rejection without feedback".into());
        }
        Ok(())
    }
}

/// Where a verdict came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictSource {
    Model,
    Heuristic,
    FailOpen,
}

/// Simple-mode review verdict after escalation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub approved: bool,
    pub refinements: Vec<String>,
    pub feedback: String,
    pub principle: Option<PedagogicalPrinciple>,
    pub source: VerdictSource,
}

impl ReviewVerdict {
    pub fn fail_open() -> Self {
        Self {
            approved: true,
            refinements: Vec::new(),
            feedback: "Review unavailable; approved without critique".into(),
            principle: None,
            source: VerdictSource::FailOpen,
        }
    }

    pub fn has_refinements(&self) -> bool {
        !self.refinements.is_empty()
    }
}

impl From<ReviewReply> for ReviewVerdict {
    fn from(reply: ReviewReply) -> Self {
        Self {
            approved: reply.approved,
            refinements: reply.refinements,
            feedback: reply.feedback,
            principle: reply.principle.as_deref().and_then(PedagogicalPrinciple::from_label),
            source: VerdictSource::Model,
        }
    }
}

/// Dialectical critique of a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredCritique {
    pub disapproves: bool,
    pub severity: f64,
    pub critique: String,
    pub principle: String,
}

impl StructuredCritique {
    pub fn approval() -> Self {
        Self {
            disapproves: false,
            severity: 0.0,
            critique: String::new(),
            principle: String::new(),
        }
    }
}

impl Validate for StructuredCritique {
    fn validate(&self) -> std::result::Result<(), String> {
        if !(0.0..=1.0).contains(&self.severity) {
            return Err(format!("severity {} outside [0, 1]", self.severity));
        }
        if self.disapproves && self.critique.trim().is_empty() {
            return Err("disapproval without critique".into());
        }
        Ok(())
    }
}

/// The generator's answer to a critique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EgoResponse {
    pub acknowledgment: String,
    pub revision: String,
    #[serde(default)]
    pub transformation: String,
}

impl Validate for EgoResponse {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.revision.trim().is_empty() {
            return Err("empty revision".into());
        }
        Ok(())
    }
}

/// The reviewer's evaluation of a revision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionReview {
    pub accepts: bool,
    #[serde(default)]
    pub remaining_concerns: Vec<String>,
    #[serde(default)]
    pub transformation: String,
}

impl Validate for RevisionReview {
    fn validate(&self) -> std::result::Result<(), String> {
        if !self.accepts && self.remaining_concerns.iter().all(|c| c.trim().is_empty()) {
            return Err("rejection without remaining concerns".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{parse_structured, ParseOutcome};

    #[test]
    fn test_suggestion_set_parses_unknown_kind() {
        let outcome: ParseOutcome<SuggestionSet> = parse_structured(
            r#"{"suggestions": [{"type": "gamified", "title": "Quest", "message": "Try the puzzle"}]}"#,
        );
        let set = outcome.value().unwrap();
        assert_eq!(set.suggestions[0].kind, SuggestionKind::Other);
        assert_eq!(set.suggestions[0].priority, Priority::Medium);
    }

    #[test]
    fn test_suggestion_set_rejects_empty() {
        let outcome: ParseOutcome<SuggestionSet> = parse_structured(r#"{"suggestions": []}"#);
        assert_eq!(outcome.reason(), Some("no suggestions"));
    }

    #[test]
    fn test_review_reply_requires_feedback_on_rejection() {
        let outcome: ParseOutcome<ReviewReply> = parse_structured(r#"{"approved": false}"#);
        assert!(!outcome.is_parsed());

        let outcome: ParseOutcome<ReviewReply> =
            parse_structured(r#"{"approved": true, "refinements": ["shorter"]}"#);
        let verdict = ReviewVerdict::from(outcome.into_result().unwrap());
        assert!(verdict.approved);
        assert!(verdict.has_refinements());
    }

    #[test]
    fn test_learner_context_render() {
        let ctx = LearnerContext::new("l-1", "Working on recursion")
            .with_struggle("base cases")
            .with_learner_message("I don't get it");
        let text = ctx.render();
        assert!(text.contains("base cases"));
        assert!(text.contains("I don't get it"));
    }
}
