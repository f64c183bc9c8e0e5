//! Typed boundary for model-output parsing.
//!
//! Role replies are free text that should contain a JSON object. Extraction
//! stays heuristic (fenced block, then outermost braces), but every caller
//! receives a [`ParseOutcome`] that has already passed schema validation.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Result of one parse step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ok")]
pub enum ParseOutcome<T> {
    #[serde(rename = "true")]
    Parsed { value: T },
    #[serde(rename = "false")]
    Rejected { reason: String },
}

impl<T> ParseOutcome<T> {
    pub fn parsed(value: T) -> Self {
        Self::Parsed { value }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Parsed { value } => Some(value),
            Self::Rejected { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Parsed { .. } => None,
            Self::Rejected { reason } => Some(reason),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> ParseOutcome<U> {
        match self {
            Self::Parsed { value } => ParseOutcome::Parsed { value: f(value) },
            Self::Rejected { reason } => ParseOutcome::Rejected { reason },
        }
    }

    /// Convert into a crate result, turning rejection into [`Error::Parse`].
    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Parsed { value } => Ok(value),
            Self::Rejected { reason } => Err(Error::Parse(reason)),
        }
    }
}

/// Schema checks applied after deserialization.
pub trait Validate {
    /// Return a reason when the value does not satisfy its schema.
    fn validate(&self) -> std::result::Result<(), String>;
}

/// Extract, deserialize and validate a structured reply.
pub fn parse_structured<T>(response: &str) -> ParseOutcome<T>
where
    T: DeserializeOwned + Validate,
{
    if response.trim().is_empty() {
        return ParseOutcome::rejected("empty response");
    }

    let json_str = extract_json_block(response);
    let value: T = match serde_json::from_str(json_str) {
        Ok(v) => v,
        Err(e) => return ParseOutcome::rejected(format!("invalid JSON: {}", e)),
    };

    match value.validate() {
        Ok(()) => ParseOutcome::parsed(value),
        Err(reason) => ParseOutcome::rejected(reason),
    }
}

/// Find the JSON payload in a free-text reply.
pub fn extract_json_block(response: &str) -> &str {
    if let Some(start) = response.find("```json") {
        let content_start = start + 7;
        if let Some(end) = response[content_start..].find("```") {
            return response[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = response.find("```") {
        let content_start = start + 3;
        let content_start = response[content_start..]
            .find('\n')
            .map(|i| content_start + i + 1)
            .unwrap_or(content_start);
        if let Some(end) = response[content_start..].find("```") {
            return response[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = response.find('{') {
        if let Some(end) = response.rfind('}') {
            if end > start {
                return &response[start..=end];
            }
        }
    }

    response.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Verdict {
        approved: bool,
        score: f64,
    }

    impl Validate for Verdict {
        fn validate(&self) -> std::result::Result<(), String> {
            if (0.0..=1.0).contains(&self.score) {
                Ok(())
            } else {
                Err(format!("score {} out of range", self.score))
            }
        }
    }

    #[test]
    fn test_extract_fenced_json() {
        let text = "Here is my review:\n```json\n{\"approved\": true, \"score\": 0.4}\n```\nThanks";
        assert_eq!(extract_json_block(text), "{\"approved\": true, \"score\": 0.4}");
    }

    #[test]
    fn test_extract_raw_braces() {
        let text = "Verdict follows {\"approved\": false, \"score\": 0.9} end";
        let outcome: ParseOutcome<Verdict> = parse_structured(text);
        assert_eq!(
            outcome,
            ParseOutcome::parsed(Verdict {
                approved: false,
                score: 0.9
            })
        );
    }

    #[test]
    fn test_schema_validation_rejects() {
        let outcome: ParseOutcome<Verdict> = parse_structured(r#"{"approved": true, "score": 3.0}"#);
        assert_eq!(outcome.reason(), Some("score 3 out of range"));
    }

    #[test]
    fn test_empty_and_garbage_rejected() {
        assert!(!parse_structured::<Verdict>("   ").is_parsed());
        assert!(!parse_structured::<Verdict>("I think it is fine.").is_parsed());
        assert!(matches!(
            parse_structured::<Verdict>("nope").into_result(),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn test_tagged_serialization() {
        let outcome: ParseOutcome<u32> = ParseOutcome::rejected("bad");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["ok"], "false");
        assert_eq!(json["reason"], "bad");
    }
}
