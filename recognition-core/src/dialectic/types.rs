//! Dialectical negotiation parameters, transcript and result.

use serde::{Deserialize, Serialize};

use crate::config::{DialecticalConfig, MIN_MUTE_COMPLIANCE};
use crate::memory::{RecognitionMoment, SynthesisStrategy};
use crate::roles::VerdictSource;

/// Per-call overrides of [`DialecticalConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DialecticalParams {
    /// Reviewer compliance in [0, 1]; scales critique severity
    pub compliance: Option<f64>,
    /// Policy cap on rounds; can only lower the configured maximum
    pub max_rounds: Option<usize>,
    pub allow_genuine_conflict: Option<bool>,
    pub session_id: Option<String>,
}

impl DialecticalParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_compliance(mut self, compliance: f64) -> Self {
        self.compliance = Some(compliance);
        self
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    pub fn with_genuine_conflict(mut self, allow: bool) -> Self {
        self.allow_genuine_conflict = Some(allow);
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub(crate) fn resolve(&self, config: &DialecticalConfig) -> ResolvedParams {
        ResolvedParams {
            compliance: self.compliance.unwrap_or(config.compliance).clamp(0.0, 1.0),
            max_rounds: self
                .max_rounds
                .map_or(config.max_negotiation_rounds, |cap| cap.min(config.max_negotiation_rounds)),
            allow_genuine_conflict: self
                .allow_genuine_conflict
                .unwrap_or(config.allow_genuine_conflict),
            rejection_threshold: config.rejection_threshold,
            mute_below: config.mute_below_compliance.max(MIN_MUTE_COMPLIANCE),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub(crate) struct ResolvedParams {
    pub compliance: f64,
    pub max_rounds: usize,
    pub allow_genuine_conflict: bool,
    pub rejection_threshold: f64,
    pub mute_below: f64,
}

/// One entry of the round-by-round transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TranscriptEntry {
    Thesis {
        agent: String,
        position: String,
    },
    /// Compliance below the mute level; no critique was requested
    Muted {
        compliance: f64,
    },
    Antithesis {
        agent: String,
        critique: String,
        principle: String,
        raw_severity: f64,
        severity: f64,
        disapproves: bool,
        source: VerdictSource,
    },
    EgoResponse {
        round: usize,
        acknowledgment: String,
        revision: String,
        transformation: String,
        source: VerdictSource,
    },
    SuperegoEvaluation {
        round: usize,
        accepts: bool,
        remaining_concerns: Vec<String>,
        transformation: String,
        source: VerdictSource,
    },
    ForcedCompromise {
        rounds: usize,
    },
    GenuineConflict {
        rounds: usize,
    },
}

/// Outcome of a dialectical negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialecticalResult {
    /// A synthesis was reached through negotiation (accepted or forced)
    pub synthesized: bool,
    /// The suggestion that stands, or `None` for an unresolved conflict
    pub resolution: Option<String>,
    pub recognition_moment: Option<RecognitionMoment>,
    pub transcript: Vec<TranscriptEntry>,
    pub strategy: SynthesisStrategy,
    pub rounds: usize,
    /// Compliance-scaled critique severity
    pub severity: f64,
    pub struggle_depth: f64,
    pub mutual_acknowledgment: bool,
    /// The moment was written to the store
    pub persisted: bool,
}

impl DialecticalResult {
    pub(crate) fn no_conflict(draft: &str, transcript: Vec<TranscriptEntry>, severity: f64) -> Self {
        Self {
            synthesized: false,
            resolution: Some(draft.to_string()),
            recognition_moment: None,
            transcript,
            strategy: SynthesisStrategy::NoConflict,
            rounds: 0,
            severity,
            struggle_depth: 0.0,
            mutual_acknowledgment: false,
            persisted: false,
        }
    }

    /// Whether any step ran on the deterministic fallback.
    pub fn used_fallback(&self) -> bool {
        self.transcript.iter().any(|entry| {
            matches!(
                entry,
                TranscriptEntry::Antithesis { source, .. }
                    | TranscriptEntry::EgoResponse { source, .. }
                    | TranscriptEntry::SuperegoEvaluation { source, .. }
                    if *source != VerdictSource::Model
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_override_only_lowers() {
        let config = DialecticalConfig::default();
        assert_eq!(DialecticalParams::new().with_max_rounds(1).resolve(&config).max_rounds, 1);
        assert_eq!(DialecticalParams::new().with_max_rounds(9).resolve(&config).max_rounds, 2);
        assert_eq!(DialecticalParams::new().resolve(&config).max_rounds, 2);
    }

    #[test]
    fn test_compliance_clamped() {
        let config = DialecticalConfig::default();
        assert_eq!(DialecticalParams::new().with_compliance(1.7).resolve(&config).compliance, 1.0);
        assert_eq!(DialecticalParams::new().with_compliance(-1.0).resolve(&config).compliance, 0.0);
    }

    #[test]
    fn test_transcript_entry_tagged() {
        let entry = TranscriptEntry::ForcedCompromise { rounds: 2 };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["event"], "forced_compromise");
    }
}
