//! Result and trace types for simple-mode negotiation.

use serde::{Deserialize, Serialize};

use crate::config::NegotiationConfig;
use crate::roles::{Suggestion, VerdictSource};

/// Per-call overrides of [`NegotiationConfig`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NegotiationOptions {
    pub max_rounds: Option<usize>,
    pub similarity_threshold: Option<f64>,
    pub incorporate_refinements: Option<bool>,
}

impl NegotiationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = Some(max_rounds);
        self
    }

    pub fn with_similarity_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = Some(threshold);
        self
    }

    pub fn without_incorporation(mut self) -> Self {
        self.incorporate_refinements = Some(false);
        self
    }

    /// Settings for one run: these overrides on top of `config`.
    pub fn resolve(&self, config: &NegotiationConfig) -> NegotiationConfig {
        let mut resolved = config.clone();
        if let Some(max_rounds) = self.max_rounds {
            resolved.max_rounds = max_rounds;
        }
        if let Some(threshold) = self.similarity_threshold {
            resolved.similarity_threshold = threshold;
        }
        if let Some(incorporate) = self.incorporate_refinements {
            resolved.incorporate_refinements = incorporate;
        }
        resolved
    }
}

/// Why a negotiation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The reviewer approved a draft
    Approved,
    /// Successive drafts stopped changing
    Similarity,
    /// Rounds ran out without approval
    RoundsExhausted,
    /// No usable initial draft
    DraftFailed,
}

impl Termination {
    pub fn is_converged(&self) -> bool {
        matches!(self, Self::Approved | Self::Similarity)
    }
}

/// One event in a negotiation trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEntry {
    Drafted {
        suggestions: usize,
    },
    DraftFailed,
    Reviewed {
        round: usize,
        approved: bool,
        source: VerdictSource,
        feedback: String,
        refinements: Vec<String>,
    },
    Revised {
        round: usize,
        similarity: f64,
    },
    RevisionFailed {
        round: usize,
    },
    Incorporated {
        refinements: usize,
        applied: bool,
    },
}

/// Outcome of [`super::NegotiationController::negotiate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationResult {
    pub suggestions: Vec<Suggestion>,
    pub converged: bool,
    pub rounds: usize,
    pub termination: Termination,
    pub trace: Vec<TraceEntry>,
}

impl NegotiationResult {
    pub(crate) fn finish(
        suggestions: Vec<Suggestion>,
        rounds: usize,
        termination: Termination,
        trace: Vec<TraceEntry>,
    ) -> Self {
        Self {
            suggestions,
            converged: termination.is_converged(),
            rounds,
            termination,
            trace,
        }
    }

    /// Number of reviewer verdicts that did not come from the model.
    pub fn fallback_reviews(&self) -> usize {
        self.trace
            .iter()
            .filter(|e| matches!(e, TraceEntry::Reviewed { source, .. } if *source != VerdictSource::Model))
            .count()
    }
}
