//! Escalation policies for role calls.
//!
//! A role call walks an ordered list of [`EscalationStep`]s: the primary
//! model, a retry with a format reminder, a retry on a stronger tier, the
//! deterministic heuristic, and finally fail-open. Each step carries a
//! [`StepTrigger`] so a policy can say "heuristic only after the provider
//! failed" without nested control flow.

use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, warn};

/// What a step does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// Call the configured model
    Primary,
    /// Call again with an explicit output-format reminder
    FormatReminder,
    /// Call again on the next stronger model tier
    StrongerModel,
    /// Use the deterministic classifier, no model call
    Heuristic,
    /// Accept without review so the learner is never blocked
    FailOpen,
}

impl StepKind {
    /// Whether this step calls the text-generation service.
    pub fn calls_model(&self) -> bool {
        matches!(self, Self::Primary | Self::FormatReminder | Self::StrongerModel)
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::FormatReminder => write!(f, "format_reminder"),
            Self::StrongerModel => write!(f, "stronger_model"),
            Self::Heuristic => write!(f, "heuristic"),
            Self::FailOpen => write!(f, "fail_open"),
        }
    }
}

/// Which previous failure lets a step run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepTrigger {
    /// Runs after any failure (and always as the first step)
    Any,
    /// Runs only if the previous attempt failed at the provider
    ProviderFailure,
    /// Runs only if the previous attempt returned unparseable output
    ParseFailure,
}

/// How an attempt failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptFailure {
    /// Provider unavailable, rate limited, timed out
    Provider { message: String },
    /// Output did not pass the parse boundary
    Parse { reason: String },
}

impl AttemptFailure {
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
        }
    }

    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, Self::Provider { .. })
    }

    pub fn describe(&self) -> &str {
        match self {
            Self::Provider { message } => message,
            Self::Parse { reason } => reason,
        }
    }
}

/// One entry in an escalation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationStep {
    pub kind: StepKind,
    pub trigger: StepTrigger,
}

impl EscalationStep {
    pub fn new(kind: StepKind, trigger: StepTrigger) -> Self {
        Self { kind, trigger }
    }

    /// Whether this step may run after `last`.
    pub fn accepts(&self, last: Option<&AttemptFailure>) -> bool {
        match (self.trigger, last) {
            (StepTrigger::Any, _) => true,
            (_, None) => false,
            (StepTrigger::ProviderFailure, Some(failure)) => failure.is_provider(),
            (StepTrigger::ParseFailure, Some(failure)) => !failure.is_provider(),
        }
    }
}

/// Outcome of a single attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome<T> {
    Success(T),
    Failed(AttemptFailure),
}

/// Ordered list of escalation steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    steps: Vec<EscalationStep>,
}

impl EscalationPolicy {
    pub fn new(steps: Vec<EscalationStep>) -> Self {
        Self { steps }
    }

    /// Drafting: primary, then one retry with a format reminder.
    pub fn drafting() -> Self {
        Self::new(vec![
            EscalationStep::new(StepKind::Primary, StepTrigger::Any),
            EscalationStep::new(StepKind::FormatReminder, StepTrigger::Any),
        ])
    }

    /// Simple-mode review: unparseable output escalates to a stronger tier;
    /// an unavailable provider falls back to the heuristic; anything still
    /// unresolved fails open.
    pub fn review() -> Self {
        Self::new(vec![
            EscalationStep::new(StepKind::Primary, StepTrigger::Any),
            EscalationStep::new(StepKind::StrongerModel, StepTrigger::ParseFailure),
            EscalationStep::new(StepKind::Heuristic, StepTrigger::ProviderFailure),
            EscalationStep::new(StepKind::FailOpen, StepTrigger::Any),
        ])
    }

    /// Dialectical exchanges: unparseable output gets one stronger retry,
    /// and every remaining failure ends in the deterministic substitute.
    pub fn dialectical() -> Self {
        Self::new(vec![
            EscalationStep::new(StepKind::Primary, StepTrigger::Any),
            EscalationStep::new(StepKind::StrongerModel, StepTrigger::ParseFailure),
            EscalationStep::new(StepKind::Heuristic, StepTrigger::Any),
        ])
    }

    pub fn steps(&self) -> &[EscalationStep] {
        &self.steps
    }

    /// Evaluate the policy.
    ///
    /// `attempt` is called with each eligible step kind in order until one
    /// succeeds. Steps whose trigger does not match the previous failure are
    /// skipped.
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Escalation<T>
    where
        F: FnMut(StepKind) -> Fut,
        Fut: Future<Output = StepOutcome<T>>,
    {
        let mut failures: Vec<(StepKind, AttemptFailure)> = Vec::new();

        for step in &self.steps {
            let last = failures.last().map(|(_, f)| f);
            if !step.accepts(last) {
                debug!(step = %step.kind, "escalation step skipped");
                continue;
            }

            match attempt(step.kind).await {
                StepOutcome::Success(value) => {
                    if !failures.is_empty() {
                        debug!(step = %step.kind, failures = failures.len(), "escalation resolved");
                    }
                    return Escalation {
                        value: Some(value),
                        resolved_by: Some(step.kind),
                        failures,
                    };
                }
                StepOutcome::Failed(failure) => {
                    warn!(step = %step.kind, reason = failure.describe(), "escalation step failed");
                    failures.push((step.kind, failure));
                }
            }
        }

        Escalation {
            value: None,
            resolved_by: None,
            failures,
        }
    }
}

/// Result of evaluating an escalation policy.
#[derive(Debug, Clone)]
pub struct Escalation<T> {
    /// Value produced by the resolving step
    pub value: Option<T>,
    /// Step that produced the value
    pub resolved_by: Option<StepKind>,
    /// Failed attempts in order
    pub failures: Vec<(StepKind, AttemptFailure)>,
}

impl<T> Escalation<T> {
    /// Whether the value came from a model call rather than a local fallback.
    pub fn from_model(&self) -> bool {
        self.resolved_by.map(|k| k.calls_model()).unwrap_or(false)
    }

    /// Step kinds attempted, in order.
    pub fn attempted(&self) -> Vec<StepKind> {
        let mut kinds: Vec<StepKind> = self.failures.iter().map(|(k, _)| *k).collect();
        if let Some(kind) = self.resolved_by {
            kinds.push(kind);
        }
        kinds
    }
}
