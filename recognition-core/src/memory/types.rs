//! Writing pad, tier contents, recognition moments and learner events.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Max entries kept in each archetype list.
pub const ARCHETYPE_LIST_LIMIT: usize = 5;

/// Confidence assigned to a newly detected pattern.
pub const INITIAL_PATTERN_CONFIDENCE: f64 = 0.5;

/// Confidence added per reinforcement.
pub const REINFORCEMENT_STEP: f64 = 0.1;

/// Where a recognition moment currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceLayer {
    Conscious,
    Preconscious,
    Unconscious,
}

impl PersistenceLayer {
    pub const ALL: [PersistenceLayer; 3] = [Self::Conscious, Self::Preconscious, Self::Unconscious];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conscious => "conscious",
            Self::Preconscious => "preconscious",
            Self::Unconscious => "unconscious",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "conscious" => Some(Self::Conscious),
            "preconscious" => Some(Self::Preconscious),
            "unconscious" => Some(Self::Unconscious),
            _ => None,
        }
    }
}

impl std::fmt::Display for PersistenceLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognitionType {
    /// Conflict left unresolved
    Existential,
    /// Both sides changed their understanding
    Metacognitive,
    /// Resolved without mutual transformation
    Pedagogical,
}

impl RecognitionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Existential => "existential",
            Self::Metacognitive => "metacognitive",
            Self::Pedagogical => "pedagogical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "existential" => Some(Self::Existential),
            "metacognitive" => Some(Self::Metacognitive),
            "pedagogical" => Some(Self::Pedagogical),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecognitionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a dialectical negotiation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisStrategy {
    /// The reviewer approved the draft outright
    NoConflict,
    /// Both sides transformed
    DialecticalSynthesis,
    /// The generator's (learner-facing) position prevailed
    LearnerDominates,
    /// The reviewer's position prevailed
    GhostDominates,
    /// Agreement by concession
    Compromise,
    /// No agreement reached
    NoSynthesis,
}

impl SynthesisStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoConflict => "no_conflict",
            Self::DialecticalSynthesis => "dialectical_synthesis",
            Self::LearnerDominates => "learner_dominates",
            Self::GhostDominates => "ghost_dominates",
            Self::Compromise => "compromise",
            Self::NoSynthesis => "no_synthesis",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "no_conflict" => Some(Self::NoConflict),
            "dialectical_synthesis" => Some(Self::DialecticalSynthesis),
            "learner_dominates" => Some(Self::LearnerDominates),
            "ghost_dominates" => Some(Self::GhostDominates),
            "compromise" => Some(Self::Compromise),
            "no_synthesis" => Some(Self::NoSynthesis),
            _ => None,
        }
    }
}

impl std::fmt::Display for SynthesisStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==================== Conscious tier ====================

/// One working thought recorded during an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThoughtRecord {
    pub id: Uuid,
    /// Suggestion type label ("practice", "review", ...)
    pub suggestion_type: String,
    pub content: String,
    pub recorded_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl ThoughtRecord {
    pub fn new(suggestion_type: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            suggestion_type: suggestion_type.into(),
            content: content.into(),
            recorded_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsciousTier {
    pub working_thoughts: Vec<ThoughtRecord>,
    /// Flags set during the cycle, keyed by event kind
    pub ephemeral_notes: HashMap<String, Value>,
    pub last_cleared: Option<DateTime<Utc>>,
}

impl ConsciousTier {
    pub fn is_empty(&self) -> bool {
        self.working_thoughts.is_empty() && self.ephemeral_notes.is_empty()
    }

    pub fn with_thought(mut self, thought: ThoughtRecord) -> Self {
        self.working_thoughts.push(thought);
        self
    }

    pub fn with_note(mut self, key: impl Into<String>, value: Value) -> Self {
        self.ephemeral_notes.insert(key.into(), value);
        self
    }

    /// Empty tier stamped with the clearing time.
    pub fn cleared(at: DateTime<Utc>) -> Self {
        Self {
            working_thoughts: Vec::new(),
            ephemeral_notes: HashMap::new(),
            last_cleared: Some(at),
        }
    }
}

// ==================== Preconscious tier ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// A suggestion type that keeps recurring
    SuggestionType,
    Resistance,
    Breakthrough,
    Demand,
}

impl PatternType {
    /// Pattern type for an ephemeral-note key.
    pub fn from_note_key(key: &str) -> Option<Self> {
        match key {
            "resistance" => Some(Self::Resistance),
            "breakthrough" => Some(Self::Breakthrough),
            "demand" => Some(Self::Demand),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    #[serde(rename = "type")]
    pub pattern_type: PatternType,
    pub signature: String,
    pub observation: String,
    pub confidence: f64,
    pub first_observed: DateTime<Utc>,
    pub last_observed: DateTime<Utc>,
    pub reinforcement_count: u32,
}

impl Pattern {
    /// A newly detected pattern.
    pub fn detect(
        pattern_type: PatternType,
        signature: impl Into<String>,
        observation: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            pattern_type,
            signature: signature.into(),
            observation: observation.into(),
            confidence: INITIAL_PATTERN_CONFIDENCE,
            first_observed: now,
            last_observed: now,
            reinforcement_count: 1,
        }
    }

    /// The same pattern seen again.
    pub fn reinforce(&self, observation: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            observation: observation.into(),
            confidence: (self.confidence + REINFORCEMENT_STEP).min(1.0),
            last_observed: now.max(self.last_observed),
            reinforcement_count: self.reinforcement_count.saturating_add(1),
            ..self.clone()
        }
    }

    pub fn matches(&self, pattern_type: PatternType, signature: &str) -> bool {
        self.pattern_type == pattern_type && self.signature == signature
    }

    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_observed
    }
}

/// Rule inferred from a high-confidence pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionalRule {
    pub id: Uuid,
    pub pattern_type: PatternType,
    pub pattern_signature: String,
    pub rule: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

impl ProvisionalRule {
    pub fn from_pattern(pattern: &Pattern, now: DateTime<Utc>) -> Self {
        let rule = match pattern.pattern_type {
            PatternType::SuggestionType => {
                format!("Learner repeatedly receives {} suggestions", pattern.signature)
            }
            PatternType::Resistance => format!("Expect resistance: {}", pattern.signature),
            PatternType::Breakthrough => {
                format!("Breakthroughs tend to follow: {}", pattern.signature)
            }
            PatternType::Demand => format!("Learner tends to demand: {}", pattern.signature),
        };
        Self {
            id: Uuid::new_v4(),
            pattern_type: pattern.pattern_type,
            pattern_signature: pattern.signature.clone(),
            rule,
            confidence: pattern.confidence,
            created_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreconsciousTier {
    pub recent_patterns: Vec<Pattern>,
    pub provisional_rules: Vec<ProvisionalRule>,
    pub fade_threshold_days: i64,
}

impl PreconsciousTier {
    pub fn new(fade_threshold_days: i64) -> Self {
        Self {
            recent_patterns: Vec::new(),
            provisional_rules: Vec::new(),
            fade_threshold_days,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.recent_patterns.is_empty() && self.provisional_rules.is_empty()
    }

    pub fn find(&self, pattern_type: PatternType, signature: &str) -> Option<&Pattern> {
        self.recent_patterns
            .iter()
            .find(|p| p.matches(pattern_type, signature))
    }

    pub fn has_rule_for(&self, pattern: &Pattern) -> bool {
        self.provisional_rules.iter().any(|r| {
            r.pattern_type == pattern.pattern_type && r.pattern_signature == pattern.signature
        })
    }
}

// ==================== Unconscious tier ====================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transformations {
    pub ego: Option<String>,
    pub superego: Option<String>,
    pub learner: Option<String>,
}

/// Permanent record of a consolidated moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub id: Uuid,
    pub moment_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub synthesis: String,
    pub transformations: Transformations,
    pub recognition_type: RecognitionType,
    pub struggle_depth: f64,
}

impl Trace {
    pub fn from_moment(moment: &RecognitionMoment, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            moment_id: moment.id,
            timestamp: now,
            synthesis: moment
                .synthesis_resolution
                .clone()
                .unwrap_or_else(|| "unresolved".to_string()),
            transformations: Transformations {
                ego: moment.ego_transformation.clone(),
                superego: moment.superego_transformation.clone(),
                learner: moment.learner_insight.clone(),
            },
            recognition_type: moment.recognition_type,
            struggle_depth: moment.struggle_depth,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LearnerArchetype {
    pub preferred_learning_style: Option<String>,
    pub common_struggles: Vec<String>,
    pub breakthrough_patterns: Vec<String>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl LearnerArchetype {
    pub fn is_unset(&self) -> bool {
        self.preferred_learning_style.is_none()
            && self.common_struggles.is_empty()
            && self.breakthrough_patterns.is_empty()
    }
}

/// Keep the most recent distinct values, oldest first, at most `limit`.
pub fn most_recent_distinct<I>(values: I, limit: usize) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut out: Vec<String> = Vec::new();
    for value in values {
        out.retain(|v| v != &value);
        out.push(value);
    }
    let excess = out.len().saturating_sub(limit);
    out.drain(..excess);
    out
}

/// Recurring disagreement over one principle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictPattern {
    pub principle: String,
    pub occurrences: u32,
    pub unresolved: u32,
    pub last_seen: DateTime<Utc>,
}

/// What the reviewer insisted on in a consolidated moment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuperegoTrace {
    pub moment_id: Uuid,
    pub principle: String,
    pub critique: String,
    pub transformation: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnconsciousTier {
    pub permanent_traces: Vec<Trace>,
    pub learner_archetype: LearnerArchetype,
    pub conflict_patterns: Vec<ConflictPattern>,
    pub superego_traces: Vec<SuperegoTrace>,
}

impl UnconsciousTier {
    pub fn has_trace_for(&self, moment_id: Uuid) -> bool {
        self.permanent_traces.iter().any(|t| t.moment_id == moment_id)
    }

    /// Count a conflict over `principle`.
    pub fn with_conflict(mut self, principle: &str, unresolved: bool, at: DateTime<Utc>) -> Self {
        match self
            .conflict_patterns
            .iter_mut()
            .find(|c| c.principle == principle)
        {
            Some(conflict) => {
                conflict.occurrences += 1;
                conflict.unresolved += u32::from(unresolved);
                conflict.last_seen = at;
            }
            None => self.conflict_patterns.push(ConflictPattern {
                principle: principle.to_string(),
                occurrences: 1,
                unresolved: u32::from(unresolved),
                last_seen: at,
            }),
        }
        self
    }
}

// ==================== Writing pad ====================

/// Aggregate recognition metrics kept on the pad.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PadMetrics {
    pub total_recognition_moments: u64,
    pub dialectical_depth: f64,
    pub mutual_transformation_score: f64,
    pub pedagogical_attunement: f64,
}

impl PadMetrics {
    /// Running means updated with one more moment.
    pub fn with_moment(&self, moment: &RecognitionMoment) -> Self {
        let n = self.total_recognition_moments as f64;
        let next = n + 1.0;
        let mean = |prev: f64, sample: f64| (prev * n + sample) / next;

        let transformed = [&moment.ego_transformation, &moment.superego_transformation]
            .iter()
            .filter(|t| t.as_deref().is_some_and(|s| !s.trim().is_empty()))
            .count();
        let mutual_sample = transformed as f64 / 2.0;

        let attunement_sample = match (moment.synthesis_resolution.is_some(), moment.mutual_acknowledgment) {
            (true, true) => 1.0,
            (true, false) => 0.5,
            (false, _) => 0.0,
        };

        Self {
            total_recognition_moments: self.total_recognition_moments + 1,
            dialectical_depth: mean(self.dialectical_depth, moment.struggle_depth),
            mutual_transformation_score: mean(self.mutual_transformation_score, mutual_sample),
            pedagogical_attunement: mean(self.pedagogical_attunement, attunement_sample),
        }
    }
}

/// Per-learner container for the three memory tiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WritingPad {
    pub id: Uuid,
    pub learner_id: String,
    pub conscious: ConsciousTier,
    pub preconscious: PreconsciousTier,
    pub unconscious: UnconsciousTier,
    pub metrics: PadMetrics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WritingPad {
    pub fn new(learner_id: impl Into<String>, fade_threshold_days: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            learner_id: learner_id.into(),
            conscious: ConsciousTier::default(),
            preconscious: PreconsciousTier::new(fade_threshold_days),
            unconscious: UnconsciousTier::default(),
            metrics: PadMetrics::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_conscious(mut self, conscious: ConsciousTier) -> Self {
        self.conscious = conscious;
        self
    }

    pub fn with_preconscious(mut self, preconscious: PreconsciousTier) -> Self {
        self.preconscious = preconscious;
        self
    }

    pub fn with_unconscious(mut self, unconscious: UnconsciousTier) -> Self {
        self.unconscious = unconscious;
        self
    }

    pub fn with_metrics(mut self, metrics: PadMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn touched(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = at;
        self
    }
}

// ==================== Recognition moments ====================

/// One side's stated position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub agent: String,
    pub position: String,
    pub reasoning: String,
}

impl Position {
    pub fn new(
        agent: impl Into<String>,
        position: impl Into<String>,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            agent: agent.into(),
            position: position.into(),
            reasoning: reasoning.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionMoment {
    pub id: Uuid,
    pub writing_pad_id: Uuid,
    pub session_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub thesis: Position,
    pub antithesis: Position,
    pub synthesis_resolution: Option<String>,
    pub ego_transformation: Option<String>,
    pub superego_transformation: Option<String>,
    pub learner_insight: Option<String>,
    pub mutual_acknowledgment: bool,
    pub recognition_type: RecognitionType,
    pub struggle_depth: f64,
    pub persistence_layer: PersistenceLayer,
    pub synthesis_strategy: SynthesisStrategy,
    pub transformative: bool,
    /// Negotiation parameters and the round-by-round transcript
    pub parameters: Value,
    pub consolidated_at: Option<DateTime<Utc>>,
}

impl RecognitionMoment {
    /// Consolidation eligibility at `now`.
    pub fn is_consolidation_eligible(
        &self,
        now: DateTime<Utc>,
        threshold_days: i64,
        struggle_threshold: f64,
    ) -> bool {
        self.persistence_layer != PersistenceLayer::Unconscious
            && (self.transformative || self.struggle_depth > struggle_threshold)
            && now - self.created_at >= Duration::days(threshold_days)
    }

    pub fn is_resolved(&self) -> bool {
        self.synthesis_resolution.is_some()
    }

    pub fn is_consolidated(&self) -> bool {
        self.persistence_layer == PersistenceLayer::Unconscious
    }
}

// ==================== Learner events ====================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnerEventType {
    Resistance,
    Breakthrough,
    Demand,
}

impl LearnerEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resistance => "resistance",
            Self::Breakthrough => "breakthrough",
            Self::Demand => "demand",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "resistance" => Some(Self::Resistance),
            "breakthrough" => Some(Self::Breakthrough),
            "demand" => Some(Self::Demand),
            _ => None,
        }
    }
}

/// Type-specific event fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum LearnerEventKind {
    Resistance {
        interpretation: String,
    },
    Breakthrough {
        trigger_event: String,
        evidence: String,
        recognition_achieved: bool,
    },
    Demand {
        category: String,
        strength: f64,
    },
}

impl LearnerEventKind {
    pub fn event_type(&self) -> LearnerEventType {
        match self {
            Self::Resistance { .. } => LearnerEventType::Resistance,
            Self::Breakthrough { .. } => LearnerEventType::Breakthrough,
            Self::Demand { .. } => LearnerEventType::Demand,
        }
    }

    /// Short label used as a pattern signature.
    pub fn signature(&self) -> &str {
        match self {
            Self::Resistance { interpretation } => interpretation,
            Self::Breakthrough { trigger_event, .. } => trigger_event,
            Self::Demand { category, .. } => category,
        }
    }
}

/// Append-only record of a learner reaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerEvent {
    pub id: Uuid,
    pub learner_id: String,
    pub writing_pad_id: Uuid,
    pub session_id: Option<String>,
    #[serde(flatten)]
    pub kind: LearnerEventKind,
    pub tutor_suggestion: Option<String>,
    pub learner_response: Option<String>,
    pub context_snapshot: Value,
    pub created_at: DateTime<Utc>,
}

impl LearnerEvent {
    pub fn new(pad: &WritingPad, kind: LearnerEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            learner_id: pad.learner_id.clone(),
            writing_pad_id: pad.id,
            session_id: None,
            kind,
            tutor_suggestion: None,
            learner_response: None,
            context_snapshot: Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_exchange(
        mut self,
        tutor_suggestion: Option<String>,
        learner_response: impl Into<String>,
    ) -> Self {
        self.tutor_suggestion = tutor_suggestion;
        self.learner_response = Some(learner_response.into());
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context_snapshot = context;
        self
    }

    pub fn event_type(&self) -> LearnerEventType {
        self.kind.event_type()
    }
}

// ==================== Sessions and milestones ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub learner_id: String,
    pub started_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub interactions: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneRecord {
    pub learner_id: String,
    pub milestone: String,
    pub achieved_at: DateTime<Utc>,
    /// Id of the qualifying record
    pub evidence: Option<String>,
}

// ==================== Retrieval ====================

/// Filter for unconscious-tier retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceQuery {
    pub recognition_type: Option<RecognitionType>,
    pub min_struggle_depth: Option<f64>,
    pub since: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl Default for TraceQuery {
    fn default() -> Self {
        Self {
            recognition_type: None,
            min_struggle_depth: None,
            since: None,
            limit: 5,
        }
    }
}

impl TraceQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recognition_type(mut self, t: RecognitionType) -> Self {
        self.recognition_type = Some(t);
        self
    }

    pub fn min_struggle_depth(mut self, depth: f64) -> Self {
        self.min_struggle_depth = Some(depth);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn matches(&self, trace: &Trace) -> bool {
        self.recognition_type.map_or(true, |t| trace.recognition_type == t)
            && self
                .min_struggle_depth
                .map_or(true, |d| trace.struggle_depth >= d)
            && self.since.map_or(true, |s| trace.timestamp >= s)
    }
}

/// Past memory surfaced for a negotiation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryContext {
    /// Matching traces, newest first
    pub traces: Vec<Trace>,
    pub archetype: LearnerArchetype,
    pub rules: Vec<ProvisionalRule>,
}

impl MemoryContext {
    pub fn is_empty(&self) -> bool {
        self.traces.is_empty() && self.archetype.is_unset() && self.rules.is_empty()
    }

    /// Render for inclusion in a prompt.
    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(ref style) = self.archetype.preferred_learning_style {
            out.push_str(&format!("Preferred learning style: {}\n", style));
        }
        if !self.archetype.common_struggles.is_empty() {
            out.push_str(&format!(
                "Common struggles: {}\n",
                self.archetype.common_struggles.join(", ")
            ));
        }
        if !self.archetype.breakthrough_patterns.is_empty() {
            out.push_str(&format!(
                "Breakthroughs followed: {}\n",
                self.archetype.breakthrough_patterns.join(", ")
            ));
        }
        for rule in &self.rules {
            out.push_str(&format!("Rule ({:.1}): {}\n", rule.confidence, rule.rule));
        }
        for trace in &self.traces {
            out.push_str(&format!(
                "Past {} moment (depth {:.2}): {}\n",
                trace.recognition_type, trace.struggle_depth, trace.synthesis
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn moment(pad: &WritingPad) -> RecognitionMoment {
        RecognitionMoment {
            id: Uuid::new_v4(),
            writing_pad_id: pad.id,
            session_id: None,
            created_at: Utc::now(),
            thesis: Position::new("ego", "draft", ""),
            antithesis: Position::new("superego", "critique", ""),
            synthesis_resolution: Some("agreed".into()),
            ego_transformation: Some("changed".into()),
            superego_transformation: None,
            learner_insight: None,
            mutual_acknowledgment: true,
            recognition_type: RecognitionType::Pedagogical,
            struggle_depth: 0.6,
            persistence_layer: PersistenceLayer::Conscious,
            synthesis_strategy: SynthesisStrategy::GhostDominates,
            transformative: true,
            parameters: Value::Null,
            consolidated_at: None,
        }
    }

    #[test]
    fn test_most_recent_distinct() {
        let values = ["a", "b", "a", "c", "d", "e", "f"].map(String::from);
        assert_eq!(most_recent_distinct(values, 5), vec!["a", "c", "d", "e", "f"]);
    }

    #[test]
    fn test_pad_metrics_running_mean() {
        let pad = WritingPad::new("l", 20);
        let m = moment(&pad);
        let metrics = PadMetrics::default().with_moment(&m);
        assert_eq!(metrics.total_recognition_moments, 1);
        assert_eq!(metrics.dialectical_depth, 0.6);
        assert_eq!(metrics.mutual_transformation_score, 0.5);
        assert_eq!(metrics.pedagogical_attunement, 1.0);

        let mut unresolved = m.clone();
        unresolved.synthesis_resolution = None;
        unresolved.struggle_depth = 0.2;
        let metrics = metrics.with_moment(&unresolved);
        assert_eq!(metrics.total_recognition_moments, 2);
        assert!((metrics.dialectical_depth - 0.4).abs() < 1e-9);
        assert!((metrics.pedagogical_attunement - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_consolidation_eligibility() {
        let pad = WritingPad::new("l", 20);
        let mut m = moment(&pad);
        let now = m.created_at + Duration::days(7);
        assert!(m.is_consolidation_eligible(now, 7, 0.6));
        assert!(!m.is_consolidation_eligible(now - Duration::hours(1), 7, 0.6));

        m.transformative = false;
        assert!(!m.is_consolidation_eligible(now, 7, 0.6));
        m.struggle_depth = 0.61;
        assert!(m.is_consolidation_eligible(now, 7, 0.6));

        m.persistence_layer = PersistenceLayer::Unconscious;
        assert!(!m.is_consolidation_eligible(now, 7, 0.6));
    }

    #[test]
    fn test_learner_event_serializes_flat() {
        let pad = WritingPad::new("l", 20);
        let event = LearnerEvent::new(
            &pad,
            LearnerEventKind::Demand {
                category: "answer".into(),
                strength: 0.9,
            },
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event_type"], "demand");
        assert_eq!(json["category"], "answer");
    }

    proptest! {
        #[test]
        fn prop_reinforcement_is_monotonic(steps in 1usize..30, start in 0.0f64..=1.0) {
            let now = Utc::now();
            let mut pattern = Pattern::detect(PatternType::SuggestionType, "practice", "seen", now);
            pattern.confidence = start;
            for i in 0..steps {
                let next = pattern.reinforce("seen again", now + Duration::minutes(i as i64));
                prop_assert!(next.confidence >= pattern.confidence);
                prop_assert!(next.confidence <= 1.0);
                prop_assert!(next.reinforcement_count > pattern.reinforcement_count);
                pattern = next;
            }
        }
    }
}
