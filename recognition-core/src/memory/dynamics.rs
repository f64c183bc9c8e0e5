//! Memory dynamics: promotion, consolidation, decay and retrieval.
//!
//! Promotion and decay are pure functions over tier snapshots; the
//! [`MemoryDynamics`] engine loads a pad, applies them, and writes the new
//! snapshot back. Consolidation is a maintenance pass and is never run
//! inline with an interaction.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::store::SqliteMemoryStore;
use super::types::*;
use crate::config::MemoryConfig;
use crate::error::Result;

/// Slack for accumulated float error when comparing confidence to a threshold.
const CONFIDENCE_EPSILON: f64 = 1e-9;

/// Confidence a suggestion-type pattern needs to set the learning style.
const STYLE_CONFIDENCE: f64 = 0.7;

/// Counts from one promotion pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionStats {
    pub detected: usize,
    pub reinforced: usize,
    pub rules_created: usize,
}

/// Outcome of one memory cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryCycleReport {
    pub learner_id: String,
    /// False when the conscious tier was already empty and nothing was written
    pub ran: bool,
    pub promotion: PromotionStats,
    /// Moments moved from the conscious to the preconscious layer
    pub moments_advanced: usize,
    pub context: Option<MemoryContext>,
}

/// Outcome of a consolidation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationReport {
    pub examined: usize,
    pub consolidated: Vec<Uuid>,
    pub summary: String,
}

/// Outcome of a decay pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecayReport {
    pub examined: usize,
    pub removed: usize,
    pub retained_by_confidence: usize,
}

/// Promote the conscious tier's contents into preconscious patterns.
///
/// Suggestion types recorded at least `min_occurrences` times, and the
/// resistance, breakthrough and demand notes, each detect a new pattern or
/// reinforce the existing one with the same type and signature. Patterns
/// that reach `rule_confidence` gain a provisional rule.
pub fn promote(
    conscious: &ConsciousTier,
    preconscious: &PreconsciousTier,
    config: &MemoryConfig,
    now: DateTime<Utc>,
) -> (PreconsciousTier, PromotionStats) {
    let mut next = preconscious.clone();
    let mut stats = PromotionStats::default();

    let mut type_counts: BTreeMap<&str, usize> = BTreeMap::new();
    for thought in &conscious.working_thoughts {
        *type_counts.entry(thought.suggestion_type.as_str()).or_default() += 1;
    }

    let mut observations: Vec<(PatternType, String, String)> = type_counts
        .into_iter()
        .filter(|(_, count)| *count >= config.promotion_min_occurrences)
        .map(|(kind, count)| {
            (
                PatternType::SuggestionType,
                kind.to_string(),
                format!("{} suggested {} times in one cycle", kind, count),
            )
        })
        .collect();

    let mut note_keys: Vec<&String> = conscious.ephemeral_notes.keys().collect();
    note_keys.sort();
    for key in note_keys {
        let Some(pattern_type) = PatternType::from_note_key(key) else {
            continue;
        };
        for signature in note_signatures(&conscious.ephemeral_notes[key]) {
            let observation = format!("{} observed: {}", key, signature);
            observations.push((pattern_type, signature, observation));
        }
    }

    for (pattern_type, signature, observation) in observations {
        match next
            .recent_patterns
            .iter_mut()
            .find(|p| p.matches(pattern_type, &signature))
        {
            Some(existing) => {
                *existing = existing.reinforce(observation, now);
                stats.reinforced += 1;
            }
            None => {
                next.recent_patterns
                    .push(Pattern::detect(pattern_type, signature, observation, now));
                stats.detected += 1;
            }
        }
    }

    let new_rules: Vec<ProvisionalRule> = next
        .recent_patterns
        .iter()
        .filter(|p| p.confidence + CONFIDENCE_EPSILON >= config.provisional_rule_confidence)
        .filter(|p| !next.has_rule_for(p))
        .map(|p| ProvisionalRule::from_pattern(p, now))
        .collect();
    stats.rules_created = new_rules.len();
    next.provisional_rules.extend(new_rules);

    (next, stats)
}

/// Signatures carried by an ephemeral note: a string, or a list of strings.
fn note_signatures(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s.clone()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(String::from)
            .collect(),
        Value::Bool(true) => vec!["observed".to_string()],
        _ => Vec::new(),
    }
}

/// Whether a pattern survives decay at `now`.
pub fn survives_decay(
    pattern: &Pattern,
    fade_threshold_days: i64,
    retention_confidence: f64,
    now: DateTime<Utc>,
) -> bool {
    pattern.confidence > retention_confidence
        || pattern.age(now) <= Duration::days(fade_threshold_days)
}

/// Drop stale patterns, and the rules derived from them.
pub fn decay(
    preconscious: &PreconsciousTier,
    retention_confidence: f64,
    now: DateTime<Utc>,
) -> (PreconsciousTier, DecayReport) {
    let fade_days = preconscious.fade_threshold_days;
    let mut report = DecayReport {
        examined: preconscious.recent_patterns.len(),
        ..DecayReport::default()
    };

    let (kept, removed): (Vec<Pattern>, Vec<Pattern>) = preconscious
        .recent_patterns
        .iter()
        .cloned()
        .partition(|p| survives_decay(p, fade_days, retention_confidence, now));

    report.removed = removed.len();
    report.retained_by_confidence = kept
        .iter()
        .filter(|p| p.age(now) > Duration::days(fade_days))
        .count();

    let rules = preconscious
        .provisional_rules
        .iter()
        .filter(|r| {
            !removed
                .iter()
                .any(|p| p.matches(r.pattern_type, &r.pattern_signature))
        })
        .cloned()
        .collect();

    let next = PreconsciousTier {
        recent_patterns: kept,
        provisional_rules: rules,
        fade_threshold_days: fade_days,
    };
    (next, report)
}

/// Matching traces of a pad, newest first, bounded by the query limit.
pub fn retrieve_context(pad: &WritingPad, query: &TraceQuery) -> MemoryContext {
    let mut traces: Vec<Trace> = pad
        .unconscious
        .permanent_traces
        .iter()
        .filter(|t| query.matches(t))
        .cloned()
        .collect();
    traces.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    traces.truncate(query.limit);

    MemoryContext {
        traces,
        archetype: pad.unconscious.learner_archetype.clone(),
        rules: pad.preconscious.provisional_rules.clone(),
    }
}

/// Store-backed memory engine.
pub struct MemoryDynamics {
    store: Arc<SqliteMemoryStore>,
    config: MemoryConfig,
}

impl MemoryDynamics {
    pub fn new(store: Arc<SqliteMemoryStore>, config: MemoryConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<SqliteMemoryStore> {
        &self.store
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Default retrieval query.
    pub fn default_query(&self) -> TraceQuery {
        TraceQuery::new().limit(self.config.retrieval_limit)
    }

    /// Context for the learner's next negotiation.
    pub fn context_for(&self, learner_id: &str, query: &TraceQuery) -> Result<MemoryContext> {
        let pad = self.store.require_writing_pad(learner_id)?;
        Ok(retrieve_context(&pad, query))
    }

    /// Promote, optionally retrieve, and clear the conscious tier.
    ///
    /// With an empty conscious tier nothing is written, so a second call
    /// after a completed cycle is a no-op.
    #[instrument(skip(self, query))]
    pub fn run_cycle(
        &self,
        learner_id: &str,
        query: Option<&TraceQuery>,
        now: DateTime<Utc>,
    ) -> Result<MemoryCycleReport> {
        let pad = self.store.require_writing_pad(learner_id)?;

        if pad.conscious.is_empty() {
            debug!("conscious tier empty, cycle skipped");
            return Ok(MemoryCycleReport {
                learner_id: learner_id.to_string(),
                ran: false,
                context: query.map(|q| retrieve_context(&pad, q)),
                ..MemoryCycleReport::default()
            });
        }

        let (preconscious, promotion) = promote(&pad.conscious, &pad.preconscious, &self.config, now);
        let pad = pad
            .with_preconscious(preconscious)
            .with_conscious(ConsciousTier::cleared(now))
            .touched(now);
        self.store.save_writing_pad(&pad)?;

        let moments_advanced = self.store.advance_layer(
            pad.id,
            PersistenceLayer::Conscious,
            PersistenceLayer::Preconscious,
        )?;

        info!(
            detected = promotion.detected,
            reinforced = promotion.reinforced,
            rules = promotion.rules_created,
            moments_advanced,
            "memory cycle complete"
        );

        Ok(MemoryCycleReport {
            learner_id: learner_id.to_string(),
            ran: true,
            promotion,
            moments_advanced,
            context: query.map(|q| retrieve_context(&pad, q)),
        })
    }

    /// Consolidate a learner's eligible moments into permanent traces.
    ///
    /// Traces are written to the pad before the moments are marked, and a
    /// moment that already has a trace gets none added, so an interrupted
    /// pass can simply be re-run.
    #[instrument(skip(self))]
    pub fn consolidate(&self, learner_id: &str, now: DateTime<Utc>) -> Result<ConsolidationReport> {
        let pad = self.store.require_writing_pad(learner_id)?;
        let candidates = self.store.unconsolidated_moments(pad.id)?;
        let examined = candidates.len();

        let eligible: Vec<RecognitionMoment> = candidates
            .into_iter()
            .filter(|m| {
                m.is_consolidation_eligible(
                    now,
                    self.config.consolidation_threshold_days,
                    self.config.consolidation_struggle_depth,
                )
            })
            .collect();

        if eligible.is_empty() {
            return Ok(ConsolidationReport {
                examined,
                consolidated: Vec::new(),
                summary: format!("No eligible moments among {}", examined),
            });
        }

        let mut unconscious = pad.unconscious.clone();
        for moment in &eligible {
            if unconscious.has_trace_for(moment.id) {
                continue;
            }
            unconscious.permanent_traces.push(Trace::from_moment(moment, now));

            let principle = moment.antithesis.reasoning.trim();
            if !principle.is_empty() {
                unconscious = unconscious.with_conflict(principle, !moment.is_resolved(), now);
                unconscious.superego_traces.push(SuperegoTrace {
                    moment_id: moment.id,
                    principle: principle.to_string(),
                    critique: moment.antithesis.position.clone(),
                    transformation: moment.superego_transformation.clone(),
                    recorded_at: now,
                });
            }
        }
        self.store
            .save_writing_pad(&pad.with_unconscious(unconscious).touched(now))?;

        let mut consolidated = Vec::new();
        for moment in &eligible {
            if self.store.mark_consolidated(moment.id, now)? {
                consolidated.push(moment.id);
            }
        }

        info!(examined, consolidated = consolidated.len(), "consolidation complete");
        Ok(ConsolidationReport {
            examined,
            summary: format!("Consolidated {} of {} moments", consolidated.len(), examined),
            consolidated,
        })
    }

    /// Drop a learner's stale patterns.
    #[instrument(skip(self))]
    pub fn decay(&self, learner_id: &str, now: DateTime<Utc>) -> Result<DecayReport> {
        let pad = self.store.require_writing_pad(learner_id)?;
        let (preconscious, report) = decay(&pad.preconscious, self.config.retention_confidence, now);

        if report.removed > 0 {
            self.store
                .save_writing_pad(&pad.with_preconscious(preconscious).touched(now))?;
            debug!(removed = report.removed, "stale patterns dropped");
        }
        Ok(report)
    }

    /// Consolidation then decay for every learner.
    ///
    /// Stops at the first store failure and returns it. No learner locks
    /// are taken; alongside live interactions use
    /// [`crate::PipelineOrchestrator::run_maintenance`].
    pub fn run_maintenance(&self, now: DateTime<Utc>) -> Result<MaintenanceReport> {
        let mut report = MaintenanceReport::default();
        for learner_id in self.store.learner_ids()? {
            report.absorb(self.maintain_learner(&learner_id, now)?);
        }
        info!(
            learners = report.learners,
            consolidated = report.consolidated,
            patterns_removed = report.patterns_removed,
            "maintenance pass complete"
        );
        Ok(report)
    }

    /// Consolidation then decay for one learner.
    pub fn maintain_learner(&self, learner_id: &str, now: DateTime<Utc>) -> Result<MaintenanceReport> {
        let consolidation = self.consolidate(learner_id, now)?;
        let decay = self.decay(learner_id, now)?;
        Ok(MaintenanceReport {
            learners: 1,
            consolidated: consolidation.consolidated.len(),
            patterns_removed: decay.removed,
        })
    }

    /// Recompute the learner archetype from events and patterns.
    ///
    /// The pad is only written when the archetype changed.
    #[instrument(skip(self))]
    pub fn refresh_archetype(&self, learner_id: &str, now: DateTime<Utc>) -> Result<LearnerArchetype> {
        let pad = self.store.require_writing_pad(learner_id)?;
        let events = self.store.events_for_learner(learner_id)?;

        let struggles = most_recent_distinct(
            events.iter().filter_map(|e| match &e.kind {
                LearnerEventKind::Resistance { interpretation } if !interpretation.is_empty() => {
                    Some(interpretation.clone())
                }
                _ => None,
            }),
            ARCHETYPE_LIST_LIMIT,
        );
        let breakthroughs = most_recent_distinct(
            events.iter().filter_map(|e| match &e.kind {
                LearnerEventKind::Breakthrough { trigger_event, .. } if !trigger_event.is_empty() => {
                    Some(trigger_event.clone())
                }
                _ => None,
            }),
            ARCHETYPE_LIST_LIMIT,
        );

        let style = pad
            .preconscious
            .recent_patterns
            .iter()
            .filter(|p| p.pattern_type == PatternType::SuggestionType)
            .filter(|p| p.confidence + CONFIDENCE_EPSILON >= STYLE_CONFIDENCE)
            .max_by(|a, b| {
                a.confidence
                    .total_cmp(&b.confidence)
                    .then(a.reinforcement_count.cmp(&b.reinforcement_count))
            })
            .map(|p| p.signature.clone());

        let current = &pad.unconscious.learner_archetype;
        let preferred_learning_style = style.or_else(|| current.preferred_learning_style.clone());

        if current.preferred_learning_style == preferred_learning_style
            && current.common_struggles == struggles
            && current.breakthrough_patterns == breakthroughs
        {
            return Ok(current.clone());
        }

        let archetype = LearnerArchetype {
            preferred_learning_style,
            common_struggles: struggles,
            breakthrough_patterns: breakthroughs,
            last_updated: Some(now),
        };
        let mut unconscious = pad.unconscious.clone();
        unconscious.learner_archetype = archetype.clone();
        if let Err(e) = self
            .store
            .save_writing_pad(&pad.with_unconscious(unconscious).touched(now))
        {
            warn!(error = %e, "failed to save refreshed archetype");
            return Err(e);
        }
        Ok(archetype)
    }
}

/// Totals from a maintenance pass over all learners.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub learners: usize,
    pub consolidated: usize,
    pub patterns_removed: usize,
}

impl MaintenanceReport {
    pub fn absorb(&mut self, other: MaintenanceReport) {
        self.learners += other.learners;
        self.consolidated += other.consolidated;
        self.patterns_removed += other.patterns_removed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use serde_json::json;

    fn engine() -> MemoryDynamics {
        MemoryDynamics::new(
            Arc::new(SqliteMemoryStore::in_memory().unwrap()),
            MemoryConfig::default(),
        )
    }

    fn moment(pad: &WritingPad, created_at: DateTime<Utc>, transformative: bool) -> RecognitionMoment {
        RecognitionMoment {
            id: Uuid::new_v4(),
            writing_pad_id: pad.id,
            session_id: Some("s-1".into()),
            created_at,
            thesis: Position::new("ego", "The answer is n * fact(n - 1)", ""),
            antithesis: Position::new("superego", "Gives the answer away", "productive_struggle"),
            synthesis_resolution: Some("Ask for the base case".into()),
            ego_transformation: Some("Questions first".into()),
            superego_transformation: None,
            learner_insight: None,
            mutual_acknowledgment: true,
            recognition_type: RecognitionType::Pedagogical,
            struggle_depth: 0.4,
            persistence_layer: PersistenceLayer::Conscious,
            synthesis_strategy: SynthesisStrategy::GhostDominates,
            transformative,
            parameters: Value::Null,
            consolidated_at: None,
        }
    }

    #[test]
    fn test_promote_repeated_suggestion_types() {
        let now = Utc::now();
        let conscious = ConsciousTier::default()
            .with_thought(ThoughtRecord::new("practice", "a"))
            .with_thought(ThoughtRecord::new("practice", "b"))
            .with_thought(ThoughtRecord::new("lecture", "c"))
            .with_note("resistance", json!("disengagement"));

        let (pre, stats) = promote(&conscious, &PreconsciousTier::new(20), &MemoryConfig::default(), now);
        assert_eq!(stats.detected, 2);
        assert!(pre.find(PatternType::SuggestionType, "practice").is_some());
        assert!(pre.find(PatternType::SuggestionType, "lecture").is_none());
        assert!(pre.find(PatternType::Resistance, "disengagement").is_some());

        let (pre, stats) = promote(&conscious, &pre, &MemoryConfig::default(), now);
        assert_eq!(stats.reinforced, 2);
        let practice = pre.find(PatternType::SuggestionType, "practice").unwrap();
        assert_eq!(practice.reinforcement_count, 2);
        assert!((practice.confidence - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_promote_creates_rule_at_threshold() {
        let now = Utc::now();
        let conscious = ConsciousTier::default().with_note("demand", json!("answer"));
        let config = MemoryConfig::default();

        let mut pre = PreconsciousTier::new(20);
        for _ in 0..4 {
            pre = promote(&conscious, &pre, &config, now).0;
        }
        assert_eq!(pre.provisional_rules.len(), 1);
        assert_eq!(pre.provisional_rules[0].pattern_signature, "answer");

        let (pre, stats) = promote(&conscious, &pre, &config, now);
        assert_eq!(stats.rules_created, 0);
        assert_eq!(pre.provisional_rules.len(), 1);
    }

    #[test]
    fn test_decay_drops_stale_low_confidence() {
        let now = Utc::now();
        let old = now - Duration::days(21);
        let mut pre = PreconsciousTier::new(20);
        pre.recent_patterns.push(Pattern::detect(PatternType::Demand, "answer", "x", old));
        let mut strong = Pattern::detect(PatternType::Demand, "hint", "x", old);
        strong.confidence = 0.9;
        pre.recent_patterns.push(strong);
        pre.recent_patterns.push(Pattern::detect(PatternType::Demand, "fresh", "x", now));

        let (next, report) = decay(&pre, 0.8, now);
        assert_eq!(report.removed, 1);
        assert_eq!(report.retained_by_confidence, 1);
        assert!(next.find(PatternType::Demand, "answer").is_none());
        assert!(next.find(PatternType::Demand, "hint").is_some());
        assert!(next.find(PatternType::Demand, "fresh").is_some());
    }

    #[test]
    fn test_cycle_clears_conscious_and_second_call_is_noop() {
        let engine = engine();
        let store = engine.store().clone();
        let pad = store.get_or_initialize_writing_pad("learner-1", 20).unwrap();
        store
            .save_writing_pad(
                &pad.clone().with_conscious(
                    ConsciousTier::default()
                        .with_thought(ThoughtRecord::new("practice", "a"))
                        .with_thought(ThoughtRecord::new("practice", "b")),
                ),
            )
            .unwrap();
        store.insert_moment(&moment(&pad, Utc::now(), true)).unwrap();

        let now = Utc::now();
        let first = engine.run_cycle("learner-1", None, now).unwrap();
        assert!(first.ran);
        assert_eq!(first.promotion.detected, 1);
        assert_eq!(first.moments_advanced, 1);

        let after_first = store.require_writing_pad("learner-1").unwrap();
        assert!(after_first.conscious.working_thoughts.is_empty());

        let second = engine.run_cycle("learner-1", None, now).unwrap();
        assert!(!second.ran);
        assert_eq!(store.require_writing_pad("learner-1").unwrap(), after_first);
    }

    #[test]
    fn test_consolidation_is_idempotent() {
        let engine = engine();
        let store = engine.store().clone();
        let pad = store.get_or_initialize_writing_pad("learner-1", 20).unwrap();
        let now = Utc::now();
        let eligible = moment(&pad, now - Duration::days(8), true);
        let young = moment(&pad, now - Duration::days(2), true);
        let mut shallow = moment(&pad, now - Duration::days(8), false);
        shallow.struggle_depth = 0.3;
        for m in [&eligible, &young, &shallow] {
            store.insert_moment(m).unwrap();
        }

        let first = engine.consolidate("learner-1", now).unwrap();
        assert_eq!(first.consolidated, vec![eligible.id]);
        let pad_after = store.require_writing_pad("learner-1").unwrap();
        assert_eq!(pad_after.unconscious.permanent_traces.len(), 1);
        assert_eq!(pad_after.unconscious.conflict_patterns[0].principle, "productive_struggle");
        let stored = store.get_moment(eligible.id).unwrap().unwrap();

        let second = engine.consolidate("learner-1", now + Duration::hours(1)).unwrap();
        assert!(second.consolidated.is_empty());
        assert_eq!(store.get_moment(eligible.id).unwrap().unwrap(), stored);
        assert_eq!(
            store.require_writing_pad("learner-1").unwrap().unconscious.permanent_traces.len(),
            1
        );
    }

    #[test]
    fn test_retrieve_context_filters_and_orders() {
        let mut pad = WritingPad::new("learner-1", 20);
        let now = Utc::now();
        for (i, (kind, depth)) in [
            (RecognitionType::Existential, 0.9),
            (RecognitionType::Pedagogical, 0.7),
            (RecognitionType::Existential, 0.2),
            (RecognitionType::Existential, 0.8),
        ]
        .into_iter()
        .enumerate()
        {
            let mut m = moment(&pad, now, true);
            m.recognition_type = kind;
            m.struggle_depth = depth;
            pad.unconscious
                .permanent_traces
                .push(Trace::from_moment(&m, now + Duration::minutes(i as i64)));
        }

        let query = TraceQuery::new()
            .recognition_type(RecognitionType::Existential)
            .min_struggle_depth(0.5)
            .limit(5);
        let context = retrieve_context(&pad, &query);
        let depths: Vec<f64> = context.traces.iter().map(|t| t.struggle_depth).collect();
        assert_eq!(depths, vec![0.8, 0.9]);

        let bounded = retrieve_context(&pad, &TraceQuery::new().limit(1));
        assert_eq!(bounded.traces.len(), 1);
    }

    #[test]
    fn test_refresh_archetype_from_events() {
        let engine = engine();
        let store = engine.store().clone();
        let pad = store.get_or_initialize_writing_pad("learner-1", 20).unwrap();
        for interpretation in ["confusion", "frustration", "confusion"] {
            store
                .insert_event(&LearnerEvent::new(
                    &pad,
                    LearnerEventKind::Resistance {
                        interpretation: interpretation.into(),
                    },
                ))
                .unwrap();
        }

        let archetype = engine.refresh_archetype("learner-1", Utc::now()).unwrap();
        assert_eq!(archetype.common_struggles, vec!["frustration", "confusion"]);
        assert!(archetype.last_updated.is_some());
        assert_eq!(
            store
                .require_writing_pad("learner-1")
                .unwrap()
                .unconscious
                .learner_archetype,
            archetype
        );
    }

    proptest! {
        #[test]
        fn prop_decay_rule(confidence in 0.0f64..=1.0, age_days in 0i64..60) {
            let now = Utc::now();
            let mut pattern = Pattern::detect(PatternType::Resistance, "x", "x", now - Duration::days(age_days));
            pattern.confidence = confidence;
            let survives = survives_decay(&pattern, 20, 0.8, now);
            if confidence > 0.8 {
                prop_assert!(survives);
            } else if age_days > 20 {
                prop_assert!(!survives);
            }
        }
    }
}
