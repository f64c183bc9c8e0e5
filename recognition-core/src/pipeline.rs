//! Per-interaction pipeline.
//!
//! One call to [`PipelineOrchestrator::process_interaction`] runs the whole
//! loop for a learner:
//! 1. INITIALIZE: get or create the writing pad and register the session
//! 2. CLASSIFY: turn the learner's latest response into learner events
//! 3. NEGOTIATE: simple or dialectical negotiation of new suggestions
//! 4. RECORD: write suggestions and event flags to the conscious tier
//! 5. CYCLE: promote, retrieve and clear; refresh the archetype
//! 6. MEASURE: recompute depth and persist newly achieved milestones
//!
//! Interactions for the same learner are serialized; different learners
//! run independently.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use crate::config::EngineConfig;
use crate::dialectic::{DialecticalNegotiator, DialecticalParams, DialecticalResult};
use crate::error::{Error, Result};
use crate::events::LearnerEventClassifier;
use crate::llm::{TextGenerator, TimeoutGenerator};
use crate::memory::{
    LearnerEvent, MaintenanceReport, MemoryCycleReport, MemoryDynamics, RecentMoments,
    SqliteMemoryStore, ThoughtRecord, WritingPad,
};
use crate::metrics::{Milestone, RecognitionDepth, RecognitionMetrics};
use crate::negotiation::{NegotiationController, NegotiationOptions, NegotiationResult};
use crate::roles::{CritiqueReviewer, CurriculumContext, LearnerContext, Suggestion, SuggestionGenerator};

/// Which negotiation mode an interaction runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum NegotiationMode {
    Simple(NegotiationOptions),
    Dialectical(DialecticalParams),
}

impl Default for NegotiationMode {
    fn default() -> Self {
        Self::Simple(NegotiationOptions::default())
    }
}

/// Input for one interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    pub learner: LearnerContext,
    pub curriculum: CurriculumContext,
    /// The learner's response to the previous suggestion
    pub learner_response: Option<String>,
    /// Type of the previous suggestion, used as a breakthrough trigger
    pub previous_suggestion: Option<String>,
    pub mode: NegotiationMode,
}

impl Interaction {
    pub fn new(learner: LearnerContext, curriculum: CurriculumContext) -> Self {
        Self {
            learner,
            curriculum,
            learner_response: None,
            previous_suggestion: None,
            mode: NegotiationMode::default(),
        }
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.learner_response = Some(response.into());
        self
    }

    pub fn with_previous_suggestion(mut self, suggestion_type: impl Into<String>) -> Self {
        self.previous_suggestion = Some(suggestion_type.into());
        self
    }

    pub fn with_mode(mut self, mode: NegotiationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn dialectical(self, params: DialecticalParams) -> Self {
        self.with_mode(NegotiationMode::Dialectical(params))
    }
}

/// Result of one interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InteractionOutcome {
    pub learner_id: String,
    pub session_id: Option<String>,
    /// Suggestions to show the learner
    pub suggestions: Vec<Suggestion>,
    /// Set in simple mode
    pub negotiation: Option<NegotiationResult>,
    /// Set in dialectical mode when a draft was available
    pub dialectic: Option<DialecticalResult>,
    pub events: Vec<LearnerEvent>,
    pub cycle: Option<MemoryCycleReport>,
    pub depth: Option<RecognitionDepth>,
    /// Milestones first achieved by this interaction
    pub new_milestones: Vec<Milestone>,
    /// Store failures that did not prevent a result
    pub memory_errors: Vec<String>,
}

/// Per-learner async locks.
///
/// An entry lives only while some caller holds or waits for it, so the
/// table stays as small as the set of learners currently in flight.
#[derive(Default)]
pub struct LearnerLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl LearnerLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a learner.
    pub async fn acquire(&self, learner_id: &str) -> Result<LearnerGuard<'_>> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|e| Error::Internal(format!("Failed to lock learner table: {}", e)))?;
            locks
                .entry(learner_id.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        Ok(LearnerGuard {
            guard: Some(lock.lock_owned().await),
            learner_id: learner_id.to_string(),
            locks: self,
        })
    }

    /// Drop the entry unless another caller still holds or waits for it.
    /// Callers clone the entry under the table lock, so a count of one
    /// means only the table refers to it.
    fn release(&self, learner_id: &str) {
        let Ok(mut locks) = self.locks.lock() else {
            return;
        };
        if locks
            .get(learner_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(learner_id);
        }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().map(|l| l.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one learner; released on drop.
pub struct LearnerGuard<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    learner_id: String,
    locks: &'a LearnerLocks,
}

impl Drop for LearnerGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.locks.release(&self.learner_id);
    }
}

/// Runs interactions end to end against one memory store.
pub struct PipelineOrchestrator {
    store: Arc<SqliteMemoryStore>,
    generator: Arc<SuggestionGenerator>,
    controller: NegotiationController,
    negotiator: DialecticalNegotiator,
    dynamics: MemoryDynamics,
    metrics: RecognitionMetrics,
    classifier: LearnerEventClassifier,
    recent: Arc<RecentMoments>,
    locks: LearnerLocks,
    config: EngineConfig,
}

impl PipelineOrchestrator {
    /// Both roles share one text generator.
    pub fn new(
        store: Arc<SqliteMemoryStore>,
        generator: Arc<dyn TextGenerator>,
        config: EngineConfig,
    ) -> Result<Self> {
        Self::with_role_generators(store, generator.clone(), generator, config)
    }

    /// Separate text generators for the suggestion generator and the
    /// critique reviewer. Both are bounded by the configured timeout.
    pub fn with_role_generators(
        store: Arc<SqliteMemoryStore>,
        ego: Arc<dyn TextGenerator>,
        superego: Arc<dyn TextGenerator>,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let timeout = Duration::from_secs(config.generation.timeout_secs);
        let ego: Arc<dyn TextGenerator> = Arc::new(TimeoutGenerator::new(ego, timeout));
        let superego: Arc<dyn TextGenerator> = Arc::new(TimeoutGenerator::new(superego, timeout));

        let generator = Arc::new(SuggestionGenerator::from_config(ego, &config));
        let reviewer = Arc::new(CritiqueReviewer::from_config(superego, &config));
        let recent = Arc::new(
            RecentMoments::new(config.memory.recent_moment_capacity)
                .with_learner_limit(config.memory.recent_learner_limit),
        );

        Ok(Self {
            controller: NegotiationController::new(
                generator.clone(),
                reviewer.clone(),
                config.negotiation.clone(),
            ),
            negotiator: DialecticalNegotiator::new(
                generator.clone(),
                reviewer,
                config.dialectic.clone(),
            )
            .with_store(store.clone())
            .with_recent(recent.clone()),
            dynamics: MemoryDynamics::new(store.clone(), config.memory.clone()),
            metrics: RecognitionMetrics::new(store.clone()),
            classifier: LearnerEventClassifier::new(),
            locks: LearnerLocks::new(),
            generator,
            recent,
            store,
            config,
        })
    }

    pub fn store(&self) -> &Arc<SqliteMemoryStore> {
        &self.store
    }

    pub fn dynamics(&self) -> &MemoryDynamics {
        &self.dynamics
    }

    pub fn metrics(&self) -> &RecognitionMetrics {
        &self.metrics
    }

    pub fn recent(&self) -> &Arc<RecentMoments> {
        &self.recent
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn process_interaction(&self, interaction: Interaction) -> Result<InteractionOutcome> {
        self.process_interaction_at(interaction, Utc::now()).await
    }

    /// Run one interaction with an explicit clock.
    ///
    /// Fails only when the writing pad cannot be initialized or loaded.
    /// Later store failures are logged and returned in
    /// [`InteractionOutcome::memory_errors`].
    #[instrument(skip_all, fields(learner_id = %interaction.learner.learner_id))]
    pub async fn process_interaction_at(
        &self,
        interaction: Interaction,
        now: DateTime<Utc>,
    ) -> Result<InteractionOutcome> {
        let learner_id = interaction.learner.learner_id.clone();
        let _guard = self.locks.acquire(&learner_id).await?;

        let pad = self
            .store
            .get_or_initialize_writing_pad(&learner_id, self.config.memory.fade_threshold_days)?;
        let session_id = interaction.learner.session_id.clone();

        let mut outcome = InteractionOutcome {
            learner_id: learner_id.clone(),
            session_id: session_id.clone(),
            suggestions: Vec::new(),
            negotiation: None,
            dialectic: None,
            events: Vec::new(),
            cycle: None,
            depth: None,
            new_milestones: Vec::new(),
            memory_errors: Vec::new(),
        };

        if let Some(ref session) = session_id {
            if let Err(e) = self.store.touch_session(&learner_id, session, now) {
                record_failure(&mut outcome, "session registration", e);
            }
        }

        outcome.events = self.classify_events(&pad, &interaction, now);
        let insert_failures: Vec<Error> = outcome
            .events
            .iter()
            .filter_map(|event| self.store.insert_event(event).err())
            .collect();
        for e in insert_failures {
            record_failure(&mut outcome, "event insert", e);
        }

        match &interaction.mode {
            NegotiationMode::Simple(options) => {
                let result = self
                    .controller
                    .negotiate(&interaction.learner, &interaction.curriculum, options)
                    .await;
                outcome.suggestions = result.suggestions.clone();
                outcome.negotiation = Some(result);
            }
            NegotiationMode::Dialectical(params) => {
                let (suggestions, result) = self.negotiate_dialectically(&interaction, params).await?;
                outcome.suggestions = suggestions;
                outcome.dialectic = result;
            }
        }

        if let Err(e) = self.record_conscious(&learner_id, &outcome, now) {
            record_failure(&mut outcome, "conscious update", e);
        }

        let query = self.dynamics.default_query();
        match self.dynamics.run_cycle(&learner_id, Some(&query), now) {
            Ok(report) => outcome.cycle = Some(report),
            Err(e) => record_failure(&mut outcome, "memory cycle", e),
        }
        if let Err(e) = self.dynamics.refresh_archetype(&learner_id, now) {
            record_failure(&mut outcome, "archetype refresh", e);
        }

        match self.metrics.depth(&learner_id) {
            Ok(depth) => outcome.depth = Some(depth),
            Err(e) => record_failure(&mut outcome, "depth", e),
        }
        match self.record_milestones(&learner_id) {
            Ok(new) => outcome.new_milestones = new,
            Err(e) => record_failure(&mut outcome, "milestones", e),
        }

        info!(
            suggestions = outcome.suggestions.len(),
            events = outcome.events.len(),
            new_milestones = outcome.new_milestones.len(),
            errors = outcome.memory_errors.len(),
            "interaction processed"
        );
        Ok(outcome)
    }

    /// Consolidation and decay for every learner.
    ///
    /// Each learner is maintained under its lock, so a pass never
    /// interleaves with an interaction for the same learner. Stops at the
    /// first store failure.
    #[instrument(skip(self))]
    pub async fn run_maintenance(&self, now: DateTime<Utc>) -> Result<MaintenanceReport> {
        let mut report = MaintenanceReport::default();
        for learner_id in self.store.learner_ids()? {
            let _guard = self.locks.acquire(&learner_id).await?;
            report.absorb(self.dynamics.maintain_learner(&learner_id, now)?);
        }
        info!(
            learners = report.learners,
            consolidated = report.consolidated,
            patterns_removed = report.patterns_removed,
            "maintenance pass complete"
        );
        Ok(report)
    }

    pub fn locks(&self) -> &LearnerLocks {
        &self.locks
    }

    fn classify_events(
        &self,
        pad: &WritingPad,
        interaction: &Interaction,
        now: DateTime<Utc>,
    ) -> Vec<LearnerEvent> {
        let Some(ref response) = interaction.learner_response else {
            return Vec::new();
        };
        let context = json!({
            "summary": interaction.learner.summary,
            "struggles": interaction.learner.struggles,
        });

        self.classifier
            .classify(response, interaction.previous_suggestion.as_deref())
            .into_iter()
            .map(|kind| {
                let mut event = LearnerEvent::new(pad, kind)
                    .with_session(interaction.learner.session_id.clone())
                    .with_exchange(interaction.previous_suggestion.clone(), response.as_str())
                    .with_context(context.clone());
                event.created_at = now;
                event
            })
            .collect()
    }

    /// Draft, then negotiate the rendered draft. An unresolved conflict
    /// leaves the draft standing.
    async fn negotiate_dialectically(
        &self,
        interaction: &Interaction,
        params: &DialecticalParams,
    ) -> Result<(Vec<Suggestion>, Option<DialecticalResult>)> {
        let learner = &interaction.learner;
        let Some(draft) = self.generator.draft(learner, &interaction.curriculum).await else {
            warn!("no usable draft for dialectical negotiation");
            return Ok((Vec::new(), None));
        };
        let draft_text = draft.render();

        let memory = match self.dynamics.context_for(&learner.learner_id, &self.dynamics.default_query()) {
            Ok(context) => Some(context),
            Err(e) => {
                warn!(error = %e, "memory context unavailable");
                None
            }
        };

        let mut params = params.clone();
        if params.session_id.is_none() {
            params.session_id = learner.session_id.clone();
        }

        let result = self
            .negotiator
            .negotiate_dialectically(&learner.learner_id, &draft_text, learner, memory.as_ref(), &params)
            .await?;

        let suggestions = match result.resolution {
            Some(ref resolution) if *resolution != draft_text => draft
                .suggestions
                .first()
                .map(|first| vec![first.clone().with_message(resolution.clone())])
                .unwrap_or_default(),
            _ => draft.suggestions,
        };
        Ok((suggestions, Some(result)))
    }

    fn record_conscious(
        &self,
        learner_id: &str,
        outcome: &InteractionOutcome,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let pad = self.store.require_writing_pad(learner_id)?;
        let mut conscious = pad.conscious.clone();

        for suggestion in &outcome.suggestions {
            let mut thought = ThoughtRecord::new(suggestion.kind.to_string(), suggestion.render());
            thought.recorded_at = now;
            conscious = conscious.with_thought(thought);
        }

        let mut notes: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
        for event in &outcome.events {
            notes
                .entry(event.event_type().as_str())
                .or_default()
                .push(event.kind.signature().to_string());
        }
        for (key, signatures) in notes {
            let merged = merge_note(conscious.ephemeral_notes.get(key), signatures);
            conscious = conscious.with_note(key, merged);
        }

        if conscious == pad.conscious {
            debug!("nothing to record in the conscious tier");
            return Ok(());
        }
        self.store
            .save_writing_pad(&pad.with_conscious(conscious).touched(now))
    }

    /// Persist achieved milestones that were not yet recorded.
    fn record_milestones(&self, learner_id: &str) -> Result<Vec<Milestone>> {
        let mut recorded = Vec::new();
        for status in self.metrics.milestones(learner_id)? {
            let Some(record) = status.to_record(learner_id) else {
                continue;
            };
            if self.store.record_milestone(&record)? {
                info!(milestone = %status.milestone, "milestone achieved");
                recorded.push(status.milestone);
            }
        }
        Ok(recorded)
    }
}

fn record_failure(outcome: &mut InteractionOutcome, step: &str, error: Error) {
    warn!(step, error = %error, "memory step failed");
    outcome.memory_errors.push(format!("{}: {}", step, error));
}

/// Signatures already noted plus new ones, without duplicates.
fn merge_note(existing: Option<&Value>, signatures: Vec<String>) -> Value {
    let mut merged: Vec<String> = match existing {
        Some(Value::String(s)) => vec![s.clone()],
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect(),
        _ => Vec::new(),
    };
    for signature in signatures {
        if !merged.contains(&signature) {
            merged.push(signature);
        }
    }
    json!(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedGenerator;
    use crate::memory::{LearnerEventType, PersistenceLayer, SynthesisStrategy};

    const DRAFT: &str = r#"{"suggestions": [{"type": "practice", "title": "Base case", "message": "The answer is n * fact(n - 1), just copy it."}]}"#;
    const APPROVE: &str = r#"{"approved": true, "feedback": "Good"}"#;
    const CRITIQUE: &str = r#"{"disapproves": true, "severity": 0.8, "critique": "Hands over the solution", "principle": "productive_struggle"}"#;
    const EGO: &str = r#"{"acknowledgment": "Fair, it gives too much away", "revision": "What should fact(0) return?", "transformation": "I see a question can carry the explanation"}"#;
    const ACCEPT: &str = r#"{"accepts": true, "transformation": "A pointed question gives enough structure"}"#;

    fn orchestrator(script: ScriptedGenerator) -> PipelineOrchestrator {
        let store = Arc::new(SqliteMemoryStore::in_memory().unwrap());
        PipelineOrchestrator::new(store, Arc::new(script), EngineConfig::default()).unwrap()
    }

    fn interaction() -> Interaction {
        Interaction::new(
            LearnerContext::new("learner-1", "Stuck on recursion").with_session("s-1"),
            CurriculumContext::new().with_lesson("Recursion"),
        )
    }

    #[tokio::test]
    async fn test_simple_interaction_clears_conscious() {
        let p = orchestrator(ScriptedGenerator::new().with_reply(DRAFT).with_reply(APPROVE));
        let outcome = p.process_interaction(interaction()).await.unwrap();

        assert_eq!(outcome.suggestions.len(), 1);
        assert!(outcome.negotiation.as_ref().unwrap().converged);
        assert!(outcome.cycle.as_ref().unwrap().ran);
        assert!(outcome.memory_errors.is_empty());

        let pad = p.store().require_writing_pad("learner-1").unwrap();
        assert!(pad.conscious.is_empty());
        assert_eq!(p.store().sessions_for_learner("learner-1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_learner_response_becomes_events_and_patterns() {
        let p = orchestrator(ScriptedGenerator::new().with_reply(DRAFT).with_reply(APPROVE));
        let outcome = p
            .process_interaction(
                interaction()
                    .with_response("Oh I see, now I get it")
                    .with_previous_suggestion("practice"),
            )
            .await
            .unwrap();

        assert_eq!(outcome.events.len(), 1);
        assert_eq!(outcome.events[0].event_type(), LearnerEventType::Breakthrough);
        assert_eq!(p.store().events_for_learner("learner-1").unwrap().len(), 1);

        let pad = p.store().require_writing_pad("learner-1").unwrap();
        assert!(pad
            .preconscious
            .recent_patterns
            .iter()
            .any(|pattern| pattern.signature == "practice"));
        assert_eq!(
            pad.unconscious.learner_archetype.breakthrough_patterns,
            vec!["practice".to_string()]
        );
    }

    #[tokio::test]
    async fn test_dialectical_interaction_records_moment() {
        let p = orchestrator(
            ScriptedGenerator::new()
                .with_reply(DRAFT)
                .with_reply(CRITIQUE)
                .with_reply(EGO)
                .with_reply(ACCEPT),
        );
        let outcome = p
            .process_interaction(interaction().dialectical(DialecticalParams::new()))
            .await
            .unwrap();

        let result = outcome.dialectic.unwrap();
        assert!(result.persisted);
        assert_eq!(result.strategy, SynthesisStrategy::DialecticalSynthesis);
        assert_eq!(outcome.suggestions[0].message, "What should fact(0) return?");
        assert!(outcome.new_milestones.contains(&Milestone::FirstMutualAcknowledgment));
        assert!(outcome
            .new_milestones
            .contains(&Milestone::FirstDialecticalSynthesis));

        let pad = p.store().require_writing_pad("learner-1").unwrap();
        let moments = p.store().moments_for_pad(pad.id).unwrap();
        assert_eq!(moments.len(), 1);
        assert_eq!(moments[0].persistence_layer, PersistenceLayer::Preconscious);
        assert_eq!(moments[0].session_id.as_deref(), Some("s-1"));
        assert_eq!(p.recent().recent("learner-1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_milestones_recorded_once() {
        let p = orchestrator(
            ScriptedGenerator::new()
                .with_reply(DRAFT)
                .with_reply(CRITIQUE)
                .with_reply(EGO)
                .with_reply(ACCEPT)
                .with_reply(DRAFT)
                .with_reply(APPROVE),
        );
        let first = p
            .process_interaction(interaction().dialectical(DialecticalParams::new()))
            .await
            .unwrap();
        assert!(!first.new_milestones.is_empty());

        let second = p.process_interaction(interaction()).await.unwrap();
        assert!(second.new_milestones.is_empty());
    }

    #[tokio::test]
    async fn test_learner_locks_drop_idle_entries() {
        let locks = LearnerLocks::new();
        drop(locks.acquire("a").await.unwrap());
        drop(locks.acquire("a").await.unwrap());
        let b = locks.acquire("b").await.unwrap();
        assert_eq!(locks.len(), 1);
        drop(b);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_learner_lock_kept_while_waited_on() {
        let locks = LearnerLocks::new();
        let held = locks.acquire("a").await.unwrap();

        let waiting = locks.acquire("a");
        tokio::pin!(waiting);
        let timed_out = tokio::time::timeout(Duration::from_millis(20), &mut waiting).await;
        assert!(timed_out.is_err());

        drop(held);
        assert_eq!(locks.len(), 1);
        drop(waiting.await.unwrap());
        assert!(locks.is_empty());
    }

    #[test]
    fn test_merge_note_deduplicates() {
        let merged = merge_note(Some(&json!(["confusion"])), vec!["confusion".into(), "frustration".into()]);
        assert_eq!(merged, json!(["confusion", "frustration"]));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let store = Arc::new(SqliteMemoryStore::in_memory().unwrap());
        let mut config = EngineConfig::default();
        config.dialectic.compliance = 2.0;
        assert!(PipelineOrchestrator::new(store, Arc::new(ScriptedGenerator::new()), config).is_err());
    }
}
