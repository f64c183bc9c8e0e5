//! Text-generation trait and the wrappers the negotiation roles rely on.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::{Error, Result};

use super::types::{GenerationRequest, GenerationResponse, TokenUsage, UsageTracker};

/// Text-generation collaborator.
///
/// Implementations resolve `request.tier` to a concrete model. Vendor
/// clients live outside this crate; anything that can answer a prompt can
/// back the negotiation roles.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for the request.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse>;

    /// Short name of the backing provider, used in logs and errors.
    fn name(&self) -> &str;
}

/// Bounds every call of the inner generator with a fixed timeout.
///
/// A timed-out call surfaces as [`Error::Timeout`], which the escalation
/// policy treats as a provider failure.
pub struct TimeoutGenerator {
    inner: Arc<dyn TextGenerator>,
    timeout: Duration,
}

impl TimeoutGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl TextGenerator for TimeoutGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        match tokio::time::timeout(self.timeout, self.inner.generate(request)).await {
            Ok(result) => result,
            Err(_) => {
                let duration_ms = self.timeout.as_millis() as u64;
                warn!(provider = self.inner.name(), duration_ms, "generation timed out");
                Err(Error::timeout(duration_ms))
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Generator wrapper with usage tracking.
pub struct TrackedGenerator {
    inner: Arc<dyn TextGenerator>,
    usage: Arc<RwLock<UsageTracker>>,
}

impl TrackedGenerator {
    pub fn new(inner: Arc<dyn TextGenerator>) -> Self {
        Self {
            inner,
            usage: Arc::new(RwLock::new(UsageTracker::new())),
        }
    }

    /// Get current usage summary.
    pub async fn usage(&self) -> UsageTracker {
        self.usage.read().await.clone()
    }

    /// Reset usage tracking.
    pub async fn reset_usage(&self) {
        let mut usage = self.usage.write().await;
        *usage = UsageTracker::new();
    }
}

#[async_trait]
impl TextGenerator for TrackedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let tier = request.tier;
        let result = self.inner.generate(request).await;

        let mut usage = self.usage.write().await;
        match &result {
            Ok(response) => usage.record(tier, response),
            Err(_) => usage.record_failure(),
        }

        result
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Return this content
    Content(String),
    /// Fail with a provider error carrying this message
    Failure(String),
}

/// Deterministic generator that replays a fixed script of replies.
///
/// Each call pops the next reply; an exhausted script fails like an
/// unavailable provider. Every request is recorded for inspection.
#[derive(Clone, Default)]
pub struct ScriptedGenerator {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply.
    pub fn with_reply(self, content: impl Into<String>) -> Self {
        self.push(ScriptedReply::Content(content.into()));
        self
    }

    /// Queue a provider failure.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(ScriptedReply::Failure(message.into()));
        self
    }

    /// Queue a reply on an existing handle.
    pub fn push(&self, reply: ScriptedReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse> {
        let model = format!("scripted-{}", request.tier);
        let input_tokens = (request.system_prompt.len() + request.user_prompt.len()) as u64 / 4;

        self.requests
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock request log: {}", e)))?
            .push(request);

        let reply = self
            .replies
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock script: {}", e)))?
            .pop_front();

        match reply {
            Some(ScriptedReply::Content(content)) => {
                let output_tokens = content.len() as u64 / 4;
                Ok(GenerationResponse::new(
                    content,
                    model,
                    TokenUsage::new(input_tokens, output_tokens),
                ))
            }
            Some(ScriptedReply::Failure(message)) => Err(Error::llm_api("scripted", message)),
            None => Err(Error::llm_api("scripted", "script exhausted")),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelTier;

    struct StalledGenerator;

    #[async_trait]
    impl TextGenerator for StalledGenerator {
        async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResponse> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(GenerationResponse::new("late", "stalled", TokenUsage::default()))
        }

        fn name(&self) -> &str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_scripted_generator_replays_in_order() {
        let generator = ScriptedGenerator::new()
            .with_reply("first")
            .with_failure("rate limited")
            .with_reply("third");

        let req = GenerationRequest::new("sys", "user");
        assert_eq!(generator.generate(req.clone()).await.unwrap().content, "first");
        assert!(generator.generate(req.clone()).await.unwrap_err().is_provider_failure());
        assert_eq!(generator.generate(req.clone()).await.unwrap().content, "third");
        assert!(generator.generate(req).await.is_err());
        assert_eq!(generator.requests().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_generator_bounds_hung_calls() {
        let generator = TimeoutGenerator::new(Arc::new(StalledGenerator), Duration::from_secs(5));
        let err = generator
            .generate(GenerationRequest::new("sys", "user"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { duration_ms: 5000 }));
    }

    #[tokio::test]
    async fn test_tracked_generator_counts_tiers_and_failures() {
        let scripted = ScriptedGenerator::new().with_reply("ok").with_failure("down");
        let tracked = TrackedGenerator::new(Arc::new(scripted));

        let _ = tracked
            .generate(GenerationRequest::new("s", "u").with_tier(ModelTier::Flagship))
            .await;
        let _ = tracked.generate(GenerationRequest::new("s", "u")).await;

        let usage = tracked.usage().await;
        assert_eq!(usage.request_count, 1);
        assert_eq!(usage.failure_count, 1);
        assert_eq!(usage.by_tier.get(&ModelTier::Flagship), Some(&1));

        tracked.reset_usage().await;
        assert_eq!(tracked.usage().await.request_count, 0);
    }
}
