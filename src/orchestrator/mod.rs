//! Orchestrator.
//!
//! Owns one request from admission to answer:
//!
//! 1. Admission through the [`RateLimiter`]; a rejection never reaches a backend.
//! 2. Cache lookup for single-shot requests.
//! 3. Walk the tier's fallback chain. Each entry gets one deadline that
//!    covers its retries, with backoff on transient failures; permanent and
//!    malformed failures advance the chain immediately.
//! 4. Validate, cache genuine answers, return.
//!
//! Exhausting the chain is not an error: the caller receives a degraded
//! answer. Only invalid input, rate limiting, conversation ownership and
//! tier gating surface as [`OrchestratorError`].

mod error;
mod retry;

pub use error::OrchestratorError;

use crate::agent::{degraded_result, factory, AgentError, AgentSet};
use crate::cache::{cache_key, MemoryCache, ResultCache};
use crate::config::{ConversationConfig, DiagnoseConfig, OrchestratorConfig};
use crate::conversation::extract::{CATEGORY, PROGRAMMING_LANGUAGE};
use crate::conversation::{
    extract_context, follow_up_questions, ConversationError, ConversationStore, Turn,
};
use crate::limiter::RateLimiter;
use crate::prompt::PromptPayload;
use crate::request::{RawRequest, RequestContext, RequestNormalizer};
use crate::tier::{TierPolicies, TierPolicy};
use crate::types::{AnalysisResult, ConverseOutcome, FollowUp};
use futures::future::join_all;
use retry::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Tier-aware analysis pipeline. Cheap to share behind an `Arc`.
pub struct Orchestrator {
    policies: Arc<TierPolicies>,
    limiter: Arc<RateLimiter>,
    cache: Option<Arc<dyn ResultCache>>,
    conversations: Arc<ConversationStore>,
    agents: AgentSet,
    normalizer: RequestNormalizer,
    retry: RetryPolicy,
    config: OrchestratorConfig,
    conversation: ConversationConfig,
    limiter_idle: Duration,
    content_preview: Option<usize>,
}

impl Orchestrator {
    /// Build every component from configuration. Adapters are created for
    /// the configured providers; see [`factory::build_agents`].
    pub fn from_config(config: &DiagnoseConfig) -> Self {
        let agents = factory::build_agents(&config.providers, config.orchestrator.attempt_timeout());
        Self::new(config, agents)
    }

    /// Build with an explicit adapter set.
    pub fn new(config: &DiagnoseConfig, agents: AgentSet) -> Self {
        let cache: Option<Arc<dyn ResultCache>> = config
            .cache
            .enabled
            .then(|| Arc::new(MemoryCache::from_config(&config.cache)) as Arc<dyn ResultCache>);

        Self {
            policies: Arc::new(TierPolicies::from_config(&config.tiers)),
            limiter: Arc::new(RateLimiter::new(&config.limiter)),
            cache,
            conversations: Arc::new(ConversationStore::new(config.conversation.max_turns)),
            agents,
            normalizer: RequestNormalizer::new(config.input.clone()),
            retry: RetryPolicy::new(&config.orchestrator),
            config: config.orchestrator.clone(),
            conversation: config.conversation.clone(),
            limiter_idle: config.limiter.idle(),
            content_preview: config
                .logging
                .enable_content_logging
                .then_some(config.logging.preview_chars),
        }
    }

    /// Replace the tier policies.
    pub fn with_policies(mut self, policies: TierPolicies) -> Self {
        self.policies = Arc::new(policies);
        self
    }

    /// Replace the response cache, e.g. with a shared implementation.
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn policies(&self) -> &TierPolicies {
        &self.policies
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    /// Validate and normalize a raw submission.
    pub fn normalize(&self, raw: RawRequest) -> Result<RequestContext, OrchestratorError> {
        self.normalizer.normalize(raw).map_err(|e| {
            tracing::debug!(error = %e, "Rejected invalid input");
            metrics::counter!("diagnose_rejections_total", "reason" => "invalid_input")
                .increment(1);
            OrchestratorError::from(e)
        })
    }

    /// Single-shot analysis.
    ///
    /// # Errors
    ///
    /// `RateLimited` if the caller is over a ceiling. Backend failures are
    /// never returned; they end in a fallback or degraded answer.
    pub async fn analyze(
        &self,
        request: &RequestContext,
    ) -> Result<AnalysisResult, OrchestratorError> {
        let policy = self.policies.policy(request.tier());
        let _permit = self.limiter.acquire(request.caller_id(), policy)?;
        self.log_request(request, "analyze");
        Ok(self.analyze_admitted(request, policy).await)
    }

    async fn analyze_admitted(&self, request: &RequestContext, policy: &TierPolicy) -> AnalysisResult {
        let key = self.cache.as_ref().map(|_| cache_key(request));

        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.get(key) {
                metrics::counter!("diagnose_cache_hits_total", "tier" => policy.tier().as_str())
                    .increment(1);
                tracing::debug!(
                    caller_id = %request.caller_id(),
                    tier = %policy.tier(),
                    provider = %hit.provider,
                    "Cache hit"
                );
                return hit;
            }
            metrics::counter!("diagnose_cache_misses_total", "tier" => policy.tier().as_str())
                .increment(1);
        }

        let prompt = PromptPayload::for_request(request, policy.features());
        let result = self.run_chain(request, policy, &prompt).await;

        if let (Some(cache), Some(key), false) = (&self.cache, key, result.degraded) {
            cache.put(key, result.clone());
        }
        result
    }

    /// Conversational analysis.
    ///
    /// On tiers with conversation memory the message joins the session's
    /// history and may be answered with follow-up questions. On other tiers
    /// this is [`Orchestrator::analyze`] with the answer wrapped.
    ///
    /// # Errors
    ///
    /// `RateLimited` as for `analyze`; `Forbidden` if `conversation_id`
    /// belongs to another caller.
    pub async fn converse(
        &self,
        request: &RequestContext,
        conversation_id: &str,
    ) -> Result<ConverseOutcome, OrchestratorError> {
        let policy = self.policies.policy(request.tier());
        let features = policy.features();
        if !features.conversation_memory {
            return self.analyze(request).await.map(ConverseOutcome::Answer);
        }

        let _permit = self.limiter.acquire(request.caller_id(), policy)?;
        self.log_request(request, "converse");

        let session = self
            .conversations
            .get_or_create(conversation_id, request.caller_id())?;

        let mut extracted = extract_context(request.text());
        let ctx = request.context();
        if let Some(category) = &ctx.category {
            extracted.insert(CATEGORY.to_string(), category.to_lowercase());
        }
        if let Some(language) = &ctx.programming_language {
            extracted.insert(PROGRAMMING_LANGUAGE.to_string(), language.to_lowercase());
        }
        let known = self.store(conversation_id, |store| {
            store.merge_context(conversation_id, extracted.clone())
        })
        .unwrap_or(extracted);

        self.store(conversation_id, |store| {
            store.append(conversation_id, Turn::user(request.text()))
        });

        if features.clarification
            && session.consecutive_follow_ups() < self.conversation.max_follow_ups
        {
            if let Some(questions) = follow_up_questions(request.text(), &known) {
                self.store(conversation_id, |store| {
                    store.append(conversation_id, Turn::follow_up(questions.join("\n")))
                });
                metrics::counter!("diagnose_follow_ups_total", "tier" => policy.tier().as_str())
                    .increment(1);
                tracing::info!(
                    caller_id = %request.caller_id(),
                    conversation_id = %conversation_id,
                    questions = questions.len(),
                    "Asking follow-up questions"
                );
                return Ok(ConverseOutcome::FollowUp(FollowUp {
                    conversation_id: conversation_id.to_string(),
                    questions,
                    known_context: known,
                }));
            }
        }

        let prompt = PromptPayload::build(request, features, &session.turns, &known);
        let result = self.run_chain(request, policy, &prompt).await;

        self.store(conversation_id, |store| {
            store.append(conversation_id, Turn::assistant(result.explanation.clone()))
        });

        Ok(ConverseOutcome::Answer(result))
    }

    /// Analyze several requests concurrently.
    ///
    /// Each item is admitted separately and carries its own outcome, so one
    /// rejected item does not fail the batch.
    ///
    /// # Errors
    ///
    /// `FeatureNotEnabled` unless every item's tier allows batching;
    /// `InvalidInput` if the batch is larger than `max_batch_size`.
    pub async fn analyze_batch(
        &self,
        requests: &[RequestContext],
    ) -> Result<Vec<Result<AnalysisResult, OrchestratorError>>, OrchestratorError> {
        if let Some(tier) = requests.iter().map(RequestContext::tier).min() {
            if !self.policies.policy(tier).features().batch {
                return Err(OrchestratorError::FeatureNotEnabled {
                    feature: "batch",
                    tier,
                });
            }
        }
        if requests.len() > self.config.max_batch_size {
            return Err(OrchestratorError::InvalidInput {
                message: format!(
                    "Batch of {} requests exceeds the maximum of {}",
                    requests.len(),
                    self.config.max_batch_size
                ),
            });
        }

        tracing::debug!(items = requests.len(), "Running batch");
        Ok(join_all(requests.iter().map(|request| self.analyze(request))).await)
    }

    /// Walk the chain until one entry yields a valid answer.
    async fn run_chain(
        &self,
        request: &RequestContext,
        policy: &TierPolicy,
        prompt: &PromptPayload,
    ) -> AnalysisResult {
        let started = Instant::now();
        let tier = policy.tier();
        metrics::counter!("diagnose_requests_total", "tier" => tier.as_str()).increment(1);
        tracing::debug!(
            caller_id = %request.caller_id(),
            tier = %tier,
            chain_len = policy.chain().len(),
            prompt_chars = prompt.char_len(),
            "Walking fallback chain"
        );

        for backend in policy.chain() {
            let Some(agent) = self.agents.get(backend.provider) else {
                tracing::warn!(
                    caller_id = %request.caller_id(),
                    tier = %tier,
                    chain_position = backend.position,
                    provider = %backend.provider,
                    "No adapter registered for provider, skipping"
                );
                continue;
            };

            let outcome = self
                .retry
                .call(agent.as_ref(), prompt, backend)
                .await
                .and_then(|result| {
                    if backend.is_terminal() {
                        Ok(result)
                    } else {
                        self.validate(result)
                    }
                });

            match outcome {
                Ok(mut result) => {
                    result.latency_ms = started.elapsed().as_millis() as u64;
                    if result.degraded {
                        metrics::counter!("diagnose_degraded_total", "tier" => tier.as_str())
                            .increment(1);
                    } else if backend.position > 0 {
                        metrics::counter!("diagnose_fallbacks_total",
                            "tier" => tier.as_str(),
                            "provider" => backend.provider.as_str()
                        )
                        .increment(1);
                    }
                    tracing::info!(
                        caller_id = %request.caller_id(),
                        tier = %tier,
                        chain_position = backend.position,
                        provider = %result.provider,
                        model = %result.model,
                        degraded = result.degraded,
                        latency_ms = result.latency_ms,
                        "Analysis completed"
                    );
                    return result;
                }
                Err(e) => {
                    metrics::counter!("diagnose_backend_errors_total",
                        "provider" => backend.provider.as_str(),
                        "error_class" => e.class()
                    )
                    .increment(1);
                    tracing::warn!(
                        caller_id = %request.caller_id(),
                        tier = %tier,
                        chain_position = backend.position,
                        provider = %backend.provider,
                        model = %backend.model,
                        error_class = e.class(),
                        error = %e,
                        "Backend failed, advancing chain"
                    );
                }
            }
        }

        tracing::error!(
            caller_id = %request.caller_id(),
            tier = %tier,
            chain_len = policy.chain().len(),
            "Fallback chain exhausted, returning degraded result"
        );
        metrics::counter!("diagnose_degraded_total", "tier" => tier.as_str()).increment(1);
        let hint = prompt
            .category_hint
            .clone()
            .or_else(|| extract_context(request.text()).remove(CATEGORY));
        let mut result = degraded_result(hint.as_deref());
        result.latency_ms = started.elapsed().as_millis() as u64;
        result
    }

    /// Reject answers whose explanation or solution is too short to be useful.
    fn validate(&self, result: AnalysisResult) -> Result<AnalysisResult, AgentError> {
        let min = self.config.min_field_length;
        for (field, value) in [("explanation", &result.explanation), ("solution", &result.solution)] {
            let len = value.trim().chars().count();
            if len < min {
                return Err(AgentError::InvalidResponse(format!(
                    "'{}' is {} characters, minimum {}",
                    field, len, min
                )));
            }
        }
        Ok(result)
    }

    /// Run a store mutation, logging a session that vanished mid-request.
    fn store<T>(
        &self,
        conversation_id: &str,
        op: impl FnOnce(&ConversationStore) -> Result<T, ConversationError>,
    ) -> Option<T> {
        match op(&self.conversations) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(conversation_id = %conversation_id, error = %e, "Conversation update skipped");
                None
            }
        }
    }

    fn log_request(&self, request: &RequestContext, operation: &'static str) {
        match self.content_preview {
            Some(chars) => tracing::debug!(
                caller_id = %request.caller_id(),
                tier = %request.tier(),
                operation,
                truncated = request.truncated(),
                preview = %crate::logging::preview(request.text(), chars),
                "Admitted request"
            ),
            None => tracing::debug!(
                caller_id = %request.caller_id(),
                tier = %request.tier(),
                operation,
                truncated = request.truncated(),
                "Admitted request"
            ),
        }
    }

    /// Start the background task that expires conversations and cache
    /// entries and forgets idle limiter callers.
    pub fn spawn_maintenance(&self, cancel_token: CancellationToken) -> JoinHandle<()> {
        let conversations = self.conversations.clone();
        let cache = self.cache.clone();
        let limiter = self.limiter.clone();
        let interval_duration = self.conversation.sweep_interval();
        let retention = self.conversation.retention();
        let idle = self.limiter_idle;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(interval_duration);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // First tick completes immediately
            interval.tick().await;

            tracing::info!(
                interval_seconds = interval_duration.as_secs(),
                "Maintenance task started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Maintenance task shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let conversations_swept = conversations.sweep(retention);
                        let cache_purged = cache.as_ref().map(|c| c.purge_expired()).unwrap_or(0);
                        let callers_forgotten = limiter.purge_idle(idle);
                        tracing::debug!(
                            conversations_swept,
                            cache_purged,
                            callers_forgotten,
                            "Maintenance cycle completed"
                        );
                    }
                }
            }
        })
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("agents", &self.agents)
            .field("cache_enabled", &self.cache.is_some())
            .field("config", &self.config)
            .finish()
    }
}
