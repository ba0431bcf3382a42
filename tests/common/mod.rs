//! Shared test utilities for diagnose integration tests.
//!
//! Provides a scriptable stub adapter, config builders and request
//! helpers to reduce duplication across test files.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use diagnose::agent::{AgentError, AgentSet, AnalysisAgent};
use diagnose::config::{DiagnoseConfig, Provider};
use diagnose::orchestrator::Orchestrator;
use diagnose::prompt::PromptPayload;
use diagnose::request::{RawRequest, RequestContext};
use diagnose::tier::BackendConfig;
use diagnose::types::{AnalysisResult, Severity, Usage};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Stub Adapter
// =============================================================================

/// What a [`StubAgent`] does on every call.
#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// Return a well-formed answer attributed to the chain entry.
    Answer,
    /// Return an answer whose fields are too short to pass validation.
    ShortAnswer,
    Fail(AgentError),
}

/// Adapter double with a call counter and an optional per-call delay.
#[derive(Debug)]
pub struct StubAgent {
    provider: Provider,
    behavior: StubBehavior,
    delay: Duration,
    calls: AtomicU32,
}

impl StubAgent {
    pub fn new(provider: Provider, behavior: StubBehavior) -> Self {
        Self {
            provider,
            behavior,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    pub fn answering(provider: Provider) -> Arc<Self> {
        Arc::new(Self::new(provider, StubBehavior::Answer))
    }

    pub fn failing(provider: Provider, error: AgentError) -> Arc<Self> {
        Arc::new(Self::new(provider, StubBehavior::Fail(error)))
    }

    /// Answer after `delay`.
    pub fn slow(provider: Provider, delay: Duration) -> Arc<Self> {
        let mut agent = Self::new(provider, StubBehavior::Answer);
        agent.delay = delay;
        Arc::new(agent)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisAgent for StubAgent {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn generate(
        &self,
        _prompt: &PromptPayload,
        backend: &BackendConfig,
    ) -> Result<AnalysisResult, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.behavior {
            StubBehavior::Answer => Ok(make_result(backend)),
            StubBehavior::ShortAnswer => Ok(AnalysisResult {
                explanation: "dunno".to_string(),
                solution: "reboot".to_string(),
                ..make_result(backend)
            }),
            StubBehavior::Fail(e) => Err(e.clone()),
        }
    }
}

/// Well-formed result attributed to `backend`.
pub fn make_result(backend: &BackendConfig) -> AnalysisResult {
    AnalysisResult {
        explanation: "The DHCP lease expired and was not renewed.".to_string(),
        solution: "Renew the lease with `ipconfig /renew` and restart the adapter.".to_string(),
        code_example: None,
        category: "network".to_string(),
        tags: BTreeSet::from(["dhcp".to_string()]),
        confidence: 0.9,
        severity: Severity::Medium,
        provider: backend.provider.as_str().to_string(),
        model: backend.model.clone(),
        usage: Usage {
            prompt_tokens: 100,
            completion_tokens: 50,
        },
        latency_ms: 0,
        produced_at: Utc::now(),
        degraded: false,
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Default config with small backoff so retry paths finish quickly.
pub fn test_config() -> DiagnoseConfig {
    let mut config = DiagnoseConfig::default();
    config.orchestrator.backoff_base_ms = 10;
    config
}

pub fn agents(list: &[Arc<StubAgent>]) -> AgentSet {
    list.iter().fold(AgentSet::new(), |set, agent| {
        set.with_agent(agent.clone() as Arc<dyn AnalysisAgent>)
    })
}

pub fn orchestrator(list: &[Arc<StubAgent>]) -> Orchestrator {
    Orchestrator::new(&test_config(), agents(list))
}

pub fn request(orch: &Orchestrator, caller: &str, tier: &str, text: &str) -> RequestContext {
    orch.normalize(RawRequest::new(caller, tier, text))
        .expect("test request should normalize")
}
