//! Backend adapters.
//!
//! This module provides the `AnalysisAgent` trait and one implementation per
//! provider. Adapters are stateless apart from their client configuration
//! and are shared as `Arc<dyn AnalysisAgent>` by every in-flight request.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub mod anthropic;
pub mod canned;
pub mod error;
pub mod factory;
pub mod google;
pub mod openai;
pub mod parse;

pub use canned::{degraded_result, CannedAgent};
pub use error::AgentError;

use crate::config::Provider;
use crate::prompt::PromptPayload;
use crate::tier::BackendConfig;
use crate::types::AnalysisResult;

/// Unified interface for analysis backends.
///
/// # Object Safety
///
/// This trait is object-safe and designed to be used as `Arc<dyn AnalysisAgent>`.
///
/// # Cancellation Safety
///
/// `generate` is cancellation-safe. Dropping the future aborts the in-flight
/// HTTP request; the orchestrator relies on this to enforce attempt timeouts.
#[async_trait]
pub trait AnalysisAgent: Send + Sync + 'static {
    /// Provider this adapter talks to.
    fn provider(&self) -> Provider;

    /// Produce an analysis for `prompt` using the model and limits in `backend`.
    ///
    /// The returned result names this provider and `backend.model`. It is
    /// parsed but not length-validated.
    async fn generate(
        &self,
        prompt: &PromptPayload,
        backend: &BackendConfig,
    ) -> Result<AnalysisResult, AgentError>;
}

/// Adapters keyed by provider. Always contains the canned terminal adapter.
#[derive(Clone)]
pub struct AgentSet {
    agents: HashMap<Provider, Arc<dyn AnalysisAgent>>,
}

impl AgentSet {
    pub fn new() -> Self {
        let mut agents: HashMap<Provider, Arc<dyn AnalysisAgent>> = HashMap::new();
        agents.insert(Provider::Canned, Arc::new(CannedAgent));
        Self { agents }
    }

    /// Register `agent` under its provider, replacing any previous one.
    pub fn with_agent(mut self, agent: Arc<dyn AnalysisAgent>) -> Self {
        self.insert(agent);
        self
    }

    pub fn insert(&mut self, agent: Arc<dyn AnalysisAgent>) {
        self.agents.insert(agent.provider(), agent);
    }

    pub fn get(&self, provider: Provider) -> Option<&Arc<dyn AnalysisAgent>> {
        self.agents.get(&provider)
    }

    /// Registered providers, sorted.
    pub fn providers(&self) -> Vec<Provider> {
        let mut providers: Vec<Provider> = self.agents.keys().copied().collect();
        providers.sort_by_key(|p| p.as_str());
        providers
    }
}

impl Default for AgentSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AgentSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSet")
            .field("providers", &self.providers())
            .finish()
    }
}
