//! Agent factory for creating AnalysisAgent trait objects from configuration.

use super::{
    anthropic::AnthropicAgent, google::GoogleAIAgent, openai::OpenAIAgent, AgentError, AgentSet,
    AnalysisAgent, CannedAgent,
};
use crate::config::{Provider, ProviderConfig};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Resolve the API key: inline key, then the configured env var, then the
/// provider's conventional env var.
fn resolve_api_key(config: &ProviderConfig) -> Result<String, AgentError> {
    if let Some(key) = config.api_key.as_deref().filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }

    let env_var = config
        .api_key_env
        .as_deref()
        .or_else(|| config.provider.default_api_key_env())
        .ok_or_else(|| {
            AgentError::Configuration(format!(
                "{} provider requires 'api_key' or 'api_key_env'",
                config.provider
            ))
        })?;

    match std::env::var(env_var) {
        Ok(key) if !key.is_empty() => Ok(key),
        Ok(_) => Err(AgentError::Configuration(format!(
            "API key env var '{}' is empty",
            env_var
        ))),
        Err(e) => Err(AgentError::Configuration(format!(
            "Failed to read API key from env var '{}': {}",
            env_var, e
        ))),
    }
}

/// Create an agent from provider configuration.
///
/// # Examples
///
/// ```
/// use diagnose::agent::factory::create_agent;
/// use diagnose::config::{Provider, ProviderConfig};
/// use reqwest::Client;
/// use std::sync::Arc;
///
/// let mut config = ProviderConfig::new(Provider::OpenAI);
/// config.api_key = Some("sk-test".to_string());
///
/// let agent = create_agent(&config, Arc::new(Client::new()), 30_000).unwrap();
/// assert_eq!(agent.provider(), Provider::OpenAI);
/// ```
pub fn create_agent(
    config: &ProviderConfig,
    client: Arc<Client>,
    timeout_ms: u64,
) -> Result<Arc<dyn AnalysisAgent>, AgentError> {
    if config.provider == Provider::Canned {
        return Ok(Arc::new(CannedAgent));
    }

    let api_key = resolve_api_key(config)?;
    let url = config.base_url().to_string();

    let agent: Arc<dyn AnalysisAgent> = match config.provider {
        Provider::Anthropic => Arc::new(AnthropicAgent::new(url, api_key, client, timeout_ms)),
        Provider::Google => Arc::new(GoogleAIAgent::new(url, api_key, client, timeout_ms)),
        Provider::OpenAI => Arc::new(OpenAIAgent::new(url, api_key, client, timeout_ms)),
        Provider::Canned => Arc::new(CannedAgent),
    };
    Ok(agent)
}

/// Build the adapter set for all configured providers.
///
/// Providers that cannot be created (usually a missing key) are skipped
/// with a warning; chain entries naming them then fall through to the next
/// entry. The canned terminal adapter is always present.
pub fn build_agents(providers: &[ProviderConfig], attempt_timeout: Duration) -> AgentSet {
    let timeout_ms = attempt_timeout.as_millis() as u64;
    let client = match Client::builder().timeout(attempt_timeout).build() {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!(error = %e, "Failed to build HTTP client, only the canned fallback is available");
            return AgentSet::new();
        }
    };

    let mut set = AgentSet::new();
    for config in providers {
        match create_agent(config, client.clone(), timeout_ms) {
            Ok(agent) => {
                tracing::debug!(provider = %config.provider, base_url = %config.base_url(), "Registered adapter");
                set.insert(agent);
            }
            Err(e) => {
                tracing::warn!(provider = %config.provider, error = %e, "Skipping provider");
            }
        }
    }
    set
}
