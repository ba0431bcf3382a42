//! Anthropic Claude adapter.
//!
//! Translates a [`PromptPayload`] to the Anthropic Messages API format.

use super::{parse::parse_analysis, AgentError, AnalysisAgent};
use crate::config::Provider;
use crate::conversation::Role;
use crate::prompt::PromptPayload;
use crate::tier::BackendConfig;
use crate::types::{AnalysisResult, Usage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const API_VERSION: &str = "2023-06-01";

/// Anthropic adapter.
///
/// Calls POST /v1/messages with x-api-key authentication.
pub struct AnthropicAgent {
    /// Base URL (e.g., "https://api.anthropic.com")
    base_url: String,
    /// API key for x-api-key authentication
    api_key: String,
    /// Shared HTTP client for connection pooling
    client: Arc<Client>,
    /// Client-side timeout, reported when reqwest gives up first
    timeout_ms: u64,
}

impl AnthropicAgent {
    pub fn new(base_url: String, api_key: String, client: Arc<Client>, timeout_ms: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            timeout_ms,
        }
    }

    fn translate_request(prompt: &PromptPayload, backend: &BackendConfig) -> AnthropicRequest {
        let messages = prompt
            .messages
            .iter()
            .map(|m| AnthropicMessage {
                role: match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: vec![AnthropicContent {
                    content_type: "text",
                    text: m.content.clone(),
                }],
            })
            .collect();

        AnthropicRequest {
            model: backend.model.clone(),
            messages,
            system: Some(prompt.system.clone()),
            max_tokens: backend.max_output_tokens,
            temperature: Some(backend.temperature),
        }
    }

    fn translate_response(
        response: AnthropicResponse,
        backend: &BackendConfig,
    ) -> Result<AnalysisResult, AgentError> {
        if response.stop_reason.as_deref() == Some("max_tokens") {
            return Err(AgentError::InvalidResponse(format!(
                "response truncated at {} output tokens",
                backend.max_output_tokens
            )));
        }

        let text = response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        let usage = Usage {
            prompt_tokens: response.usage.input_tokens,
            completion_tokens: response.usage.output_tokens,
        };
        parse_analysis(&text, Provider::Anthropic, &backend.model, usage)
    }
}

/// Anthropic request format
#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Serialize)]
struct AnthropicContent {
    #[serde(rename = "type")]
    content_type: &'static str,
    text: String,
}

/// Anthropic response format
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentResponse>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentResponse {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl AnalysisAgent for AnthropicAgent {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate(
        &self,
        prompt: &PromptPayload,
        backend: &BackendConfig,
    ) -> Result<AnalysisResult, AgentError> {
        let url = format!("{}/v1/messages", self.base_url);
        let request = Self::translate_request(prompt, backend);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::from_reqwest(e, self.timeout_ms))?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Upstream {
                status: status.as_u16(),
                message: body,
            });
        }

        let anthropic_response: AnthropicResponse = response.json().await.map_err(|e| {
            AgentError::InvalidResponse(format!("Failed to parse Anthropic response: {}", e))
        })?;

        Self::translate_response(anthropic_response, backend)
    }
}
