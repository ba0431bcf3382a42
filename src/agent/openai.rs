//! OpenAI adapter.

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

/// OpenAI adapter.
///
/// Chat completion via POST /v1/chat/completions with Bearer token and
/// `response_format: json_object`.
pub struct OpenAIAgent {
    /// Base URL (e.g., "https://api.openai.com")
    base_url: String,
    /// API key for Bearer authentication
    api_key: String,
    /// Shared HTTP client for connection pooling
    client: Arc<Client>,
    timeout_ms: u64,
}

impl OpenAIAgent {
    pub fn new(base_url: String, api_key: String, client: Arc<Client>, timeout_ms: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            timeout_ms,
        }
    }

    fn translate_request(prompt: &PromptPayload, backend: &BackendConfig) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(prompt.messages.len() + 1);
        messages.push(OpenAIMessage {
            role: "system".to_string(),
            content: prompt.system.clone(),
        });
        messages.extend(prompt.messages.iter().map(|m| OpenAIMessage {
            role: match m.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: m.content.clone(),
        }));

        OpenAIRequest {
            model: backend.model.clone(),
            messages,
            max_tokens: backend.max_output_tokens,
            temperature: backend.temperature,
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        }
    }

    fn translate_response(
        response: OpenAIResponse,
        backend: &BackendConfig,
    ) -> Result<AnalysisResult, AgentError> {
        let choice = response.choices.into_iter().next().ok_or_else(|| {
            AgentError::InvalidResponse("response contained no choices".to_string())
        })?;

        match choice.finish_reason.as_deref() {
            Some("length") => {
                return Err(AgentError::InvalidResponse(format!(
                    "response truncated at {} output tokens",
                    backend.max_output_tokens
                )))
            }
            Some("content_filter") => {
                return Err(AgentError::InvalidResponse(
                    "response blocked by content filter".to_string(),
                ))
            }
            _ => {}
        }

        let usage = response
            .usage
            .map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            })
            .unwrap_or_default();

        let text = choice.message.content.unwrap_or_default();
        parse_analysis(&text, Provider::OpenAI, &backend.model, usage)
    }
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    max_tokens: u32,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[async_trait]
impl AnalysisAgent for OpenAIAgent {
    fn provider(&self) -> Provider {
        Provider::OpenAI
    }

    async fn generate(
        &self,
        prompt: &PromptPayload,
        backend: &BackendConfig,
    ) -> Result<AnalysisResult, AgentError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let request = Self::translate_request(prompt, backend);

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::from_reqwest(e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AgentError::Upstream {
                status: status.as_u16(),
                message: error_body,
            });
        }

        let completion: OpenAIResponse = response.json().await.map_err(|e| {
            AgentError::InvalidResponse(format!("Failed to parse completion response: {}", e))
        })?;

        Self::translate_response(completion, backend)
    }
}
