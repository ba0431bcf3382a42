//! Google Generative AI (Gemini) adapter.

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

/// Google AI adapter.
///
/// - Generation via POST /v1beta/models/{model}:generateContent?key={key}
/// - System prompt to systemInstruction field
/// - Role mapping: assistant <-> model
/// - JSON output requested through responseMimeType
pub struct GoogleAIAgent {
    /// Base URL (e.g., "https://generativelanguage.googleapis.com")
    base_url: String,
    /// API key passed as query parameter
    api_key: String,
    /// Shared HTTP client for connection pooling
    client: Arc<Client>,
    timeout_ms: u64,
}

impl GoogleAIAgent {
    pub fn new(base_url: String, api_key: String, client: Arc<Client>, timeout_ms: u64) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            timeout_ms,
        }
    }

    fn translate_request(prompt: &PromptPayload, backend: &BackendConfig) -> GoogleRequest {
        let contents = prompt
            .messages
            .iter()
            .map(|m| GoogleContent {
                role: match m.role {
                    Role::User => "user".to_string(),
                    Role::Assistant => "model".to_string(),
                },
                parts: vec![GooglePart {
                    text: m.content.clone(),
                }],
            })
            .collect();

        GoogleRequest {
            contents,
            system_instruction: Some(GoogleSystemInstruction {
                parts: vec![GooglePart {
                    text: prompt.system.clone(),
                }],
            }),
            generation_config: GoogleGenerationConfig {
                temperature: Some(backend.temperature),
                max_output_tokens: Some(backend.max_output_tokens),
                response_mime_type: Some("application/json"),
            },
        }
    }

    fn translate_response(
        response: GoogleResponse,
        backend: &BackendConfig,
    ) -> Result<AnalysisResult, AgentError> {
        let candidate = response.candidates.into_iter().next().ok_or_else(|| {
            AgentError::InvalidResponse("response contained no candidates".to_string())
        })?;

        match candidate.finish_reason.as_deref() {
            Some("MAX_TOKENS") => {
                return Err(AgentError::InvalidResponse(format!(
                    "response truncated at {} output tokens",
                    backend.max_output_tokens
                )))
            }
            Some("SAFETY") | Some("RECITATION") => {
                return Err(AgentError::InvalidResponse(
                    "response blocked by content filter".to_string(),
                ))
            }
            _ => {}
        }

        let text = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<Vec<String>>()
                    .join("")
            })
            .unwrap_or_default();

        let usage = response
            .usage_metadata
            .map(|u| Usage {
                prompt_tokens: u.prompt_token_count.unwrap_or(0),
                completion_tokens: u.candidates_token_count.unwrap_or(0),
            })
            .unwrap_or_default();

        parse_analysis(&text, Provider::Google, &backend.model, usage)
    }
}

/// Google Generative AI request format
#[derive(Debug, Serialize)]
struct GoogleRequest {
    contents: Vec<GoogleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "systemInstruction")]
    system_instruction: Option<GoogleSystemInstruction>,
    #[serde(rename = "generationConfig")]
    generation_config: GoogleGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GoogleContent {
    role: String,
    parts: Vec<GooglePart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GooglePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GoogleSystemInstruction {
    parts: Vec<GooglePart>,
}

#[derive(Debug, Serialize, Default)]
struct GoogleGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[serde(rename = "responseMimeType")]
    response_mime_type: Option<&'static str>,
}

/// Google Generative AI response format
#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GoogleUsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct GoogleCandidate {
    content: Option<GoogleContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUsageMetadata {
    #[serde(rename = "promptTokenCount")]
    prompt_token_count: Option<u32>,
    #[serde(rename = "candidatesTokenCount")]
    candidates_token_count: Option<u32>,
}

#[async_trait]
impl AnalysisAgent for GoogleAIAgent {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn generate(
        &self,
        prompt: &PromptPayload,
        backend: &BackendConfig,
    ) -> Result<AnalysisResult, AgentError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, backend.model, self.api_key
        );
        let request = Self::translate_request(prompt, backend);

        tracing::debug!(
            backend = "google",
            model = %backend.model,
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| AgentError::from_reqwest(e.without_url(), self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Upstream {
                status: status.as_u16(),
                message: body,
            });
        }

        let google_response: GoogleResponse = response.json().await.map_err(|e| {
            AgentError::InvalidResponse(format!("Failed to parse Google response: {}", e))
        })?;

        Self::translate_response(google_response, backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PromptMessage;
    use mockito::Server;

    fn backend() -> BackendConfig {
        BackendConfig::new(Provider::Google, "gemini-1.5-flash", 1024, 0.3)
    }

    fn prompt() -> PromptPayload {
        PromptPayload {
            system: "answer in JSON".to_string(),
            messages: vec![
                PromptMessage {
                    role: Role::User,
                    content: "printer offline".to_string(),
                },
                PromptMessage {
                    role: Role::Assistant,
                    content: "USB or network?".to_string(),
                },
                PromptMessage {
                    role: Role::User,
                    content: "network".to_string(),
                },
            ],
            category_hint: Some("printing".to_string()),
        }
    }

    fn test_agent(base_url: String) -> GoogleAIAgent {
        GoogleAIAgent::new(base_url, "test-key-123".to_string(), Arc::new(Client::new()), 5_000)
    }

    #[test]
    fn test_translate_request_roles_and_system() {
        let request = GoogleAIAgent::translate_request(&prompt(), &backend());
        assert_eq!(request.contents[1].role, "model");

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "answer in JSON");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
    }

    #[tokio::test]
    async fn test_generate_success() {
        let mut server = Server::new_async().await;
        let answer = r#"{"explanation":"The printer lost its DHCP lease.","solution":"Assign it a static address.","tags":["printer","dhcp"]}"#;
        let body = serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": answer}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 30, "candidatesTokenCount": 20, "totalTokenCount": 50}
        });
        let mock = server
            .mock(
                "POST",
                "/v1beta/models/gemini-1.5-flash:generateContent?key=test-key-123",
            )
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let result = test_agent(server.url())
            .generate(&prompt(), &backend())
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result.provider, "google");
        assert_eq!(result.model, "gemini-1.5-flash");
        assert!(result.tags.contains("dhcp"));
        assert_eq!(result.usage.prompt_tokens, 30);
    }

    #[tokio::test]
    async fn test_generate_bad_request_is_permanent() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock(
                "POST",
                "/v1beta/models/gemini-1.5-flash:generateContent?key=test-key-123",
            )
            .with_status(400)
            .with_body(r#"{"error":{"message":"API key not valid"}}"#)
            .create_async()
            .await;

        let err = test_agent(server.url())
            .generate(&prompt(), &backend())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Upstream { status: 400, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_safety_block_is_invalid() {
        let mut server = Server::new_async().await;
        let body = serde_json::json!({"candidates": [{"finishReason": "SAFETY"}]});
        let _mock = server
            .mock(
                "POST",
                "/v1beta/models/gemini-1.5-flash:generateContent?key=test-key-123",
            )
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let err = test_agent(server.url())
            .generate(&prompt(), &backend())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidResponse(_)));
    }
}
