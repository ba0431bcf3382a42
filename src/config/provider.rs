//! Provider credentials configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// External LLM provider behind a chain entry.
///
/// `Canned` is the in-process terminal fallback and never performs I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    Google,
    #[serde(rename = "openai")]
    OpenAI,
    Canned,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
            Provider::OpenAI => "openai",
            Provider::Canned => "canned",
        }
    }

    /// Public API endpoint used when no `base_url` is configured.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::Anthropic => "https://api.anthropic.com",
            Provider::Google => "https://generativelanguage.googleapis.com",
            Provider::OpenAI => "https://api.openai.com",
            Provider::Canned => "",
        }
    }

    /// Conventional environment variable holding the API key.
    pub fn default_api_key_env(&self) -> Option<&'static str> {
        match self {
            Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
            Provider::Google => Some("GOOGLE_API_KEY"),
            Provider::OpenAI => Some("OPENAI_API_KEY"),
            Provider::Canned => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(Provider::Anthropic),
            "google" | "gemini" => Ok(Provider::Google),
            "openai" => Ok(Provider::OpenAI),
            "canned" => Ok(Provider::Canned),
            _ => Err(format!("Invalid provider: {}", s)),
        }
    }
}

/// Credentials and endpoint for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: Provider,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Inline key; prefer `api_key_env` outside of tests.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl ProviderConfig {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            base_url: None,
            api_key: None,
            api_key_env: None,
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_serde_names() {
        assert_eq!(serde_json::to_string(&Provider::OpenAI).unwrap(), "\"openai\"");
        assert_eq!(serde_json::to_string(&Provider::Canned).unwrap(), "\"canned\"");
        let p: Provider = serde_json::from_str("\"google\"").unwrap();
        assert_eq!(p, Provider::Google);
    }

    #[test]
    fn test_provider_from_str_aliases() {
        assert_eq!(Provider::from_str("Claude").unwrap(), Provider::Anthropic);
        assert_eq!(Provider::from_str("gemini").unwrap(), Provider::Google);
        assert!(Provider::from_str("ollama").is_err());
    }

    #[test]
    fn test_provider_config_base_url_default() {
        let config = ProviderConfig::new(Provider::Anthropic);
        assert_eq!(config.base_url(), "https://api.anthropic.com");

        let config = ProviderConfig {
            base_url: Some("http://localhost:9999".to_string()),
            ..ProviderConfig::new(Provider::Anthropic)
        };
        assert_eq!(config.base_url(), "http://localhost:9999");
    }
}
