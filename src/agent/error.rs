//! Error types for adapter calls.

use thiserror::Error;

/// Errors that can occur while asking a backend for an analysis.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    /// Network connectivity error (DNS, connection refused, etc.).
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded deadline.
    #[error("Request timeout after {0}ms")]
    Timeout(u64),

    /// Backend returned an error response (4xx, 5xx).
    #[error("Backend error {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Backend response is missing required fields or is not an analysis.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Adapter configuration error (missing key, no adapter for provider).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AgentError {
    /// Whether retrying the same backend may succeed.
    ///
    /// Rate limiting, request timeouts and server-side failures are worth
    /// another attempt; everything else advances the chain immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            AgentError::Network(_) | AgentError::Timeout(_) => true,
            AgentError::Upstream { status, .. } => {
                matches!(status, 408 | 429) || (500..=599).contains(status)
            }
            AgentError::InvalidResponse(_) | AgentError::Configuration(_) => false,
        }
    }

    /// Short stable label for logs and metrics.
    pub fn class(&self) -> &'static str {
        match self {
            AgentError::Network(_) => "network",
            AgentError::Timeout(_) => "timeout",
            AgentError::Upstream { .. } if self.is_transient() => "upstream_transient",
            AgentError::Upstream { .. } => "upstream_permanent",
            AgentError::InvalidResponse(_) => "malformed_response",
            AgentError::Configuration(_) => "configuration",
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            AgentError::Timeout(timeout_ms)
        } else {
            AgentError::Network(err.to_string())
        }
    }
}
