//! Caller-visible failures.

use crate::conversation::ConversationError;
use crate::limiter::LimitError;
use crate::request::InputError;
use crate::tier::Tier;
use thiserror::Error;

/// The only failures a caller ever sees. Every backend-side failure is
/// absorbed into a fallback answer or a degraded result.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Conversation '{conversation_id}' is not accessible")]
    Forbidden { conversation_id: String },

    #[error("Feature '{feature}' is not enabled for the {tier} tier")]
    FeatureNotEnabled { feature: &'static str, tier: Tier },
}

impl OrchestratorError {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            OrchestratorError::InvalidInput { .. } => "invalid_input",
            OrchestratorError::RateLimited { .. } => "rate_limited",
            OrchestratorError::Forbidden { .. } => "forbidden",
            OrchestratorError::FeatureNotEnabled { .. } => "feature_not_enabled",
        }
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            OrchestratorError::RateLimited { retry_after_secs } => Some(*retry_after_secs),
            _ => None,
        }
    }
}

impl From<InputError> for OrchestratorError {
    fn from(err: InputError) -> Self {
        OrchestratorError::InvalidInput {
            message: err.to_string(),
        }
    }
}

impl From<LimitError> for OrchestratorError {
    fn from(err: LimitError) -> Self {
        OrchestratorError::RateLimited {
            retry_after_secs: err.retry_after_secs(),
        }
    }
}

impl From<ConversationError> for OrchestratorError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::Forbidden(id) | ConversationError::NotFound(id) => {
                OrchestratorError::Forbidden {
                    conversation_id: id,
                }
            }
        }
    }
}
