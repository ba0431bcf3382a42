//! Configuration module for the diagnose orchestrator
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`DIAGNOSE_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use diagnose::config::DiagnoseConfig;
//!
//! let config = DiagnoseConfig::default();
//! assert_eq!(config.cache.ttl_seconds, 1800);
//!
//! let toml = r#"
//! [cache]
//! ttl_seconds = 60
//! "#;
//! let config: DiagnoseConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.cache.ttl_seconds, 60);
//! assert_eq!(config.cache.max_entries, 1000);
//! ```

pub mod error;
pub mod logging;
pub mod pipeline;
pub mod provider;
pub mod tiers;

pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use pipeline::{CacheConfig, ConversationConfig, InputConfig, LimiterConfig, OrchestratorConfig};
pub use provider::{Provider, ProviderConfig};
pub use tiers::{ChainEntryConfig, TierOverride, TiersConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration for the orchestration core.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DiagnoseConfig {
    pub logging: LoggingConfig,
    pub input: InputConfig,
    pub orchestrator: OrchestratorConfig,
    pub cache: CacheConfig,
    pub limiter: LimiterConfig,
    pub conversation: ConversationConfig,
    /// Provider credentials; chain entries naming an unconfigured provider are skipped.
    pub providers: Vec<ProviderConfig>,
    pub tiers: TiersConfig,
}

impl DiagnoseConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are ignored and the previous value is kept.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("DIAGNOSE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("DIAGNOSE_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }
        if let Ok(ttl) = std::env::var("DIAGNOSE_CACHE_TTL") {
            if let Ok(t) = ttl.parse() {
                self.cache.ttl_seconds = t;
            }
        }
        if let Ok(timeout) = std::env::var("DIAGNOSE_ATTEMPT_TIMEOUT_MS") {
            if let Ok(t) = timeout.parse() {
                self.orchestrator.attempt_timeout_ms = t;
            }
        }
        if let Ok(retries) = std::env::var("DIAGNOSE_MAX_RETRIES") {
            if let Ok(r) = retries.parse() {
                self.orchestrator.max_retries = r;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.min_length == 0 || self.input.min_length > self.input.max_length {
            return Err(ConfigError::Validation {
                field: "input.min_length".to_string(),
                message: "must be non-zero and not exceed input.max_length".to_string(),
            });
        }
        if self.orchestrator.attempt_timeout_ms == 0 {
            return Err(ConfigError::Validation {
                field: "orchestrator.attempt_timeout_ms".to_string(),
                message: "timeout must be non-zero".to_string(),
            });
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ConfigError::Validation {
                field: "cache.max_entries".to_string(),
                message: "must be non-zero when the cache is enabled".to_string(),
            });
        }
        if self.limiter.window_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "limiter.window_seconds".to_string(),
                message: "window must be non-zero".to_string(),
            });
        }
        if self.conversation.sweep_interval_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "conversation.sweep_interval_seconds".to_string(),
                message: "interval must be non-zero".to_string(),
            });
        }

        for (i, provider) in self.providers.iter().enumerate() {
            if provider.provider == Provider::Canned {
                return Err(ConfigError::Validation {
                    field: format!("providers[{}].provider", i),
                    message: "canned is built in and takes no credentials".to_string(),
                });
            }
            if self.providers[..i]
                .iter()
                .any(|p| p.provider == provider.provider)
            {
                return Err(ConfigError::Validation {
                    field: format!("providers[{}].provider", i),
                    message: format!("'{}' is configured more than once", provider.provider),
                });
            }
        }

        self.tiers.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_config_defaults() {
        let config = DiagnoseConfig::default();
        assert_eq!(config.input.max_length, 8000);
        assert_eq!(config.orchestrator.max_retries, 2);
        assert!(config.cache.enabled);
        assert!(config.providers.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse_example_toml() {
        let toml = include_str!("../../diagnose.example.toml");
        let config: DiagnoseConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.providers.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse_providers() {
        let toml = r#"
        [[providers]]
        provider = "anthropic"
        api_key_env = "MY_ANTHROPIC_KEY"

        [[providers]]
        provider = "google"
        base_url = "http://localhost:8089"
        "#;

        let config: DiagnoseConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.providers[1].base_url(), "http://localhost:8089");
    }

    #[test]
    fn test_config_load_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[cache]\nttl_seconds = 5").unwrap();

        let config = DiagnoseConfig::load(Some(temp.path())).unwrap();
        assert_eq!(config.cache.ttl_seconds, 5);
    }

    #[test]
    fn test_config_load_parse_error() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[cache\nttl_seconds = ").unwrap();

        let result = DiagnoseConfig::load(Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_missing_file_error() {
        let result = DiagnoseConfig::load(Some(Path::new("/nonexistent/diagnose.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_config_load_none_returns_defaults() {
        let config = DiagnoseConfig::load(None).unwrap();
        assert_eq!(config.cache.max_entries, 1000);
    }

    #[test]
    fn test_config_env_overrides() {
        std::env::set_var("DIAGNOSE_CACHE_TTL", "42");
        std::env::set_var("DIAGNOSE_MAX_RETRIES", "not-a-number");
        let config = DiagnoseConfig::default().with_env_overrides();
        std::env::remove_var("DIAGNOSE_CACHE_TTL");
        std::env::remove_var("DIAGNOSE_MAX_RETRIES");

        assert_eq!(config.cache.ttl_seconds, 42);
        assert_eq!(config.orchestrator.max_retries, 2);
    }

    #[test]
    fn test_config_validation_duplicate_provider() {
        let mut config = DiagnoseConfig::default();
        config.providers.push(ProviderConfig::new(Provider::Google));
        config.providers.push(ProviderConfig::new(Provider::Google));

        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "providers[1].provider"
        ));
    }

    #[test]
    fn test_config_validation_canned_provider_rejected() {
        let mut config = DiagnoseConfig::default();
        config.providers.push(ProviderConfig::new(Provider::Canned));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_input_bounds() {
        let mut config = DiagnoseConfig::default();
        config.input.min_length = 9000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "input.min_length"
        ));
    }
}
