//! Per-tier overrides of the built-in tier policies

use super::error::ConfigError;
use super::provider::Provider;
use serde::{Deserialize, Serialize};

/// One chain entry as written in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainEntryConfig {
    pub provider: Provider,
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_output_tokens() -> u32 {
    2048
}

fn default_temperature() -> f32 {
    0.3
}

/// Override for a single tier. Unset fields keep the built-in value.
///
/// # Example
///
/// ```toml
/// [tiers.pro]
/// concurrency = 8
/// per_minute = 60
/// chain = [
///     { provider = "openai", model = "gpt-4o" },
///     { provider = "anthropic", model = "claude-3-5-sonnet-latest" },
/// ]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TierOverride {
    pub concurrency: Option<u32>,
    pub per_minute: Option<u32>,
    pub chain: Option<Vec<ChainEntryConfig>>,
}

/// Overrides keyed by tier name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TiersConfig {
    pub free: Option<TierOverride>,
    pub pro: Option<TierOverride>,
    pub team: Option<TierOverride>,
}

impl TiersConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, tier) in [("free", &self.free), ("pro", &self.pro), ("team", &self.team)] {
            if let Some(tier) = tier {
                tier.validate(name)?;
            }
        }
        Ok(())
    }
}

impl TierOverride {
    fn validate(&self, tier: &str) -> Result<(), ConfigError> {
        if self.concurrency == Some(0) {
            return Err(ConfigError::Validation {
                field: format!("tiers.{}.concurrency", tier),
                message: "concurrency must be non-zero".to_string(),
            });
        }
        if self.per_minute == Some(0) {
            return Err(ConfigError::Validation {
                field: format!("tiers.{}.per_minute", tier),
                message: "per_minute must be non-zero".to_string(),
            });
        }

        let Some(chain) = &self.chain else {
            return Ok(());
        };

        if chain.is_empty() {
            return Err(ConfigError::Validation {
                field: format!("tiers.{}.chain", tier),
                message: "chain cannot be empty".to_string(),
            });
        }

        // The terminal fallback is appended automatically; anywhere but last it
        // would shadow every later entry.
        let last = chain.len() - 1;
        for (i, entry) in chain.iter().enumerate() {
            if entry.provider == Provider::Canned && i != last {
                return Err(ConfigError::Validation {
                    field: format!("tiers.{}.chain[{}]", tier, i),
                    message: "canned provider may only be the last entry".to_string(),
                });
            }
            if entry.provider != Provider::Canned && entry.model.trim().is_empty() {
                return Err(ConfigError::Validation {
                    field: format!("tiers.{}.chain[{}].model", tier, i),
                    message: "model cannot be empty".to_string(),
                });
            }
            if !(0.0..=2.0).contains(&entry.temperature) {
                return Err(ConfigError::Validation {
                    field: format!("tiers.{}.chain[{}].temperature", tier, i),
                    message: "temperature must be within 0.0-2.0".to_string(),
                });
            }
        }

        Ok(())
    }
}
