//! Pipeline tuning: input bounds, attempt timeouts, cache, limiter and
//! conversation retention.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request normalization bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Shorter input (in characters, after trimming) is rejected.
    pub min_length: usize,
    /// Longer input is truncated, not rejected.
    pub max_length: usize,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            min_length: 10,
            max_length: 8000,
        }
    }
}

/// Chain execution settings.
///
/// # Example
///
/// ```toml
/// [orchestrator]
/// attempt_timeout_ms = 30000
/// max_retries = 2
/// backoff_base_ms = 250
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound for one chain entry, retries and backoff included.
    pub attempt_timeout_ms: u64,
    /// Retries per chain entry for transient failures.
    pub max_retries: u32,
    /// First backoff delay; doubles on each retry.
    pub backoff_base_ms: u64,
    /// Minimum length of `explanation` and `solution` in a valid answer.
    pub min_field_length: usize,
    pub max_batch_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_ms: 30_000,
            max_retries: 2,
            backoff_base_ms: 250,
            min_field_length: 20,
            max_batch_size: 10,
        }
    }
}

impl OrchestratorConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Delay before retry number `retry` (0-based): `base * 2^retry`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 1u64.checked_shl(retry).unwrap_or(u64::MAX);
        Duration::from_millis(self.backoff_base_ms.saturating_mul(factor))
    }
}

/// Response cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 1800,
            max_entries: 1000,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Admission control settings. Per-tier ceilings live in the tier policies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Length of the trailing throughput window.
    pub window_seconds: u64,
    /// Caller records idle for this long are dropped by the maintenance task.
    pub idle_seconds: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            window_seconds: 60,
            idle_seconds: 600,
        }
    }
}

impl LimiterConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_seconds)
    }
}

/// Conversation memory settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub retention_seconds: u64,
    /// Interval of the single maintenance task.
    pub sweep_interval_seconds: u64,
    /// Oldest turns are dropped beyond this.
    pub max_turns: usize,
    /// Consecutive clarification rounds before the backend is asked anyway.
    pub max_follow_ups: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            retention_seconds: 3600,
            sweep_interval_seconds: 60,
            max_turns: 20,
            max_follow_ups: 2,
        }
    }
}

impl ConversationConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_seconds)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}
