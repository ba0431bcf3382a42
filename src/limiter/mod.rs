//! Rate & Concurrency Limiter.
//!
//! Per-caller admission control: a concurrent in-flight ceiling and a
//! trailing-window throughput ceiling, both taken from the caller's tier
//! policy. Admission returns a [`Permit`]; dropping it releases the
//! in-flight slot, so release happens exactly once on every exit path.
//!
//! There is no queueing. A caller over either ceiling is rejected
//! synchronously with a retry-after hint.

use crate::config::LimiterConfig;
use crate::tier::TierPolicy;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Admission rejection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LimitError {
    #[error("Too many concurrent requests ({limit} allowed)")]
    Concurrency { limit: u32, retry_after_secs: u64 },

    #[error("Too many requests ({limit} per {window_secs}s allowed)")]
    Throughput {
        limit: u32,
        window_secs: u64,
        retry_after_secs: u64,
    },
}

impl LimitError {
    pub fn retry_after_secs(&self) -> u64 {
        match self {
            LimitError::Concurrency {
                retry_after_secs, ..
            }
            | LimitError::Throughput {
                retry_after_secs, ..
            } => *retry_after_secs,
        }
    }
}

/// Per-caller state. Created lazily on first request.
#[derive(Debug, Default)]
struct RateState {
    in_flight: AtomicU32,
    /// Admission timestamps inside the trailing window, oldest first.
    window: Mutex<VecDeque<Instant>>,
}

impl RateState {
    fn window(&self) -> std::sync::MutexGuard<'_, VecDeque<Instant>> {
        self.window.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Increment `in_flight` only if it is below `limit`.
    fn try_increment(&self, limit: u32) -> bool {
        self.in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < limit).then_some(current + 1)
            })
            .is_ok()
    }

    fn release(&self) {
        // Saturating: a release can never drive the counter negative.
        let _ = self
            .in_flight
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1));
    }
}

/// Scoped admission. Dropping it releases the caller's in-flight slot.
#[derive(Debug)]
#[must_use = "dropping the permit releases the slot immediately"]
pub struct Permit {
    state: Arc<RateState>,
    caller_id: String,
}

impl Permit {
    pub fn caller_id(&self) -> &str {
        &self.caller_id
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.state.release();
        tracing::trace!(caller_id = %self.caller_id, "Released admission permit");
    }
}

/// Thread-safe per-caller admission control.
#[derive(Debug)]
pub struct RateLimiter {
    callers: DashMap<String, Arc<RateState>>,
    window: Duration,
}

impl RateLimiter {
    pub fn new(config: &LimiterConfig) -> Self {
        Self {
            callers: DashMap::new(),
            window: config.window(),
        }
    }

    /// Admit a request or reject it immediately.
    pub fn acquire(&self, caller_id: &str, policy: &TierPolicy) -> Result<Permit, LimitError> {
        let state = self
            .callers
            .entry(caller_id.to_string())
            .or_default()
            .clone();
        let now = Instant::now();

        // The window lock serializes admission for one caller so the
        // throughput check and the slot increment commit together.
        let mut window = state.window();
        while window
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            window.pop_front();
        }

        if window.len() >= policy.per_minute() as usize {
            let retry_after_secs = window
                .front()
                .map(|oldest| self.retry_after(now, *oldest))
                .unwrap_or(0);
            drop(window);
            metrics::counter!("diagnose_rate_limited_total", "reason" => "throughput").increment(1);
            tracing::warn!(
                caller_id = %caller_id,
                tier = %policy.tier(),
                limit = policy.per_minute(),
                retry_after_secs,
                "Throughput ceiling reached"
            );
            return Err(LimitError::Throughput {
                limit: policy.per_minute(),
                window_secs: self.window.as_secs(),
                retry_after_secs,
            });
        }

        if !state.try_increment(policy.concurrency()) {
            drop(window);
            metrics::counter!("diagnose_rate_limited_total", "reason" => "concurrency").increment(1);
            tracing::warn!(
                caller_id = %caller_id,
                tier = %policy.tier(),
                limit = policy.concurrency(),
                "Concurrency ceiling reached"
            );
            return Err(LimitError::Concurrency {
                limit: policy.concurrency(),
                retry_after_secs: 1,
            });
        }

        window.push_back(now);
        drop(window);

        Ok(Permit {
            state,
            caller_id: caller_id.to_string(),
        })
    }

    /// Seconds until the oldest admission leaves the window, rounded up.
    fn retry_after(&self, now: Instant, oldest: Instant) -> u64 {
        let remaining = self.window.saturating_sub(now.duration_since(oldest));
        let secs = remaining.as_secs();
        if remaining.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }

    /// Current in-flight count for a caller.
    pub fn in_flight(&self, caller_id: &str) -> u32 {
        self.callers
            .get(caller_id)
            .map(|s| s.in_flight.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Drop records of callers with nothing in flight and no admission
    /// within `idle`. Returns the number removed.
    pub fn purge_idle(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let before = self.callers.len();
        self.callers.retain(|_, state| {
            // Another handle means an acquire is between lookup and increment.
            if Arc::strong_count(state) > 1 || state.in_flight.load(Ordering::SeqCst) > 0 {
                return true;
            }
            state
                .window()
                .back()
                .is_some_and(|last| now.duration_since(*last) < idle)
        });
        before.saturating_sub(self.callers.len())
    }

    pub fn tracked_callers(&self) -> usize {
        self.callers.len()
    }
}
