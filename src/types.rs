//! Result types shared by adapters, the cache and the orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// How serious the analysed problem is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" | "minor" | "info" => Ok(Severity::Low),
            "medium" | "moderate" | "warning" => Ok(Severity::Medium),
            "high" | "major" | "error" => Ok(Severity::High),
            "critical" | "fatal" | "blocker" => Ok(Severity::Critical),
            _ => Err(format!("Invalid severity: {}", s)),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Token accounting reported by a backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl Usage {
    pub fn total(&self) -> u32 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// Normalized answer returned to callers.
///
/// `provider` and `model` always name the chain entry that actually produced
/// the answer. `degraded` is set when the answer was not generated by an
/// external backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub explanation: String,
    pub solution: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_example: Option<String>,
    pub category: String,
    pub tags: BTreeSet<String>,
    /// Always within [0, 1].
    pub confidence: f32,
    pub severity: Severity,
    pub provider: String,
    pub model: String,
    pub usage: Usage,
    pub latency_ms: u64,
    pub produced_at: DateTime<Utc>,
    pub degraded: bool,
}

/// Clarification request returned by the conversational variant instead of
/// invoking a backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    pub conversation_id: String,
    pub questions: Vec<String>,
    /// Context accumulated so far in the session.
    pub known_context: BTreeMap<String, String>,
}

/// Outcome of a conversational request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConverseOutcome {
    Answer(AnalysisResult),
    FollowUp(FollowUp),
}
