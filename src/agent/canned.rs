//! In-process terminal fallback.
//!
//! Never performs I/O and never fails. The same builder backs the
//! orchestrator's exhaustion path, so callers see one degraded answer shape
//! regardless of which failure led there.

use super::{AgentError, AnalysisAgent};
use crate::config::Provider;
use crate::prompt::PromptPayload;
use crate::tier::BackendConfig;
use crate::types::{AnalysisResult, Severity, Usage};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeSet;

pub const CANNED_MODEL: &str = "canned-v1";
pub const DEGRADED_CONFIDENCE: f32 = 0.2;

const EXPLANATION: &str = "All analysis services are temporarily unavailable, so this is a \
generic answer rather than an analysis of your specific problem. Please retry in a few minutes \
for a full diagnosis.";

/// (category, generic first steps)
const CATEGORY_STEPS: &[(&str, &str)] = &[
    (
        "programming",
        "1. Read the first error line and the file/line it points to.\n\
         2. Check that every variable and import used on that line is defined.\n\
         3. Reproduce with the smallest possible input and add logging around the failure.",
    ),
    (
        "spreadsheet",
        "1. Check that referenced ranges and sheet names still exist.\n\
         2. Make sure lookup values and keys have the same type (text vs number).\n\
         3. Evaluate the formula step by step to find the failing part.",
    ),
    (
        "network",
        "1. Restart the device and the router or modem.\n\
         2. Forget the network and reconnect, re-entering the password.\n\
         3. Check whether other devices can connect to the same network.",
    ),
    (
        "printing",
        "1. Turn the printer off and on and clear the print queue.\n\
         2. Check paper, ink or toner and any error light on the printer.\n\
         3. Remove and re-add the printer in your system settings.",
    ),
    (
        "account",
        "1. Use the provider's password reset page.\n\
         2. Check the date and time on your device if codes are rejected.\n\
         3. Contact the service's support if the account appears locked.",
    ),
    (
        "hardware",
        "1. Disconnect external devices and restart.\n\
         2. Check cables, power supply and charge level.\n\
         3. Run the manufacturer's built-in diagnostics if available.",
    ),
    (
        "software",
        "1. Restart the application and install any pending updates.\n\
         2. Clear the application's cache or reset its settings.\n\
         3. Reinstall the application if the problem persists.",
    ),
];

const GENERIC_STEPS: &str = "1. Restart the affected device or application.\n\
2. Note any exact error message or code you see.\n\
3. Retry your request in a few minutes, including that error text.";

/// Deterministic degraded answer for `category_hint`.
///
/// Identical inputs produce identical content; only `produced_at` varies.
pub fn degraded_result(category_hint: Option<&str>) -> AnalysisResult {
    let hint = category_hint.map(|c| c.trim().to_lowercase());
    let (category, steps) = hint
        .as_deref()
        .and_then(|hint| CATEGORY_STEPS.iter().find(|(c, _)| *c == hint))
        .map(|(c, steps)| (*c, *steps))
        .unwrap_or((super::parse::DEFAULT_CATEGORY, GENERIC_STEPS));

    AnalysisResult {
        explanation: EXPLANATION.to_string(),
        solution: steps.to_string(),
        code_example: None,
        category: category.to_string(),
        tags: BTreeSet::from(["degraded".to_string()]),
        confidence: DEGRADED_CONFIDENCE,
        severity: Severity::Medium,
        provider: Provider::Canned.as_str().to_string(),
        model: CANNED_MODEL.to_string(),
        usage: Usage::default(),
        latency_ms: 0,
        produced_at: Utc::now(),
        degraded: true,
    }
}

/// Terminal chain entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct CannedAgent;

#[async_trait]
impl AnalysisAgent for CannedAgent {
    fn provider(&self) -> Provider {
        Provider::Canned
    }

    async fn generate(
        &self,
        prompt: &PromptPayload,
        _backend: &BackendConfig,
    ) -> Result<AnalysisResult, AgentError> {
        Ok(degraded_result(prompt.category_hint.as_deref()))
    }
}
