//! Lenient parsing of backend answers into an [`AnalysisResult`].
//!
//! Models are asked for a bare JSON object but regularly wrap it in a
//! Markdown fence or a sentence of prose. The object is recovered, optional
//! fields get defaults, and only a missing `explanation` or `solution` is
//! an error. Length thresholds are not checked here.

use super::AgentError;
use crate::config::Provider;
use crate::types::{AnalysisResult, Severity, Usage};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::str::FromStr;

pub const DEFAULT_CATEGORY: &str = "general";
const DEFAULT_CONFIDENCE: f32 = 0.5;
const MAX_TAGS: usize = 8;

/// Parse backend `text` into a result attributed to `provider`/`model`.
pub fn parse_analysis(
    text: &str,
    provider: Provider,
    model: &str,
    usage: Usage,
) -> Result<AnalysisResult, AgentError> {
    let object = extract_object(text)?;

    let explanation = required(&object, "explanation")?;
    let solution = required(&object, "solution")?;

    let code_example = object
        .get("code_example")
        .or_else(|| object.get("code"))
        .and_then(non_empty_string);

    let category = object
        .get("category")
        .and_then(non_empty_string)
        .map(|c| c.to_lowercase())
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    let severity = object
        .get("severity")
        .and_then(Value::as_str)
        .and_then(|s| Severity::from_str(s).ok())
        .unwrap_or_default();

    Ok(AnalysisResult {
        explanation,
        solution,
        code_example,
        category,
        tags: tags(object.get("tags")),
        confidence: confidence(object.get("confidence")),
        severity,
        provider: provider.as_str().to_string(),
        model: model.to_string(),
        usage,
        latency_ms: 0,
        produced_at: Utc::now(),
        degraded: false,
    })
}

/// Locate the JSON object inside `text`.
fn extract_object(text: &str) -> Result<Map<String, Value>, AgentError> {
    let body = strip_fence(text.trim());
    let start = body.find('{');
    let end = body.rfind('}');

    let candidate = match (start, end) {
        (Some(start), Some(end)) if start < end => &body[start..=end],
        _ => {
            return Err(AgentError::InvalidResponse(
                "response contains no JSON object".to_string(),
            ))
        }
    };

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AgentError::InvalidResponse(
            "response JSON is not an object".to_string(),
        )),
        Err(e) => Err(AgentError::InvalidResponse(format!(
            "response JSON does not parse: {}",
            e
        ))),
    }
}

/// Strip a surrounding ```json ... ``` fence if present.
fn strip_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    // Skip the info string ("json", "JSON", ...)
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or(rest);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn required(object: &Map<String, Value>, field: &'static str) -> Result<String, AgentError> {
    object
        .get(field)
        .and_then(non_empty_string)
        .ok_or_else(|| AgentError::InvalidResponse(format!("missing '{}'", field)))
}

/// Strings pass through; arrays of strings (numbered steps) are joined.
fn non_empty_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn tags(value: Option<&Value>) -> BTreeSet<String> {
    let raw: Vec<&str> = match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(s)) => s.split(',').collect(),
        _ => Vec::new(),
    };
    raw.into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .take(MAX_TAGS)
        .collect()
}

fn confidence(value: Option<&Value>) -> f32 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').parse::<f64>().ok().map(|v| {
            if s.contains('%') {
                v / 100.0
            } else {
                v
            }
        }),
        _ => None,
    };
    match parsed {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0) as f32,
        _ => DEFAULT_CONFIDENCE,
    }
}
