//! Output formatting helpers for CLI commands

use crate::tier::{TierPolicies, TierPolicy};
use crate::types::{AnalysisResult, FollowUp, Severity};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;
use serde_json::json;

/// View model for tier display
#[derive(Debug, Clone, Serialize)]
pub struct TierView {
    pub tier: String,
    pub concurrency: u32,
    pub per_minute: u32,
    pub chain: Vec<String>,
    pub features: Vec<&'static str>,
}

impl From<&TierPolicy> for TierView {
    fn from(policy: &TierPolicy) -> Self {
        let flags = policy.features();
        let features = [
            (flags.conversation_memory, "memory"),
            (flags.clarification, "clarification"),
            (flags.reference_lookup, "lookup"),
            (flags.batch, "batch"),
        ]
        .into_iter()
        .filter_map(|(on, name)| on.then_some(name))
        .collect();

        Self {
            tier: policy.tier().to_string(),
            concurrency: policy.concurrency(),
            per_minute: policy.per_minute(),
            chain: policy
                .chain()
                .iter()
                .map(|b| format!("{}/{}", b.provider, b.model))
                .collect(),
            features,
        }
    }
}

pub fn tier_views(policies: &TierPolicies) -> Vec<TierView> {
    policies.iter().map(TierView::from).collect()
}

/// Format tiers as a table
pub fn format_tiers_table(tiers: &[TierView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Tier", "Concurrency", "Per Minute", "Chain", "Features"]);

    for t in tiers {
        let features = if t.features.is_empty() {
            "-".dimmed().to_string()
        } else {
            t.features.join(", ")
        };
        table.add_row(vec![
            Cell::new(&t.tier),
            Cell::new(t.concurrency),
            Cell::new(t.per_minute),
            Cell::new(t.chain.join(" → ")),
            Cell::new(features),
        ]);
    }

    table.to_string()
}

/// Format tiers as JSON
pub fn format_tiers_json(tiers: &[TierView]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&json!({ "tiers": tiers }))
}

fn severity_label(severity: Severity) -> String {
    let label = severity.to_string();
    match severity {
        Severity::Low => label.green().to_string(),
        Severity::Medium => label.yellow().to_string(),
        Severity::High => label.red().to_string(),
        Severity::Critical => label.red().bold().to_string(),
    }
}

/// Human-readable rendering of an answer.
pub fn format_result_text(result: &AnalysisResult) -> String {
    let mut out = String::new();

    if result.degraded {
        out.push_str(&format!(
            "{}\n\n",
            "⚠ Degraded answer: analysis services were unavailable".yellow()
        ));
    }

    out.push_str(&format!("{}\n{}\n\n", "Explanation".bold(), result.explanation));
    out.push_str(&format!("{}\n{}\n", "Solution".bold(), result.solution));

    if let Some(code) = &result.code_example {
        out.push_str(&format!("\n{}\n{}\n", "Example".bold(), code.cyan()));
    }

    let tags = if result.tags.is_empty() {
        String::new()
    } else {
        format!(
            "  tags: {}",
            result.tags.iter().cloned().collect::<Vec<_>>().join(", ")
        )
    };
    out.push_str(&format!(
        "\n{}",
        format!(
            "category: {}  severity: {}  confidence: {:.0}%{}",
            result.category,
            severity_label(result.severity),
            result.confidence * 100.0,
            tags
        )
        .dimmed()
    ));
    out.push_str(&format!(
        "\n{}",
        format!(
            "answered by {}/{} in {}ms",
            result.provider, result.model, result.latency_ms
        )
        .dimmed()
    ));

    out
}

/// Human-readable rendering of clarification questions.
pub fn format_follow_up_text(follow_up: &FollowUp) -> String {
    let mut out = format!("{}\n", "A few questions first:".bold());
    for (i, question) in follow_up.questions.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, question));
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::degraded_result;
    use crate::tier::Tier;
    use std::collections::BTreeMap;

    #[test]
    fn test_tier_view_from_policy() {
        let view = TierView::from(&TierPolicy::builtin(Tier::Free));
        assert_eq!(view.tier, "free");
        assert_eq!(view.concurrency, 2);
        assert_eq!(view.chain.last().map(String::as_str), Some("canned/canned-v1"));
        assert!(view.features.is_empty());
    }

    #[test]
    fn test_format_tiers_table() {
        colored::control::set_override(false);
        let output = format_tiers_table(&tier_views(&TierPolicies::builtin()));
        assert!(output.contains("Tier"));
        assert!(output.contains("team"));
        assert!(output.contains("batch"));
    }

    #[test]
    fn test_format_tiers_json() {
        let output = format_tiers_json(&tier_views(&TierPolicies::builtin())).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed["tiers"].as_array().unwrap().len(), 3);
        assert_eq!(parsed["tiers"][2]["concurrency"], 10);
    }

    #[test]
    fn test_format_degraded_result() {
        colored::control::set_override(false);
        let output = format_result_text(&degraded_result(Some("network")));
        assert!(output.starts_with("⚠ Degraded answer"));
        assert!(output.contains("answered by canned/canned-v1"));
        assert!(output.contains("confidence: 20%"));
    }

    #[test]
    fn test_format_follow_up() {
        let output = format_follow_up_text(&FollowUp {
            conversation_id: "c".to_string(),
            questions: vec!["Which OS?".to_string(), "Any error code?".to_string()],
            known_context: BTreeMap::new(),
        });
        assert!(output.contains("1. Which OS?"));
        assert!(output.contains("2. Any error code?"));
    }
}
