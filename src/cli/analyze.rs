//! `diagnose analyze` handler

use crate::cli::{load_config, output, AnalyzeArgs};
use crate::orchestrator::Orchestrator;
use crate::request::{RawRequest, StructuredContext};
use anyhow::Context;
use std::io::Read;

fn read_text(arg: &str) -> anyhow::Result<String> {
    if arg != "-" {
        return Ok(arg.to_string());
    }
    let mut text = String::new();
    std::io::stdin()
        .read_to_string(&mut text)
        .context("Failed to read problem description from stdin")?;
    Ok(text)
}

/// Build the raw submission from command-line arguments.
pub fn build_request(args: &AnalyzeArgs) -> anyhow::Result<RawRequest> {
    let text = read_text(&args.text)?;

    let code_snippet = match &args.code_file {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
        ),
        None => None,
    };
    let file = args.code_file.as_ref().map(|p| p.display().to_string());

    let mut raw = RawRequest::new(&args.run.caller, &args.run.tier, text);
    if args.category.is_some() || args.programming_language.is_some() || code_snippet.is_some() {
        raw = raw.with_context(StructuredContext {
            code_snippet,
            file,
            category: args.category.clone(),
            programming_language: args.programming_language.clone(),
            ..Default::default()
        });
    }
    Ok(raw)
}

/// Handle `diagnose analyze`. Returns the rendered output.
pub async fn handle_analyze(args: &AnalyzeArgs) -> anyhow::Result<String> {
    let config = load_config(&args.run.config, args.run.log_level.as_deref())?;
    // A second init (e.g. in tests) is harmless
    let _ = crate::logging::init_tracing(&config.logging);

    let orchestrator = Orchestrator::from_config(&config);
    let request = orchestrator.normalize(build_request(args)?)?;
    let result = orchestrator.analyze(&request).await?;

    if args.run.json {
        Ok(serde_json::to_string_pretty(&result)?)
    } else {
        Ok(output::format_result_text(&result))
    }
}
