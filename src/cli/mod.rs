//! CLI module for diagnose
//!
//! Command-line interface definitions and handlers for operators.
//!
//! # Commands
//!
//! - `analyze` - One-shot analysis of a problem description
//! - `chat` - Multi-turn conversation over stdin
//! - `tiers` - Show the resolved tier policies
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Analyze with the pro chain
//! diagnose analyze --tier pro "VLOOKUP returns #N/A for every row"
//!
//! # Show policies as JSON
//! diagnose tiers --json
//!
//! # Generate shell completions
//! diagnose completions bash > ~/.bash_completion.d/diagnose
//! ```

pub mod analyze;
pub mod chat;
pub mod completions;
pub mod config;
pub mod output;
pub mod tiers;

pub use completions::handle_completions;
pub use config::handle_config_init;

use crate::config::DiagnoseConfig;
use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "diagnose.toml";

/// diagnose - Tier-aware LLM analysis orchestrator
#[derive(Parser, Debug)]
#[command(
    name = "diagnose",
    version,
    about = "Tier-aware LLM analysis orchestrator"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze one problem description
    Analyze(AnalyzeArgs),
    /// Interactive multi-turn conversation (one message per stdin line)
    Chat(ChatArgs),
    /// Show tier policies
    Tiers(TiersArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options shared by commands that run the orchestrator.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (defaults apply if it does not exist)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Subscription tier (free, pro, team); unknown values resolve to free
    #[arg(short, long, default_value = "free")]
    pub tier: String,

    /// Caller identifier used for rate limiting and conversation ownership
    #[arg(long, default_value = "cli", env = "DIAGNOSE_CALLER")]
    pub caller: String,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "DIAGNOSE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Problem description; "-" reads it from stdin
    pub text: String,

    #[command(flatten)]
    pub run: RunArgs,

    /// Problem category hint (e.g. programming, network)
    #[arg(long)]
    pub category: Option<String>,

    /// Programming language of the attached code
    #[arg(long)]
    pub programming_language: Option<String>,

    /// File whose contents are attached as a code snippet
    #[arg(long)]
    pub code_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Conversation to continue (a new one is started if omitted)
    #[arg(long)]
    pub conversation: Option<String>,
}

#[derive(Args, Debug)]
pub struct TiersArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

/// Load configuration: file (if present), then env overrides, then
/// `log_level`. The result is validated.
pub fn load_config(path: &Path, log_level: Option<&str>) -> anyhow::Result<DiagnoseConfig> {
    let config = if path.exists() {
        DiagnoseConfig::load(Some(path))
            .with_context(|| format!("Failed to load {}", path.display()))?
    } else {
        DiagnoseConfig::default()
    };

    let mut config = config.with_env_overrides();
    if let Some(level) = log_level {
        config.logging.level = level.to_string();
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_parse_analyze_defaults() {
        let cli = Cli::try_parse_from(["diagnose", "analyze", "printer prints blank pages"]).unwrap();
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.text, "printer prints blank pages");
                assert_eq!(args.run.tier, "free");
                assert_eq!(args.run.config, PathBuf::from(DEFAULT_CONFIG_PATH));
                assert!(!args.run.json);
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_cli_parse_analyze_with_options() {
        let cli = Cli::try_parse_from([
            "diagnose",
            "analyze",
            "-t",
            "team",
            "--caller",
            "ops",
            "--json",
            "--category",
            "network",
            "vpn drops",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze(args) => {
                assert_eq!(args.run.tier, "team");
                assert_eq!(args.run.caller, "ops");
                assert!(args.run.json);
                assert_eq!(args.category.as_deref(), Some("network"));
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_cli_parse_chat() {
        let cli = Cli::try_parse_from(["diagnose", "chat", "--tier", "pro", "--conversation", "c-1"])
            .unwrap();
        match cli.command {
            Commands::Chat(args) => {
                assert_eq!(args.run.tier, "pro");
                assert_eq!(args.conversation.as_deref(), Some("c-1"));
            }
            _ => panic!("Expected Chat command"),
        }
    }

    #[test]
    fn test_cli_parse_config_init() {
        let cli = Cli::try_parse_from(["diagnose", "config", "init", "-o", "custom.toml", "--force"])
            .unwrap();
        match cli.command {
            Commands::Config(ConfigCommands::Init(args)) => {
                assert_eq!(args.output, PathBuf::from("custom.toml"));
                assert!(args.force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml"), Some("debug")).unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.cache.ttl_seconds, 1800);
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diagnose.toml");
        std::fs::write(&path, "[input]\nmin_length = 50\nmax_length = 10\n").unwrap();
        assert!(load_config(&path, None).is_err());
    }
}
