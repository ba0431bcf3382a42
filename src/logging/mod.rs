//! Tracing subscriber setup.
//!
//! `RUST_LOG` takes precedence over the configured level. Logs go to
//! stderr so command output on stdout stays machine-readable.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Build filter directives string from LoggingConfig
///
/// Constructs a tracing filter string that includes the base log level
/// and any component-specific log levels configured in the LoggingConfig.
/// Components are emitted in sorted order.
///
/// # Examples
///
/// ```
/// use diagnose::config::LoggingConfig;
/// use diagnose::logging::build_filter_directives;
/// use std::collections::HashMap;
///
/// let config = LoggingConfig {
///     component_levels: Some(HashMap::from([
///         ("orchestrator".to_string(), "debug".to_string()),
///         ("limiter".to_string(), "trace".to_string()),
///     ])),
///     ..Default::default()
/// };
///
/// assert_eq!(
///     build_filter_directives(&config),
///     "info,diagnose::limiter=trace,diagnose::orchestrator=debug"
/// );
/// ```
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    if let Some(component_levels) = &config.component_levels {
        let mut components: Vec<_> = component_levels.iter().collect();
        components.sort();
        for (component, level) in components {
            filter_str.push_str(&format!(",diagnose::{}={}", component, level));
        }
    }

    filter_str
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if a global subscriber is already installed or the directives
/// do not parse.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter_str = build_filter_directives(config);

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&filter_str)?,
    };

    if config.enable_content_logging {
        eprintln!(
            "WARNING: Content logging is enabled. Request text previews will be logged."
        );
        eprintln!("         This may include sensitive data. Use only for debugging.");
    }

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
    }

    Ok(())
}

/// First `max_chars` characters of `text`, with an ellipsis if cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
