//! Logging Configuration and Initialization
//!
//! Centralized tracing setup for all snapflow components. Use the
//! structured logging macros (`trace!` .. `error!`) with fields rather
//! than `println!`:
//!
//! ```rust
//! use tracing::info;
//!
//! info!(source = "jsonplaceholder", record_count = 3, "Capture stored");
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directives when `SNAPFLOW_LOG` is unset.
pub const DEFAULT_FILTER_DIRECTIVES: &str =
    "info,snapflow_server=debug,snapflow_common=debug,tower_http=info";

/// Output format for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text output
    #[default]
    Text,
    /// Newline-delimited JSON output
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid log format: {}", s)),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directives
    pub filter_directives: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter_directives: DEFAULT_FILTER_DIRECTIVES.to_string(),
            format: LogFormat::default(),
        }
    }
}

impl LogConfig {
    /// Build the configuration from `SNAPFLOW_LOG` / `SNAPFLOW_LOG_FORMAT`,
    /// falling back to defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let filter_directives = std::env::var("SNAPFLOW_LOG")
            .unwrap_or_else(|_| DEFAULT_FILTER_DIRECTIVES.to_string());
        let format = std::env::var("SNAPFLOW_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();

        Self { filter_directives, format }
    }
}

/// Initialize the global tracing subscriber.
///
/// Call once at process startup, before any log statements.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.filter_directives)
        .with_context(|| format!("invalid filter directives: {}", config.filter_directives))?;

    match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?,
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?,
    }

    Ok(())
}
