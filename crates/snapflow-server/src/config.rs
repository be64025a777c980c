//! Configuration management

use serde::{Deserialize, Serialize};
use snapflow_common::types::{SourceDescriptor, SourceKind};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/snapflow";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default CORS allowed origin for local development.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// Default seconds between scheduled pipeline cycles.
pub const DEFAULT_INGEST_INTERVAL_SECS: u64 = 3600;

/// Default number of queue messages received per transformer batch.
pub const DEFAULT_INGEST_BATCH_SIZE: usize = 10;

/// Default per-request timeout for source fetches, in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default number of sources captured concurrently.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 4;

/// Default queue visibility timeout, in seconds.
pub const DEFAULT_VISIBILITY_TIMEOUT_SECS: u64 = 300;

/// Which backends the stores run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// In-process stores; no external services. Default for local runs
    /// and the mode every test uses.
    #[default]
    Memory,
    /// Postgres-backed queue and curated store, S3-backed raw store.
    Durable,
}

impl std::str::FromStr for RunMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(RunMode::Memory),
            "durable" => Ok(RunMode::Durable),
            _ => Err(anyhow::anyhow!("Invalid run mode: {}", s)),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub mode: RunMode,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub api: ApiConfig,
    pub ingest: IngestConfig,
    pub sources: Vec<SourceDescriptor>,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Database configuration (durable mode only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// API boundary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Shared secret expected in `X-Api-Key`. When unset, requests are
    /// not authenticated (trusted/internal deployments).
    pub key: Option<String>,
}

/// Pipeline scheduling and tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Run the pipeline on a timer. Manual triggering via
    /// `POST /ingest/run` works either way.
    pub enabled: bool,
    pub interval_secs: u64,
    pub batch_size: usize,
    pub fetch_timeout_secs: u64,
    pub fetch_concurrency: usize,
    pub visibility_timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: DEFAULT_INGEST_INTERVAL_SECS,
            batch_size: DEFAULT_INGEST_BATCH_SIZE,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
            visibility_timeout_secs: DEFAULT_VISIBILITY_TIMEOUT_SECS,
        }
    }
}

/// The feeds captured when no `SNAPFLOW_SOURCES` override is present.
pub fn default_sources() -> Vec<SourceDescriptor> {
    vec![
        SourceDescriptor {
            name: "jsonplaceholder".to_string(),
            endpoint: "https://jsonplaceholder.typicode.com/posts".to_string(),
            kind: SourceKind::Posts,
        },
        SourceDescriptor {
            name: "randomuser".to_string(),
            endpoint: "https://randomuser.me/api/?results=10".to_string(),
            kind: SourceKind::Users,
        },
    ]
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let sources = match std::env::var("SNAPFLOW_SOURCES") {
            Ok(json) => serde_json::from_str(&json)
                .map_err(|e| anyhow::anyhow!("invalid SNAPFLOW_SOURCES: {}", e))?,
            Err(_) => default_sources(),
        };

        let config = Config {
            server: ServerConfig {
                host: std::env::var("SNAPFLOW_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: std::env::var("SNAPFLOW_PORT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: std::env::var("SNAPFLOW_SHUTDOWN_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            },
            mode: std::env::var("SNAPFLOW_MODE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default(),
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
                connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .collect(),
                allow_credentials: std::env::var("CORS_ALLOW_CREDENTIALS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(true),
            },
            api: ApiConfig {
                key: std::env::var("SNAPFLOW_API_KEY").ok().filter(|k| !k.is_empty()),
            },
            ingest: IngestConfig {
                enabled: std::env::var("SNAPFLOW_INGEST_ENABLED")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(false),
                interval_secs: std::env::var("SNAPFLOW_INGEST_INTERVAL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_INGEST_INTERVAL_SECS),
                batch_size: std::env::var("SNAPFLOW_BATCH_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_INGEST_BATCH_SIZE),
                fetch_timeout_secs: std::env::var("SNAPFLOW_FETCH_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_FETCH_TIMEOUT_SECS),
                fetch_concurrency: std::env::var("SNAPFLOW_FETCH_CONCURRENCY")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_FETCH_CONCURRENCY),
                visibility_timeout_secs: std::env::var("SNAPFLOW_VISIBILITY_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_VISIBILITY_TIMEOUT_SECS),
            },
            sources,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.mode == RunMode::Durable && self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty in durable mode");
        }

        if self.ingest.batch_size == 0 {
            anyhow::bail!("Batch size must be greater than 0");
        }

        if self.ingest.fetch_concurrency == 0 {
            anyhow::bail!("Fetch concurrency must be greater than 0");
        }

        let mut names: Vec<&str> = self.sources.iter().map(|s| s.name.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        if names.len() != self.sources.len() {
            anyhow::bail!("Source names must be unique");
        }

        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            mode: RunMode::Memory,
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: true,
            },
            api: ApiConfig { key: None },
            ingest: IngestConfig::default(),
            sources: default_sources(),
        }
    }
}
