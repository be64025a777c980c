//! Snapflow server - main entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use snapflow_common::logging::{init_logging, LogConfig};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing::info;

use snapflow_server::api::{self, ApiState};
use snapflow_server::config::{Config, RunMode};
use snapflow_server::ingest::Ingestor;
use snapflow_server::orchestrator::{Orchestrator, PipelineRunner};
use snapflow_server::stores::memory::{MemoryCuratedStore, MemoryQueue, MemoryRawStore};
use snapflow_server::stores::postgres::{PgCuratedStore, PgQueue};
use snapflow_server::stores::s3::{S3RawStore, StorageConfig};
use snapflow_server::stores::{CuratedStore, Queue, RawStore};

struct Stores {
    raw: Arc<dyn RawStore>,
    queue: Arc<dyn Queue>,
    curated: Arc<dyn CuratedStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::from_env();
    init_logging(&log_config)?;

    info!("Starting snapflow server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let stores = build_stores(&config).await?;

    let ingestor = Ingestor::new(
        &config.ingest,
        config.sources.clone(),
        stores.raw.clone(),
        stores.queue.clone(),
    )?;
    let transformer =
        snapflow_server::transform::Transformer::new(stores.raw.clone(), stores.curated.clone());
    let runner = Arc::new(PipelineRunner::new(
        ingestor,
        transformer,
        stores.queue.clone(),
        config.ingest.batch_size,
    ));

    let _orchestrator_handle = if config.ingest.enabled {
        info!(
            interval_secs = config.ingest.interval_secs,
            "Scheduled ingestion is enabled, starting orchestrator"
        );
        Some(Orchestrator::new(runner.clone(), config.ingest.interval_secs).start())
    } else {
        info!("Scheduled ingestion is disabled (SNAPFLOW_INGEST_ENABLED=false)");
        None
    };

    let state = ApiState {
        curated: stores.curated,
        runner,
        api_key: config.api.key.clone(),
    };
    let app = api::create_router(state, &config.cors);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

/// Construct the store backends for the configured run mode.
async fn build_stores(config: &Config) -> Result<Stores> {
    match config.mode {
        RunMode::Memory => {
            info!("Running with in-memory stores");
            Ok(Stores {
                raw: Arc::new(MemoryRawStore::new()),
                queue: Arc::new(MemoryQueue::new()),
                curated: Arc::new(MemoryCuratedStore::new()),
            })
        },
        RunMode::Durable => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database.max_connections)
                .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
                .connect(&config.database.url)
                .await?;
            info!("Database connection pool established");

            sqlx::migrate!("../../migrations")
                .run(&pool)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
            info!("Database migrations completed");

            let storage_config = StorageConfig::from_env()?;
            let raw = S3RawStore::new(storage_config);
            info!("Storage client initialized");

            let visibility = Duration::from_secs(config.ingest.visibility_timeout_secs);
            Ok(Stores {
                raw: Arc::new(raw),
                queue: Arc::new(PgQueue::new(pool.clone(), visibility)),
                curated: Arc::new(PgCuratedStore::new(pool)),
            })
        },
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
