//! Capture stage
//!
//! For each configured source: fetch the current payload, persist it raw,
//! and hand a message to the queue. Sources are isolated from each other:
//! one feed failing (network, parse, store, or queue) is reported in the
//! run summary and never blocks the rest. There is no internal retry; the
//! scheduler simply captures again next cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use serde_json::Value;
use snapflow_common::digest::content_digest;
use snapflow_common::types::{
    IngestSummary, QueueMessage, RawObjectMetadata, SourceDescriptor, SourceOutcome,
};
use snapflow_common::{Result, SnapflowError};
use tracing::{error, info, instrument};

use crate::config::IngestConfig;
use crate::stores::{Queue, RawStore};

/// Key layout for raw captures: namespaced by source and capture date,
/// suffixed with the capture digest for traceability.
pub fn raw_object_key(source: &str, captured_at: DateTime<Utc>, content_hash: &str) -> String {
    format!(
        "raw/source={}/date={}/{}-{}.json",
        source,
        captured_at.format("%Y-%m-%d"),
        captured_at.to_rfc3339(),
        content_hash
    )
}

/// Item count implied by the payload shape: a top-level array's length, a
/// nested `results` array's length, or 1 for a scalar payload.
pub fn payload_record_count(payload: &Value) -> usize {
    if let Some(items) = payload.as_array() {
        return items.len();
    }
    if let Some(results) = payload.get("results").and_then(Value::as_array) {
        return results.len();
    }
    1
}

/// Fetches configured sources and persists raw captures.
pub struct Ingestor {
    sources: Vec<SourceDescriptor>,
    http: reqwest::Client,
    raw: Arc<dyn RawStore>,
    queue: Arc<dyn Queue>,
    concurrency: usize,
}

impl Ingestor {
    pub fn new(
        config: &IngestConfig,
        sources: Vec<SourceDescriptor>,
        raw: Arc<dyn RawStore>,
        queue: Arc<dyn Queue>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_secs))
            .build()
            .map_err(|e| SnapflowError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            sources,
            http,
            raw,
            queue,
            concurrency: config.fetch_concurrency.max(1),
        })
    }

    /// Capture every configured source once, with bounded concurrency.
    pub async fn run(&self) -> IngestSummary {
        info!("Starting ingestion run for {} sources", self.sources.len());

        let captures: Vec<_> =
            self.sources.iter().map(|source| self.capture_source(source).boxed()).collect();
        let results: Vec<SourceOutcome> = stream::iter(captures)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let summary = IngestSummary { results, completed_at: Utc::now() };
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "Ingestion run completed"
        );
        summary
    }

    #[instrument(skip(self, source), fields(source = %source.name))]
    async fn capture_source(&self, source: &SourceDescriptor) -> SourceOutcome {
        match self.try_capture(source).await {
            Ok((raw_key, record_count)) => {
                info!(raw_key = %raw_key, record_count, "Capture stored");
                SourceOutcome::success(&source.name, raw_key, record_count)
            },
            Err(e) => {
                error!(error = %e, "Capture failed");
                SourceOutcome::error(&source.name, e.to_string())
            },
        }
    }

    async fn try_capture(&self, source: &SourceDescriptor) -> Result<(String, usize)> {
        let payload: Value = self
            .http
            .get(&source.endpoint)
            .send()
            .await
            .map_err(|e| SnapflowError::Network(e.to_string()))?
            .error_for_status()
            .map_err(|e| SnapflowError::Network(e.to_string()))?
            .json()
            .await
            .map_err(|e| SnapflowError::Network(e.to_string()))?;

        let captured_at = Utc::now();
        let bytes = serde_json::to_vec(&payload)?;
        let content_hash = content_digest(&bytes);
        let raw_key = raw_object_key(&source.name, captured_at, &content_hash);
        let record_count = payload_record_count(&payload);

        let metadata = RawObjectMetadata {
            source: source.name.clone(),
            kind: source.kind,
            captured_at,
            content_hash: content_hash.clone(),
        };
        self.raw.put(&raw_key, bytes, &metadata).await?;

        let message = QueueMessage {
            source: source.name.clone(),
            kind: source.kind,
            raw_key: raw_key.clone(),
            content_hash,
            captured_at,
            record_count,
        };
        self.queue.send(&message).await?;

        Ok((raw_key, record_count))
    }
}
