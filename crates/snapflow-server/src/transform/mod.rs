//! Transform stage
//!
//! Consumes queue messages, reads the referenced raw capture, maps it into
//! curated records, and writes each with an insert-only-if-absent put.
//! Safe under at-least-once delivery: ids are deterministic, so a replayed
//! message re-derives the same ids and every conflicting write is a logged
//! no-op.
//!
//! Batch handling is explicit per message rather than abort-on-first-error:
//! each delivery gets its own outcome, so the consumer can ack the
//! successes and redeliver only the failures.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use snapflow_common::types::QueueMessage;
use snapflow_common::Result;
use tracing::{debug, error, info, instrument};

use crate::stores::{CuratedStore, Delivery, PutOutcome, RawStore};

pub mod mappers;

/// Counters for one processed message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformStats {
    /// Candidates the mapper produced.
    pub mapped: usize,
    /// First-time writes.
    pub stored: usize,
    /// Idempotent no-ops (id already present).
    pub deduped: usize,
}

/// Result of one delivery.
#[derive(Debug)]
pub struct MessageOutcome {
    pub receipt: String,
    pub source: String,
    pub result: Result<TransformStats>,
}

/// Per-message results for a whole batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub outcomes: Vec<MessageOutcome>,
}

impl BatchOutcome {
    /// Receipts safe to ack.
    pub fn succeeded_receipts(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_ok())
            .map(|o| o.receipt.clone())
            .collect()
    }

    /// Receipts that must be redelivered.
    pub fn failed_receipts(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| o.result.is_err())
            .map(|o| o.receipt.clone())
            .collect()
    }

    pub fn stored(&self) -> usize {
        self.stats_sum(|s| s.stored)
    }

    pub fn deduped(&self) -> usize {
        self.stats_sum(|s| s.deduped)
    }

    fn stats_sum(&self, f: impl Fn(&TransformStats) -> usize) -> usize {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok()).map(f).sum()
    }
}

/// Maps raw captures into deduplicated curated records.
pub struct Transformer {
    raw: Arc<dyn RawStore>,
    curated: Arc<dyn CuratedStore>,
}

impl Transformer {
    pub fn new(raw: Arc<dyn RawStore>, curated: Arc<dyn CuratedStore>) -> Self {
        Self { raw, curated }
    }

    /// Process a batch of deliveries, isolating failures per message.
    pub async fn process_batch(&self, deliveries: &[Delivery]) -> BatchOutcome {
        info!("Processing batch of {} messages", deliveries.len());

        let mut outcomes = Vec::with_capacity(deliveries.len());
        for delivery in deliveries {
            let result = self.process_message(&delivery.message).await;
            match &result {
                Ok(stats) => info!(
                    source = %delivery.message.source,
                    mapped = stats.mapped,
                    stored = stats.stored,
                    deduped = stats.deduped,
                    "Message processed"
                ),
                Err(e) => error!(
                    source = %delivery.message.source,
                    raw_key = %delivery.message.raw_key,
                    error = %e,
                    "Message failed"
                ),
            }
            outcomes.push(MessageOutcome {
                receipt: delivery.receipt.clone(),
                source: delivery.message.source.clone(),
                result,
            });
        }

        BatchOutcome { outcomes }
    }

    #[instrument(skip(self, message), fields(source = %message.source, raw_key = %message.raw_key))]
    async fn process_message(&self, message: &QueueMessage) -> Result<TransformStats> {
        let bytes = self.raw.get(&message.raw_key).await?;
        let raw: Value = serde_json::from_slice(&bytes)?;

        let processed_at = Utc::now();
        let candidates = mappers::map_records(message, &raw, processed_at);

        let mut stats = TransformStats { mapped: candidates.len(), ..Default::default() };
        for record in &candidates {
            match self.curated.put_if_absent(record).await? {
                PutOutcome::Created => {
                    debug!(id = %record.id, "Stored curated record");
                    stats.stored += 1;
                },
                PutOutcome::AlreadyExists => {
                    debug!(id = %record.id, "Record exists, idempotent no-op");
                    stats.deduped += 1;
                },
            }
        }

        Ok(stats)
    }
}
