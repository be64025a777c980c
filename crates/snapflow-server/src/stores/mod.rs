//! Storage capability traits
//!
//! The pipeline's external collaborators, specified at their interface
//! boundary. Components hold these as `Arc<dyn …>` so backends can be
//! swapped: S3/Postgres in durable mode, in-memory everywhere tests run.

use async_trait::async_trait;
use snapflow_common::types::{CuratedRecord, QueueMessage, RawObjectMetadata};
use snapflow_common::Result;

pub mod memory;
pub mod postgres;
pub mod s3;

/// Durable blob storage for raw captures, keyed by hierarchical path.
#[async_trait]
pub trait RawStore: Send + Sync {
    /// Store a raw payload under `key`, tagged with capture metadata.
    async fn put(&self, key: &str, bytes: Vec<u8>, metadata: &RawObjectMetadata) -> Result<()>;

    /// Fetch a raw payload. Returns [`SnapflowError::NotFound`] for a
    /// missing key.
    ///
    /// [`SnapflowError::NotFound`]: snapflow_common::SnapflowError::NotFound
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
}

/// A received queue message plus the receipt used to settle it.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub receipt: String,
    pub message: QueueMessage,
}

/// At-least-once message queue between the ingestor and transformer.
///
/// Receivers settle each delivery explicitly: `ack` removes it, `nack`
/// makes it visible again for redelivery. Unsettled deliveries reappear
/// after the backend's visibility timeout, so consumers must be
/// idempotent.
#[async_trait]
pub trait Queue: Send + Sync {
    async fn send(&self, message: &QueueMessage) -> Result<()>;

    /// Receive up to `max` messages, making them invisible to other
    /// consumers until settled or timed out.
    async fn receive(&self, max: usize) -> Result<Vec<Delivery>>;

    async fn ack(&self, receipts: &[String]) -> Result<()>;

    async fn nack(&self, receipts: &[String]) -> Result<()>;
}

/// Result of a conditional insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// First write for this id.
    Created,
    /// The id was already present; the write was a no-op. The expected,
    /// non-exceptional outcome on redelivery.
    AlreadyExists,
}

/// One page of a curated-store traversal.
#[derive(Debug, Clone)]
pub struct ScanPage {
    pub records: Vec<CuratedRecord>,
    /// Resume key for the next page; `None` when the traversal may be
    /// complete.
    pub next_key: Option<String>,
}

/// Table of curated records keyed by deterministic id, with a secondary
/// index on `source`.
#[async_trait]
pub trait CuratedStore: Send + Sync {
    /// Insert-only-if-absent write, atomic per id. Concurrent writers
    /// racing on the same id see exactly one `Created`.
    async fn put_if_absent(&self, record: &CuratedRecord) -> Result<PutOutcome>;

    async fn get(&self, id: &str) -> Result<Option<CuratedRecord>>;

    /// Lookup by source via the secondary index, bounded by `limit`.
    async fn query_by_source(&self, source: &str, limit: usize) -> Result<Vec<CuratedRecord>>;

    /// Ordered traversal resuming after `resume_key` (exclusive).
    async fn scan(&self, resume_key: Option<&str>, limit: usize) -> Result<ScanPage>;
}
