//! Pipeline data model
//!
//! The shapes that flow through the three pipeline stages: configured
//! sources in, queue messages across the handoff, curated records out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload shape a source is expected to produce.
///
/// Unrecognized kinds deserialize as `Unknown` and map to zero curated
/// records rather than failing the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A collection of post-like items (title/body/author).
    Posts,
    /// A collection of user-like profiles.
    Users,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Posts => write!(f, "posts"),
            SourceKind::Users => write!(f, "users"),
            SourceKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// A configured external feed. Static for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub endpoint: String,
    pub kind: SourceKind,
}

/// Metadata tagged onto a raw capture at put time, for traceability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawObjectMetadata {
    pub source: String,
    pub kind: SourceKind,
    pub captured_at: DateTime<Utc>,
    pub content_hash: String,
}

/// Handoff message from the ingestor to the transformer.
///
/// Delivered at-least-once: the transformer must tolerate duplicates and
/// redeliveries in arbitrary order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub source: String,
    pub kind: SourceKind,
    pub raw_key: String,
    pub content_hash: String,
    pub captured_at: DateTime<Utc>,
    pub record_count: usize,
}

/// Source-kind-specific fields of a curated record.
///
/// Untagged so the wire shape stays flat (`title`/`body`/`userId` or
/// `name`/`email`/`country`/`gender` alongside the envelope fields); the
/// two variants have disjoint field sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordPayload {
    Post {
        title: String,
        body: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
    User {
        name: String,
        email: String,
        country: String,
        gender: String,
    },
}

/// A normalized, deduplicated record in the curated store.
///
/// `id` is deterministic (see [`crate::digest::record_id`]); at most one
/// record ever exists per id. Records are created once and never updated
/// or deleted. `fingerprint` is the per-item content digest; it is stored
/// for auditing, never compared against earlier captures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratedRecord {
    pub id: String,
    pub source: String,
    pub captured_at: DateTime<Utc>,
    pub processed_at: DateTime<Utc>,
    pub fingerprint: String,
    pub raw_key: String,
    #[serde(flatten)]
    pub payload: RecordPayload,
}

/// Per-source result of an ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceOutcome {
    pub source: String,
    #[serde(flatten)]
    pub status: SourceStatus,
}

/// Outcome of one source's capture attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SourceStatus {
    Success { raw_key: String, record_count: usize },
    Error { error: String },
}

impl SourceOutcome {
    pub fn success(source: &str, raw_key: String, record_count: usize) -> Self {
        Self {
            source: source.to_string(),
            status: SourceStatus::Success { raw_key, record_count },
        }
    }

    pub fn error(source: &str, error: String) -> Self {
        Self {
            source: source.to_string(),
            status: SourceStatus::Error { error },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, SourceStatus::Success { .. })
    }
}

/// Summary of a full ingestion run, one outcome per configured source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSummary {
    pub results: Vec<SourceOutcome>,
    pub completed_at: DateTime<Utc>,
}

impl IngestSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}
