//! In-process store backends
//!
//! Back the default run mode and every test. Semantics mirror the durable
//! backends: the curated store keeps records in a `BTreeMap` so scan order
//! and cursor behavior match the Postgres keyset scan, and the queue
//! redelivers nacked messages.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::ops::Bound;

use async_trait::async_trait;
use snapflow_common::types::{CuratedRecord, QueueMessage, RawObjectMetadata};
use snapflow_common::{Result, SnapflowError};
use tokio::sync::{Mutex, RwLock};

use super::{CuratedStore, Delivery, PutOutcome, Queue, RawStore, ScanPage};

// ============================================================================
// Raw store
// ============================================================================

struct StoredObject {
    bytes: Vec<u8>,
    #[allow(dead_code)]
    metadata: RawObjectMetadata,
}

/// In-memory [`RawStore`].
#[derive(Default)]
pub struct MemoryRawStore {
    objects: RwLock<HashMap<String, StoredObject>>,
}

impl MemoryRawStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored objects.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RawStore for MemoryRawStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, metadata: &RawObjectMetadata) -> Result<()> {
        let mut objects = self.objects.write().await;
        objects.insert(key.to_string(), StoredObject { bytes, metadata: metadata.clone() });
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let objects = self.objects.read().await;
        objects
            .get(key)
            .map(|object| object.bytes.clone())
            .ok_or_else(|| SnapflowError::NotFound(format!("raw object {key}")))
    }
}

// ============================================================================
// Queue
// ============================================================================

#[derive(Default)]
struct QueueInner {
    next_id: u64,
    pending: VecDeque<(u64, QueueMessage)>,
    inflight: HashMap<u64, QueueMessage>,
}

/// In-memory [`Queue`] with explicit ack/nack settling.
///
/// No visibility timer: unsettled deliveries stay in-flight until nacked,
/// which is enough for a single-process pipeline.
#[derive(Default)]
pub struct MemoryQueue {
    inner: Mutex<QueueInner>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages currently awaiting delivery.
    pub async fn pending_len(&self) -> usize {
        self.inner.lock().await.pending.len()
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    async fn send(&self, message: &QueueMessage) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id;
        inner.next_id += 1;
        inner.pending.push_back((id, message.clone()));
        Ok(())
    }

    async fn receive(&self, max: usize) -> Result<Vec<Delivery>> {
        let mut inner = self.inner.lock().await;
        let mut deliveries = Vec::new();
        while deliveries.len() < max {
            let Some((id, message)) = inner.pending.pop_front() else {
                break;
            };
            inner.inflight.insert(id, message.clone());
            deliveries.push(Delivery { receipt: id.to_string(), message });
        }
        Ok(deliveries)
    }

    async fn ack(&self, receipts: &[String]) -> Result<()> {
        let ids = parse_receipts(receipts)?;
        let mut inner = self.inner.lock().await;
        for id in ids {
            inner.inflight.remove(&id);
        }
        Ok(())
    }

    async fn nack(&self, receipts: &[String]) -> Result<()> {
        let ids = parse_receipts(receipts)?;
        let mut inner = self.inner.lock().await;
        for id in ids {
            if let Some(message) = inner.inflight.remove(&id) {
                inner.pending.push_back((id, message));
            }
        }
        Ok(())
    }
}

fn parse_receipts(receipts: &[String]) -> Result<Vec<u64>> {
    receipts
        .iter()
        .map(|r| {
            r.parse::<u64>()
                .map_err(|_| SnapflowError::Queue(format!("invalid receipt: {r}")))
        })
        .collect()
}

// ============================================================================
// Curated store
// ============================================================================

/// In-memory [`CuratedStore`] over an ordered map.
#[derive(Default)]
pub struct MemoryCuratedStore {
    records: RwLock<BTreeMap<String, CuratedRecord>>,
}

impl MemoryCuratedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl CuratedStore for MemoryCuratedStore {
    async fn put_if_absent(&self, record: &CuratedRecord) -> Result<PutOutcome> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Ok(PutOutcome::AlreadyExists);
        }
        records.insert(record.id.clone(), record.clone());
        Ok(PutOutcome::Created)
    }

    async fn get(&self, id: &str) -> Result<Option<CuratedRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn query_by_source(&self, source: &str, limit: usize) -> Result<Vec<CuratedRecord>> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|record| record.source == source)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn scan(&self, resume_key: Option<&str>, limit: usize) -> Result<ScanPage> {
        let records = self.records.read().await;
        let lower = match resume_key {
            Some(key) => Bound::Excluded(key.to_string()),
            None => Bound::Unbounded,
        };

        let page: Vec<CuratedRecord> =
            records.range((lower, Bound::Unbounded)).take(limit).map(|(_, r)| r.clone()).collect();

        let next_key = if page.len() == limit {
            page.last().map(|record| record.id.clone())
        } else {
            None
        };

        Ok(ScanPage { records: page, next_key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use snapflow_common::types::{RecordPayload, SourceKind};

    fn record(id: &str, source: &str) -> CuratedRecord {
        CuratedRecord {
            id: id.to_string(),
            source: source.to_string(),
            captured_at: Utc::now(),
            processed_at: Utc::now(),
            fingerprint: "f".to_string(),
            raw_key: "raw/k.json".to_string(),
            payload: RecordPayload::Post {
                title: "t".to_string(),
                body: "b".to_string(),
                user_id: "1".to_string(),
            },
        }
    }

    fn message(source: &str) -> QueueMessage {
        QueueMessage {
            source: source.to_string(),
            kind: SourceKind::Posts,
            raw_key: "raw/k.json".to_string(),
            content_hash: "abcd1234".to_string(),
            captured_at: Utc::now(),
            record_count: 1,
        }
    }

    #[tokio::test]
    async fn test_raw_store_round_trip_and_not_found() {
        let store = MemoryRawStore::new();
        let metadata = RawObjectMetadata {
            source: "a".into(),
            kind: SourceKind::Posts,
            captured_at: Utc::now(),
            content_hash: "h".into(),
        };
        store.put("raw/a.json", b"[1]".to_vec(), &metadata).await.unwrap();

        assert_eq!(store.get("raw/a.json").await.unwrap(), b"[1]".to_vec());
        assert!(matches!(
            store.get("raw/missing.json").await.unwrap_err(),
            SnapflowError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_put_if_absent_is_idempotent() {
        let store = MemoryCuratedStore::new();
        let r = record("a-1-x", "a");

        assert_eq!(store.put_if_absent(&r).await.unwrap(), PutOutcome::Created);
        assert_eq!(store.put_if_absent(&r).await.unwrap(), PutOutcome::AlreadyExists);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_query_by_source_respects_limit() {
        let store = MemoryCuratedStore::new();
        for i in 0..5 {
            store.put_if_absent(&record(&format!("a-{i}-x"), "a")).await.unwrap();
        }
        store.put_if_absent(&record("b-0-x", "b")).await.unwrap();

        let matches = store.query_by_source("a", 3).await.unwrap();
        assert_eq!(matches.len(), 3);
        assert!(matches.iter().all(|r| r.source == "a"));
    }

    #[tokio::test]
    async fn test_scan_pages_have_no_overlap_or_gap() {
        let store = MemoryCuratedStore::new();
        for i in 0..7 {
            store.put_if_absent(&record(&format!("a-{i}-x"), "a")).await.unwrap();
        }

        let mut paged = Vec::new();
        let mut resume: Option<String> = None;
        loop {
            let page = store.scan(resume.as_deref(), 3).await.unwrap();
            paged.extend(page.records.iter().map(|r| r.id.clone()));
            match page.next_key {
                Some(key) => resume = Some(key),
                None => break,
            }
        }

        let full = store.scan(None, 100).await.unwrap();
        let all: Vec<String> = full.records.iter().map(|r| r.id.clone()).collect();
        assert_eq!(paged, all);
        assert!(full.next_key.is_none());
    }

    #[tokio::test]
    async fn test_queue_ack_removes_and_nack_redelivers() {
        let queue = MemoryQueue::new();
        queue.send(&message("a")).await.unwrap();
        queue.send(&message("b")).await.unwrap();

        let deliveries = queue.receive(10).await.unwrap();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(queue.pending_len().await, 0);

        queue.ack(std::slice::from_ref(&deliveries[0].receipt)).await.unwrap();
        queue.nack(std::slice::from_ref(&deliveries[1].receipt)).await.unwrap();

        let redelivered = queue.receive(10).await.unwrap();
        assert_eq!(redelivered.len(), 1);
        assert_eq!(redelivered[0].message.source, "b");
    }
}
