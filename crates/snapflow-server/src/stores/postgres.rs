//! Postgres-backed queue and curated store
//!
//! Durable-mode backends over a shared connection pool. The curated
//! store's conditional insert rides on `ON CONFLICT (id) DO NOTHING`, so
//! per-id atomicity comes from the primary key; the queue implements
//! at-least-once delivery with `FOR UPDATE SKIP LOCKED` and a visibility
//! timeout.

use async_trait::async_trait;
use snapflow_common::types::{CuratedRecord, QueueMessage};
use snapflow_common::{Result, SnapflowError};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tracing::{debug, instrument};

use super::{CuratedStore, Delivery, PutOutcome, Queue, ScanPage};

fn db_err(e: sqlx::Error) -> SnapflowError {
    SnapflowError::Storage(format!("database error: {e}"))
}

fn queue_err(e: sqlx::Error) -> SnapflowError {
    SnapflowError::Queue(format!("database error: {e}"))
}

// ============================================================================
// Curated store
// ============================================================================

/// [`CuratedStore`] over the `curated_records` table.
#[derive(Clone)]
pub struct PgCuratedStore {
    pool: PgPool,
}

impl PgCuratedStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> Result<CuratedRecord> {
    let payload: serde_json::Value = row.try_get("payload").map_err(db_err)?;
    Ok(CuratedRecord {
        id: row.try_get("id").map_err(db_err)?,
        source: row.try_get("source").map_err(db_err)?,
        captured_at: row.try_get("captured_at").map_err(db_err)?,
        processed_at: row.try_get("processed_at").map_err(db_err)?,
        fingerprint: row.try_get("fingerprint").map_err(db_err)?,
        raw_key: row.try_get("raw_key").map_err(db_err)?,
        payload: serde_json::from_value(payload)?,
    })
}

const RECORD_COLUMNS: &str = "id, source, captured_at, processed_at, fingerprint, raw_key, payload";

#[async_trait]
impl CuratedStore for PgCuratedStore {
    #[instrument(skip(self, record), fields(id = %record.id))]
    async fn put_if_absent(&self, record: &CuratedRecord) -> Result<PutOutcome> {
        let payload = serde_json::to_value(&record.payload)?;

        let result = sqlx::query(
            "INSERT INTO curated_records \
             (id, source, captured_at, processed_at, fingerprint, raw_key, payload) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&record.id)
        .bind(&record.source)
        .bind(record.captured_at)
        .bind(record.processed_at)
        .bind(&record.fingerprint)
        .bind(&record.raw_key)
        .bind(&payload)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            Ok(PutOutcome::AlreadyExists)
        } else {
            Ok(PutOutcome::Created)
        }
    }

    #[instrument(skip(self))]
    async fn get(&self, id: &str) -> Result<Option<CuratedRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM curated_records WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(record_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn query_by_source(&self, source: &str, limit: usize) -> Result<Vec<CuratedRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM curated_records \
             WHERE source = $1 ORDER BY id LIMIT $2"
        ))
        .bind(source)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(record_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn scan(&self, resume_key: Option<&str>, limit: usize) -> Result<ScanPage> {
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM curated_records \
             WHERE ($1::text IS NULL OR id > $1) ORDER BY id LIMIT $2"
        ))
        .bind(resume_key)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let records: Vec<CuratedRecord> = rows.iter().map(record_from_row).collect::<Result<_>>()?;

        let next_key = if records.len() == limit {
            records.last().map(|record| record.id.clone())
        } else {
            None
        };

        Ok(ScanPage { records, next_key })
    }
}

// ============================================================================
// Queue
// ============================================================================

/// [`Queue`] over the `queue_messages` table.
///
/// Receive claims a batch with `FOR UPDATE SKIP LOCKED` and stamps a
/// visibility deadline; claims that are never acked expire and the rows
/// become receivable again, giving at-least-once delivery across
/// concurrent consumers.
#[derive(Clone)]
pub struct PgQueue {
    pool: PgPool,
    visibility_timeout: Duration,
}

impl PgQueue {
    pub fn new(pool: PgPool, visibility_timeout: Duration) -> Self {
        Self { pool, visibility_timeout }
    }

    fn parse_receipts(receipts: &[String]) -> Result<Vec<i64>> {
        receipts
            .iter()
            .map(|r| {
                r.parse::<i64>()
                    .map_err(|_| SnapflowError::Queue(format!("invalid receipt: {r}")))
            })
            .collect()
    }
}

#[async_trait]
impl Queue for PgQueue {
    #[instrument(skip(self, message), fields(source = %message.source))]
    async fn send(&self, message: &QueueMessage) -> Result<()> {
        let body = serde_json::to_value(message)?;

        sqlx::query("INSERT INTO queue_messages (body) VALUES ($1)")
            .bind(&body)
            .execute(&self.pool)
            .await
            .map_err(queue_err)?;

        debug!("Enqueued message for source {}", message.source);

        Ok(())
    }

    #[instrument(skip(self))]
    async fn receive(&self, max: usize) -> Result<Vec<Delivery>> {
        let rows = sqlx::query(
            "UPDATE queue_messages \
             SET locked_until = now() + make_interval(secs => $2) \
             WHERE id IN ( \
                 SELECT id FROM queue_messages \
                 WHERE locked_until IS NULL OR locked_until < now() \
                 ORDER BY id \
                 LIMIT $1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING id, body",
        )
        .bind(max as i64)
        .bind(self.visibility_timeout.as_secs_f64())
        .fetch_all(&self.pool)
        .await
        .map_err(queue_err)?;

        rows.iter()
            .map(|row| {
                let id: i64 = row.try_get("id").map_err(queue_err)?;
                let body: serde_json::Value = row.try_get("body").map_err(queue_err)?;
                Ok(Delivery {
                    receipt: id.to_string(),
                    message: serde_json::from_value(body)?,
                })
            })
            .collect()
    }

    #[instrument(skip(self))]
    async fn ack(&self, receipts: &[String]) -> Result<()> {
        if receipts.is_empty() {
            return Ok(());
        }
        let ids = Self::parse_receipts(receipts)?;

        sqlx::query("DELETE FROM queue_messages WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&self.pool)
            .await
            .map_err(queue_err)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn nack(&self, receipts: &[String]) -> Result<()> {
        if receipts.is_empty() {
            return Ok(());
        }
        let ids = Self::parse_receipts(receipts)?;

        sqlx::query("UPDATE queue_messages SET locked_until = NULL WHERE id = ANY($1)")
            .bind(&ids)
            .execute(&self.pool)
            .await
            .map_err(queue_err)?;

        Ok(())
    }
}
