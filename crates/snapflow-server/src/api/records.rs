//! Record listing and lookup handlers

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use snapflow_common::cursor::{decode_cursor, encode_cursor};
use snapflow_common::types::CuratedRecord;

use super::ApiState;
use crate::error::ApiError;

/// Default page size for listings.
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Upper bound on requested page size.
pub const MAX_PAGE_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub source: Option<String>,
    pub limit: Option<usize>,
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub records: Vec<CuratedRecord>,
    pub count: usize,
    /// Opaque resume token; null on the last page. Filtered listings are
    /// limit-bounded and never return one.
    pub cursor: Option<String>,
}

/// `GET /records` — list curated records, optionally filtered by source.
pub async fn list_records(
    State(state): State<ApiState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_LIMIT)
        .clamp(1, MAX_PAGE_LIMIT);

    if let Some(source) = &query.source {
        let records = state.curated.query_by_source(source, limit).await?;
        return Ok(Json(ListResponse { count: records.len(), records, cursor: None }));
    }

    let resume_key = query
        .cursor
        .as_deref()
        .map(decode_cursor)
        .transpose()
        .map_err(ApiError::InvalidCursor)?;

    let page = state.curated.scan(resume_key.as_deref(), limit).await?;
    let cursor = page.next_key.as_deref().map(encode_cursor);

    Ok(Json(ListResponse { count: page.records.len(), records: page.records, cursor }))
}

/// `GET /records/{id}` — fetch one record by its deterministic id.
pub async fn get_record(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<CuratedRecord>, ApiError> {
    match state.curated.get(&id).await? {
        Some(record) => Ok(Json(record)),
        None => Err(ApiError::RecordNotFound { id }),
    }
}
