//! Aggregation handler
//!
//! Computes counts by full traversal of the curated store. Fine at the
//! scale the pipeline produces; a precomputed rollup would replace this
//! before the store grows past a few hundred thousand records.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use super::ApiState;
use crate::error::ApiError;

/// Records pulled per traversal page.
const SCAN_PAGE_SIZE: usize = 500;

/// Number of most-recent capture dates kept in the timeline.
const TIMELINE_DAYS: usize = 7;

#[derive(Debug, Serialize)]
pub struct AnalyticsSummary {
    pub total_records: usize,
    pub total_sources: usize,
    pub oldest_record: Option<DateTime<Utc>>,
    pub newest_record: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct TimelineEntry {
    pub date: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub summary: AnalyticsSummary,
    pub by_source: BTreeMap<String, usize>,
    pub by_date: BTreeMap<NaiveDate, usize>,
    /// The `by_date` entries in chronological order.
    pub timeline: Vec<TimelineEntry>,
}

/// `GET /analytics` — aggregate counts over the curated store.
pub async fn get_analytics(
    State(state): State<ApiState>,
) -> Result<Json<AnalyticsResponse>, ApiError> {
    let mut total_records = 0;
    let mut by_source: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_date: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    let mut oldest_record: Option<DateTime<Utc>> = None;
    let mut newest_record: Option<DateTime<Utc>> = None;

    let mut resume_key: Option<String> = None;
    loop {
        let page = state.curated.scan(resume_key.as_deref(), SCAN_PAGE_SIZE).await?;

        for record in &page.records {
            total_records += 1;
            *by_source.entry(record.source.clone()).or_default() += 1;
            *by_date.entry(record.captured_at.date_naive()).or_default() += 1;

            if oldest_record.is_none_or(|t| record.captured_at < t) {
                oldest_record = Some(record.captured_at);
            }
            if newest_record.is_none_or(|t| record.captured_at > t) {
                newest_record = Some(record.captured_at);
            }
        }

        match page.next_key {
            Some(key) => resume_key = Some(key),
            None => break,
        }
    }

    // Keep only the most recent capture dates, oldest first.
    while by_date.len() > TIMELINE_DAYS {
        by_date.pop_first();
    }
    let timeline = by_date
        .iter()
        .map(|(&date, &count)| TimelineEntry { date, count })
        .collect();

    Ok(Json(AnalyticsResponse {
        summary: AnalyticsSummary {
            total_records,
            total_sources: by_source.len(),
            oldest_record,
            newest_record,
        },
        by_source,
        by_date,
        timeline,
    }))
}
