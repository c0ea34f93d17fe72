//! Aggregate counts over a research subject's collected records.

use std::collections::BTreeMap;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::CollectedRecord;
use crate::store::Store;

/// Breakdown of what has been collected for one subject.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionSummary {
    pub total_items: usize,
    /// Record count per source id (`"unknown"` for records without one).
    pub by_source: BTreeMap<String, usize>,
    /// Record count per format tag.
    pub by_format: BTreeMap<String, usize>,
    pub total_size_bytes: u64,
    pub oldest_date: Option<DateTime<Utc>>,
    pub newest_date: Option<DateTime<Utc>>,
}

/// Load all records of `research_id` and summarize them.
pub async fn get_summary(store: &dyn Store, research_id: &str) -> Result<CollectionSummary> {
    let records = store.records_for_research(research_id, None).await?;
    Ok(summarize(&records))
}

pub fn summarize(records: &[CollectedRecord]) -> CollectionSummary {
    let mut by_source = BTreeMap::new();
    let mut by_format = BTreeMap::new();
    let mut total_size_bytes = 0u64;
    let mut oldest_date: Option<DateTime<Utc>> = None;
    let mut newest_date: Option<DateTime<Utc>> = None;

    for record in records {
        let source = record.source_id.as_deref().unwrap_or("unknown").to_string();
        *by_source.entry(source).or_insert(0) += 1;
        *by_format
            .entry(record.format.as_str().to_string())
            .or_insert(0) += 1;
        total_size_bytes += record.size_bytes;

        let ts = record.collected_at;
        if oldest_date.map_or(true, |d| ts < d) {
            oldest_date = Some(ts);
        }
        if newest_date.map_or(true, |d| ts > d) {
            newest_date = Some(ts);
        }
    }

    CollectionSummary {
        total_items: records.len(),
        by_source,
        by_format,
        total_size_bytes,
        oldest_date,
        newest_date,
    }
}
