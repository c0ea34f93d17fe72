//! In-memory [`Store`] implementation for testing and embedding.
//!
//! Uses `Vec`s behind `std::sync::RwLock`. Source insertion checks the name
//! under the write lock, so the one-row-per-name invariant holds under
//! concurrent callers.

use std::sync::{PoisonError, RwLock};

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{CollectedRecord, DataSource};

use super::{merge_verification, Store};

/// In-memory store for tests and ephemeral runs.
pub struct InMemoryStore {
    sources: RwLock<Vec<DataSource>>,
    records: RwLock<Vec<CollectedRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
            records: RwLock::new(Vec::new()),
        }
    }

    /// Number of persisted sources.
    pub fn source_count(&self) -> usize {
        self.sources
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of persisted records across all subjects.
    pub fn record_count(&self) -> usize {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn find_source_by_name(&self, name: &str) -> Result<Option<DataSource>> {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        Ok(sources.iter().find(|s| s.name == name).cloned())
    }

    async fn insert_source(&self, source: &DataSource) -> Result<DataSource> {
        let mut sources = self.sources.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = sources.iter().find(|s| s.name == source.name) {
            return Ok(existing.clone());
        }
        sources.push(source.clone());
        Ok(source.clone())
    }

    async fn list_sources(&self) -> Result<Vec<DataSource>> {
        let sources = self.sources.read().unwrap_or_else(PoisonError::into_inner);
        let mut all = sources.clone();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(all)
    }

    async fn add_records(&self, records: &[CollectedRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut stored = self.records.write().unwrap_or_else(PoisonError::into_inner);
        stored.extend_from_slice(records);
        Ok(())
    }

    async fn records_for_research(
        &self,
        research_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<CollectedRecord>> {
        let stored = self.records.read().unwrap_or_else(PoisonError::into_inner);
        let matching = stored
            .iter()
            .filter(|r| r.research_id.as_deref() == Some(research_id))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(matching)
    }

    async fn attach_verification(&self, record_id: &str, verification: &Value) -> Result<()> {
        let mut stored = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match stored.iter_mut().find(|r| r.id == record_id) {
            Some(record) => {
                merge_verification(&mut record.metadata, verification);
                Ok(())
            }
            None => bail!("record not found: {}", record_id),
        }
    }
}
