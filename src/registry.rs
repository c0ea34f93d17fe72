//! Source registry: resolve a source name to its single persisted row.
//!
//! Stages refer to their provenance by fixed names ([`WEB_SEARCH_SOURCE`],
//! [`SCRAPING_SOURCE`], [`NEWS_SOURCE`], plus one per statistics catalogue
//! entry). The first resolution of a name creates the row; every later one
//! returns it unchanged, whatever type or url the caller passes.
//!
//! Two layers keep one row per name:
//!
//! 1. A per-name async lock serializes lookup-then-create inside this
//!    process.
//! 2. [`Store::insert_source`] is itself idempotent on name, which covers
//!    separate processes sharing one database.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use research_harness_core::models::{DataSource, SourceType};
use research_harness_core::store::Store;

pub const WEB_SEARCH_SOURCE: &str = "web-search";
pub const SCRAPING_SOURCE: &str = "competitor-scraping";
pub const NEWS_SOURCE: &str = "news-aggregator";

pub struct SourceRegistry {
    store: Arc<dyn Store>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl SourceRegistry {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(name.to_string()).or_default().clone()
    }

    /// Return the source called `name`, creating it as active if absent.
    pub async fn resolve(
        &self,
        name: &str,
        source_type: SourceType,
        url: Option<&str>,
        category: Option<&str>,
    ) -> Result<DataSource> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        if let Some(existing) = self
            .store
            .find_source_by_name(name)
            .await
            .with_context(|| format!("failed to look up source '{}'", name))?
        {
            return Ok(existing);
        }

        let source = DataSource::new(
            name,
            source_type,
            url.map(str::to_string),
            category.map(str::to_string),
        );
        let persisted = self
            .store
            .insert_source(&source)
            .await
            .with_context(|| format!("failed to register source '{}'", name))?;

        tracing::info!(name, id = %persisted.id, kind = %persisted.source_type, "registered data source");
        Ok(persisted)
    }
}
