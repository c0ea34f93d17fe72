//! Storage abstraction for Research Harness.
//!
//! The [`Store`] trait defines every persistence operation the collection
//! pipeline, the source registry, and the digest formatter need, enabling
//! pluggable backends (SQLite, in-memory).
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::models::{CollectedRecord, DataSource};

/// Abstract storage backend for Research Harness.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`find_source_by_name`](Store::find_source_by_name) | Look up a source by its natural key |
/// | [`insert_source`](Store::insert_source) | Persist a source, keeping one row per name |
/// | [`list_sources`](Store::list_sources) | All registered sources |
/// | [`add_records`](Store::add_records) | Persist a batch of records in one commit |
/// | [`records_for_research`](Store::records_for_research) | Records of one subject, in insertion order |
/// | [`attach_verification`](Store::attach_verification) | Merge verification metadata into a record |
#[async_trait]
pub trait Store: Send + Sync {
    /// Retrieve a source by name.
    async fn find_source_by_name(&self, name: &str) -> Result<Option<DataSource>>;

    /// Insert a source unless one with the same name already exists.
    ///
    /// Returns the persisted row, which is the pre-existing one when the
    /// name was already taken.
    async fn insert_source(&self, source: &DataSource) -> Result<DataSource>;

    /// List every registered source, ordered by name.
    async fn list_sources(&self) -> Result<Vec<DataSource>>;

    /// Persist all records atomically. An empty batch is a no-op.
    async fn add_records(&self, records: &[CollectedRecord]) -> Result<()>;

    /// Records of a research subject in insertion order, optionally capped.
    async fn records_for_research(
        &self,
        research_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<CollectedRecord>>;

    /// Store `verification` under the `verification` key of the record's metadata.
    async fn attach_verification(&self, record_id: &str, verification: &Value) -> Result<()>;
}

/// Merge a verification payload into a metadata value, coercing it to an object.
pub fn merge_verification(metadata: &mut Value, verification: &Value) {
    if !metadata.is_object() {
        *metadata = Value::Object(serde_json::Map::new());
    }
    if let Some(map) = metadata.as_object_mut() {
        map.insert("verification".to_string(), verification.clone());
    }
}
