//! SQLite-backed [`Store`] implementation.
//!
//! Enum columns are stored as their lowercase tags, timestamps as Unix
//! milliseconds, and record metadata as a JSON string. Record order is
//! insertion order (`rowid`).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use research_harness_core::models::{Category, CollectedRecord, DataSource};
use research_harness_core::store::{merge_verification, Store};

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn ts_from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| anyhow!("invalid timestamp: {}", ms))
}

fn row_to_source(row: &SqliteRow) -> Result<DataSource> {
    Ok(DataSource {
        id: row.get("id"),
        name: row.get("name"),
        source_type: row.get::<String, _>("source_type").parse()?,
        url: row.get("url"),
        category: row.get("category"),
        status: row.get::<String, _>("status").parse()?,
        created_at: ts_from_millis(row.get("created_at"))?,
    })
}

fn row_to_record(row: &SqliteRow) -> Result<CollectedRecord> {
    let metadata_json: String = row.get("metadata_json");
    let category: Option<String> = row.get("category");
    Ok(CollectedRecord {
        id: row.get("id"),
        source_id: row.get("source_id"),
        research_id: row.get("research_id"),
        title: row.get("title"),
        raw_content: row.get("raw_content"),
        processed_content: row.get("processed_content"),
        format: row.get::<String, _>("format").parse()?,
        source_url: row.get("source_url"),
        collected_at: ts_from_millis(row.get("collected_at"))?,
        size_bytes: row.get::<i64, _>("size_bytes").max(0) as u64,
        category: category.map(|c| c.parse::<Category>()).transpose()?,
        metadata: serde_json::from_str(&metadata_json).unwrap_or(Value::Null),
        processing: row.get::<String, _>("processing").parse()?,
    })
}

const SOURCE_COLUMNS: &str = "id, name, source_type, url, category, status, created_at";
const RECORD_COLUMNS: &str = "id, source_id, research_id, title, raw_content, processed_content, \
     format, source_url, collected_at, size_bytes, category, metadata_json, processing";

#[async_trait]
impl Store for SqliteStore {
    async fn find_source_by_name(&self, name: &str) -> Result<Option<DataSource>> {
        let row = sqlx::query(&format!(
            "SELECT {SOURCE_COLUMNS} FROM data_sources WHERE name = ?"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_source).transpose()
    }

    async fn insert_source(&self, source: &DataSource) -> Result<DataSource> {
        sqlx::query(
            r#"
            INSERT INTO data_sources (id, name, source_type, url, category, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(&source.id)
        .bind(&source.name)
        .bind(source.source_type.as_str())
        .bind(&source.url)
        .bind(&source.category)
        .bind(source.status.as_str())
        .bind(source.created_at.timestamp_millis())
        .execute(&self.pool)
        .await?;

        self.find_source_by_name(&source.name)
            .await?
            .with_context(|| format!("source '{}' missing after insert", source.name))
    }

    async fn list_sources(&self) -> Result<Vec<DataSource>> {
        let rows = sqlx::query(&format!(
            "SELECT {SOURCE_COLUMNS} FROM data_sources ORDER BY name"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_source).collect()
    }

    async fn add_records(&self, records: &[CollectedRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(&format!(
                "INSERT INTO collected_records ({RECORD_COLUMNS}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ))
            .bind(&record.id)
            .bind(&record.source_id)
            .bind(&record.research_id)
            .bind(&record.title)
            .bind(&record.raw_content)
            .bind(&record.processed_content)
            .bind(record.format.as_str())
            .bind(&record.source_url)
            .bind(record.collected_at.timestamp_millis())
            .bind(record.size_bytes as i64)
            .bind(record.category.map(|c| c.as_str()))
            .bind(record.metadata.to_string())
            .bind(record.processing.as_str())
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to insert record {}", record.id))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn records_for_research(
        &self,
        research_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<CollectedRecord>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = sqlx::query(&format!(
            "SELECT {RECORD_COLUMNS} FROM collected_records WHERE research_id = ? ORDER BY rowid LIMIT ?"
        ))
        .bind(research_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }

    async fn attach_verification(&self, record_id: &str, verification: &Value) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let metadata_json: Option<String> =
            sqlx::query_scalar("SELECT metadata_json FROM collected_records WHERE id = ?")
                .bind(record_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(metadata_json) = metadata_json else {
            return Err(anyhow!("record not found: {}", record_id));
        };

        let mut metadata: Value = serde_json::from_str(&metadata_json).unwrap_or(Value::Null);
        merge_verification(&mut metadata, verification);

        sqlx::query("UPDATE collected_records SET metadata_json = ? WHERE id = ?")
            .bind(metadata.to_string())
            .bind(record_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}
