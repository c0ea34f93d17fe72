//! Idempotent schema migrations.
//!
//! Every statement uses `IF NOT EXISTS`, so `rh init` can run any number of
//! times against the same database.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes on an open pool.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    // One row per source name; the registry relies on this constraint.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS data_sources (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            source_type TEXT NOT NULL,
            url TEXT,
            category TEXT,
            status TEXT NOT NULL DEFAULT 'active',
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // source_id and research_id are weak references: no foreign keys.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collected_records (
            id TEXT PRIMARY KEY,
            source_id TEXT,
            research_id TEXT,
            title TEXT,
            raw_content TEXT,
            processed_content TEXT,
            format TEXT NOT NULL,
            source_url TEXT,
            collected_at INTEGER NOT NULL,
            size_bytes INTEGER NOT NULL DEFAULT 0,
            category TEXT,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            processing TEXT NOT NULL DEFAULT 'unprocessed'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_collected_records_research_id ON collected_records(research_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_collected_records_source_id ON collected_records(source_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
