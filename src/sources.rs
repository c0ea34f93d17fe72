use anyhow::Result;

use research_harness_core::store::Store;

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Print every registered data source.
pub async fn list_sources(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());
    let sources = store.list_sources().await?;

    if sources.is_empty() {
        println!("No data sources registered yet. Run `rh collect` first.");
        pool.close().await;
        return Ok(());
    }

    println!(
        "{:<24} {:<16} {:<10} {:<16} URL",
        "NAME", "TYPE", "STATUS", "CATEGORY"
    );
    for source in &sources {
        println!(
            "{:<24} {:<16} {:<10} {:<16} {}",
            source.name,
            source.source_type.as_str(),
            source.status.as_str(),
            source.category.as_deref().unwrap_or("-"),
            source.url.as_deref().unwrap_or("-"),
        );
    }

    pool.close().await;
    Ok(())
}
