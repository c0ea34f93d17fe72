//! Read-side commands: the digest and the summary of a research subject.
//!
//! Used by `rh digest` and `rh summary`. Both only read the store, so they
//! are safe to run while a collection is in progress.

use anyhow::Result;

use research_harness_core::digest;
use research_harness_core::summary::{self, CollectionSummary};

use crate::config::Config;
use crate::db;
use crate::sqlite_store::SqliteStore;

/// Print the Markdown digest for `research_id`.
pub async fn run_digest(config: &Config, research_id: &str) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let text = digest::format_for_consumption(&store, research_id).await?;
    println!("{}", text);

    pool.close().await;
    Ok(())
}

/// Print the collection summary for `research_id`, as a table or as JSON.
pub async fn run_summary(config: &Config, research_id: &str, json: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let summary = summary::get_summary(&store, research_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(research_id, &summary);
    }

    pool.close().await;
    Ok(())
}

fn print_summary(research_id: &str, summary: &CollectionSummary) {
    println!("Research Harness — Collection Summary");
    println!("=====================================");
    println!();
    println!("  Research:    {}", research_id);
    println!("  Records:     {}", summary.total_items);
    println!("  Size:        {}", format_bytes(summary.total_size_bytes));
    println!(
        "  Collected:   {} .. {}",
        format_date(summary.oldest_date),
        format_date(summary.newest_date)
    );

    if !summary.by_format.is_empty() {
        println!();
        println!("  By format:");
        for (format, count) in &summary.by_format {
            println!("  {:<24} {:>6}", format, count);
        }
    }

    if !summary.by_source.is_empty() {
        println!();
        println!("  By source:");
        println!("  {:<40} {:>6}", "SOURCE", "RECORDS");
        println!("  {}", "-".repeat(47));
        for (source, count) in &summary.by_source {
            println!("  {:<40} {:>6}", source, count);
        }
    }
    println!();
}

fn format_date(date: Option<chrono::DateTime<chrono::Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}
