//! Write-side commands: ad-hoc search and full collection runs.
//!
//! `rh search` talks to the providers only and never touches the database.
//! `rh collect` runs every enabled pipeline stage against the configured
//! SQLite store and prints the run statistics.

use anyhow::Result;
use std::sync::Arc;

use research_harness_core::models::ResearchSubject;

use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::pipeline::{CollectionPipeline, PipelineRunResult, StageFlags, StageStatus};
use crate::sqlite_store::SqliteStore;
use crate::web_search::WebSearchService;

/// Run one query through the search service and print the hits.
pub async fn run_search(config: &Config, query: &str, limit: usize, news: bool) -> Result<()> {
    let service = WebSearchService::from_config(&config.search)?;

    let results = if news {
        service.search_news(query, limit).await?
    } else {
        service
            .search_with_fallback(query, limit, config.search.prefer_secondary)
            .await
    };

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        let title = if result.title.is_empty() {
            "No title"
        } else {
            result.title.as_str()
        };
        println!("{}. {} [{}]", i + 1, title, result.provider);
        if !result.url.is_empty() {
            println!("   {}", result.url);
        }
        if let Some(ref date) = result.date {
            println!("   {}", date);
        }
        if !result.snippet.is_empty() {
            println!("   {}", result.snippet);
        }
        println!();
    }
    Ok(())
}

/// Run a full collection and print (or emit as JSON) the run result.
pub async fn run_collect(
    config: &Config,
    subject: ResearchSubject,
    flags: StageFlags,
    json: bool,
) -> Result<()> {
    let pool = db::connect(config).await?;
    // Idempotent, so a fresh database does not need `rh init` first.
    migrate::apply(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool.clone()));
    let pipeline = CollectionPipeline::from_config(config, store)?;

    let run = pipeline.collect_all_data(&subject, flags).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print_run(&subject, &run);
    }

    pool.close().await;
    Ok(())
}

fn print_run(subject: &ResearchSubject, run: &PipelineRunResult) {
    println!("Research Harness — Collection Run");
    println!("=================================");
    println!();
    println!("  Research:    {}", run.research_id);
    println!("  Subject:     {} / {}", subject.industry, subject.region);
    println!("  Duration:    {:.1}s", run.duration_seconds);
    println!();
    println!("  Total:       {}", run.statistics.total_sources);
    println!("  Successful:  {}", run.statistics.successful_sources);
    println!("  Failed:      {}", run.statistics.failed_sources);
    println!("  Verified:    {}", run.statistics.verified_sources);
    println!();
    println!("  {:<16} {:<10} {:>6}   ERROR", "STAGE", "STATUS", "ITEMS");
    println!("  {}", "-".repeat(48));
    for report in &run.stage_reports {
        let (status, error) = match &report.status {
            StageStatus::Completed => ("completed", ""),
            StageStatus::Skipped => ("skipped", ""),
            StageStatus::Failed(err) => ("failed", err.as_str()),
        };
        println!(
            "  {:<16} {:<10} {:>6}   {}",
            report.stage.as_str(),
            status,
            report.items,
            error
        );
    }
    println!();
    println!("Digest: rh digest {}", run.research_id);
}
