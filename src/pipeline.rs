//! Collection pipeline orchestration.
//!
//! Runs the stages of one collection for a research subject, strictly in
//! this order:
//!
//! ```text
//! Idle → Searching → Scraping → NewsCollecting → ApiFetching → Verifying → Completed
//! ```
//!
//! Every stage can be switched off with [`StageFlags`]; a skipped stage
//! contributes nothing and the machine moves on. A failing stage (store
//! error, registry error, panic) loses only its own output: the failure is
//! logged, recorded in the stage's [`StageReport`], and the next stage runs.
//! [`CollectionPipeline::collect_all_data`] therefore always returns a
//! [`PipelineRunResult`].
//!
//! Each stage writes its records with one [`Store::add_records`] call at the
//! end, so a stage never observes another stage's partial writes.
//!
//! # Statistics
//!
//! | Stage          | Counter effect                                          |
//! |----------------|---------------------------------------------------------|
//! | Searching      | `total_sources += results`                              |
//! | Scraping       | `successful_sources += fetched`, `failed_sources += null` |
//! | NewsCollecting | `successful_sources += persisted articles`              |
//! | ApiFetching    | `successful_sources += persisted responses`             |
//! | Verifying      | `verified_sources = verification results`               |
//!
//! A statistics source that returns no data counts neither as success nor
//! as failure.

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use serde_json::json;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use research_harness_core::digest;
use research_harness_core::models::{
    Category, CollectedRecord, DataFormat, ResearchSubject, SearchResult, SourceType,
};
use research_harness_core::store::Store;
use research_harness_core::summary::{self, CollectionSummary};

use crate::config::{
    CollectionConfig, Config, MAX_NEWS_URLS, MAX_SCRAPE_URLS, MAX_VERIFY_RECORDS,
};
use crate::error::CollectError;
use crate::fetch::{HttpFetcher, HttpNewsParser};
use crate::registry::{SourceRegistry, NEWS_SOURCE, SCRAPING_SOURCE, WEB_SEARCH_SOURCE};
use crate::statistics::{build_catalogue, is_empty_payload, StatisticsEntry};
use crate::traits::{Fetcher, NewsParser, ParsedArticle, VerificationResult, Verifier};
use crate::verify::BasicVerifier;
use crate::web_search::{normalize_to_records, WebSearchService};

// ═══════════════════════════════════════════════════════════════════════
// Run configuration and state
// ═══════════════════════════════════════════════════════════════════════

/// Per-run stage switches. All stages are on by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageFlags {
    pub search: bool,
    pub scraping: bool,
    pub news: bool,
    pub api: bool,
    pub verification: bool,
}

impl Default for StageFlags {
    fn default() -> Self {
        Self {
            search: true,
            scraping: true,
            news: true,
            api: true,
            verification: true,
        }
    }
}

impl StageFlags {
    /// Every stage off; combine with struct update syntax to pick stages.
    pub fn none() -> Self {
        Self {
            search: false,
            scraping: false,
            news: false,
            api: false,
            verification: false,
        }
    }

    pub fn is_enabled(&self, state: PipelineState) -> bool {
        match state {
            PipelineState::Searching => self.search,
            PipelineState::Scraping => self.scraping,
            PipelineState::NewsCollecting => self.news,
            PipelineState::ApiFetching => self.api,
            PipelineState::Verifying => self.verification,
            PipelineState::Idle | PipelineState::Completed => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Searching,
    Scraping,
    NewsCollecting,
    ApiFetching,
    Verifying,
    Completed,
}

impl PipelineState {
    /// The following state; `Completed` is terminal.
    pub fn next(self) -> Self {
        match self {
            PipelineState::Idle => PipelineState::Searching,
            PipelineState::Searching => PipelineState::Scraping,
            PipelineState::Scraping => PipelineState::NewsCollecting,
            PipelineState::NewsCollecting => PipelineState::ApiFetching,
            PipelineState::ApiFetching => PipelineState::Verifying,
            PipelineState::Verifying | PipelineState::Completed => PipelineState::Completed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Searching => "searching",
            PipelineState::Scraping => "scraping",
            PipelineState::NewsCollecting => "news_collecting",
            PipelineState::ApiFetching => "api_fetching",
            PipelineState::Verifying => "verifying",
            PipelineState::Completed => "completed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "error")]
pub enum StageStatus {
    Completed,
    Skipped,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: PipelineState,
    #[serde(flatten)]
    pub status: StageStatus,
    /// Items the stage produced (results, records, or verifications).
    pub items: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStatistics {
    pub total_sources: usize,
    pub successful_sources: usize,
    pub failed_sources: usize,
    pub verified_sources: usize,
}

/// Everything one invocation produced. Not persisted.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRunResult {
    pub research_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub web_search_results: Vec<SearchResult>,
    pub scraped_data: Vec<Option<CollectedRecord>>,
    pub news_articles: Vec<Option<ParsedArticle>>,
    pub api_data: Vec<CollectedRecord>,
    pub verified_data: Vec<VerificationResult>,
    pub statistics: RunStatistics,
    pub stage_reports: Vec<StageReport>,
}

impl PipelineRunResult {
    fn new(research_id: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            research_id: research_id.to_string(),
            started_at,
            completed_at: started_at,
            duration_seconds: 0.0,
            web_search_results: Vec::new(),
            scraped_data: Vec::new(),
            news_articles: Vec::new(),
            api_data: Vec::new(),
            verified_data: Vec::new(),
            statistics: RunStatistics::default(),
            stage_reports: Vec::new(),
        }
    }

    pub fn report(&self, stage: PipelineState) -> Option<&StageReport> {
        self.stage_reports.iter().find(|r| r.stage == stage)
    }
}

/// Output of the news stage: every parse slot, plus how many became records.
struct NewsOutcome {
    parsed: Vec<Option<ParsedArticle>>,
    persisted: usize,
}

// ═══════════════════════════════════════════════════════════════════════
// Pipeline
// ═══════════════════════════════════════════════════════════════════════

/// External collaborators used by the later stages.
pub struct Collaborators {
    pub fetcher: Arc<dyn Fetcher>,
    pub news_parser: Arc<dyn NewsParser>,
    pub statistics: Vec<StatisticsEntry>,
    pub verifier: Arc<dyn Verifier>,
}

pub struct CollectionPipeline {
    store: Arc<dyn Store>,
    search: WebSearchService,
    registry: SourceRegistry,
    collaborators: Collaborators,
    limits: CollectionConfig,
    per_category_limit: usize,
}

impl CollectionPipeline {
    pub fn new(
        store: Arc<dyn Store>,
        search: WebSearchService,
        collaborators: Collaborators,
        limits: CollectionConfig,
        per_category_limit: usize,
    ) -> Self {
        Self {
            registry: SourceRegistry::new(store.clone()),
            store,
            search,
            collaborators,
            limits,
            per_category_limit,
        }
    }

    /// Wire the HTTP collaborators and search providers from config.
    pub fn from_config(config: &Config, store: Arc<dyn Store>) -> anyhow::Result<Self> {
        let fetch_timeout = std::time::Duration::from_secs(config.collection.fetch_timeout_secs);
        let concurrency = config.collection.fetch_concurrency;

        let collaborators = Collaborators {
            fetcher: Arc::new(HttpFetcher::new(fetch_timeout, concurrency)?),
            news_parser: Arc::new(HttpNewsParser::new(fetch_timeout, concurrency)?),
            statistics: build_catalogue(&config.statistics, fetch_timeout)?,
            verifier: Arc::new(BasicVerifier::new(store.clone())),
        };

        Ok(Self::new(
            store,
            WebSearchService::from_config(&config.search)?,
            collaborators,
            config.collection.clone(),
            config.search.per_category_limit,
        ))
    }

    /// Run every enabled stage for `research`. Never fails; stage failures
    /// show up in [`PipelineRunResult::stage_reports`].
    pub async fn collect_all_data(
        &self,
        research: &ResearchSubject,
        flags: StageFlags,
    ) -> PipelineRunResult {
        let mut run = PipelineRunResult::new(&research.id, Utc::now());

        tracing::info!(research_id = %research.id, industry = %research.industry, region = %research.region, "starting data collection");

        let mut state = PipelineState::Idle.next();
        while state != PipelineState::Completed {
            if !flags.is_enabled(state) {
                tracing::debug!(stage = %state, "stage disabled; skipping");
                run.stage_reports.push(StageReport {
                    stage: state,
                    status: StageStatus::Skipped,
                    items: 0,
                });
                state = state.next();
                continue;
            }

            tracing::info!(stage = %state, "stage started");
            let outcome = match state {
                PipelineState::Searching => guarded(self.run_search(research)).await.map(|results| {
                    run.statistics.total_sources += results.len();
                    run.web_search_results = results;
                    run.web_search_results.len()
                }),
                PipelineState::Scraping => {
                    let scraped = guarded(self.run_scraping(research, &run.web_search_results)).await;
                    scraped.map(|scraped| {
                        let ok = scraped.iter().filter(|r| r.is_some()).count();
                        run.statistics.successful_sources += ok;
                        run.statistics.failed_sources += scraped.len() - ok;
                        run.scraped_data = scraped;
                        ok
                    })
                }
                PipelineState::NewsCollecting => guarded(self.run_news(research)).await.map(|news| {
                    run.statistics.successful_sources += news.persisted;
                    run.news_articles = news.parsed;
                    news.persisted
                }),
                PipelineState::ApiFetching => guarded(self.run_api(research)).await.map(|records| {
                    run.statistics.successful_sources += records.len();
                    run.api_data = records;
                    run.api_data.len()
                }),
                PipelineState::Verifying => guarded(self.run_verification(research)).await.map(|verified| {
                    run.statistics.verified_sources = verified.len();
                    run.verified_data = verified;
                    run.verified_data.len()
                }),
                PipelineState::Idle | PipelineState::Completed => Ok(0),
            };

            let report = match outcome {
                Ok(items) => {
                    tracing::info!(stage = %state, items, "stage completed");
                    StageReport {
                        stage: state,
                        status: StageStatus::Completed,
                        items,
                    }
                }
                Err(err) => {
                    tracing::warn!(stage = %state, error = %err, "stage failed; continuing with empty output");
                    StageReport {
                        stage: state,
                        status: StageStatus::Failed(err.to_string()),
                        items: 0,
                    }
                }
            };
            run.stage_reports.push(report);
            state = state.next();
        }

        run.completed_at = Utc::now();
        run.duration_seconds =
            (run.completed_at - run.started_at).num_milliseconds() as f64 / 1000.0;

        let stats = run.statistics;
        tracing::info!(
            research_id = %research.id,
            duration_seconds = run.duration_seconds,
            total = stats.total_sources,
            successful = stats.successful_sources,
            failed = stats.failed_sources,
            verified = stats.verified_sources,
            "data collection finished"
        );
        run
    }

    async fn run_search(&self, research: &ResearchSubject) -> Result<Vec<SearchResult>, CollectError> {
        let categorized = self
            .search
            .comprehensive_search(
                &research.industry,
                &research.region,
                &research.product_description,
                self.per_category_limit,
            )
            .await;
        let tagged = categorized.into_tagged();

        let source = self
            .registry
            .resolve(
                WEB_SEARCH_SOURCE,
                SourceType::WebSearch,
                Some("https://duckduckgo.com"),
                Some("web_search"),
            )
            .await
            .map_err(CollectError::persistence)?;

        let records = normalize_to_records(&tagged, Some(&source), Some(&research.id));
        self.store
            .add_records(&records)
            .await
            .map_err(CollectError::persistence)?;
        Ok(tagged)
    }

    async fn run_scraping(
        &self,
        research: &ResearchSubject,
        search_results: &[SearchResult],
    ) -> Result<Vec<Option<CollectedRecord>>, CollectError> {
        let urls: Vec<String> = search_results
            .iter()
            .filter(|r| r.category == Some(Category::Competitors) && !r.url.is_empty())
            .map(|r| r.url.clone())
            .take(self.limits.max_scrape_urls.min(MAX_SCRAPE_URLS))
            .collect();
        if urls.is_empty() {
            tracing::debug!("no competitor urls to scrape");
            return Ok(Vec::new());
        }

        let source = self
            .registry
            .resolve(
                SCRAPING_SOURCE,
                SourceType::Scraping,
                None,
                Some(Category::Competitors.as_str()),
            )
            .await
            .map_err(CollectError::persistence)?;

        let sources = vec![source.clone(); urls.len()];
        let mut scraped = self.collaborators.fetcher.fetch_many(&urls, &sources).await;

        for record in scraped.iter_mut().flatten() {
            record.research_id = Some(research.id.clone());
            record.source_id.get_or_insert_with(|| source.id.clone());
            record.category.get_or_insert(Category::Competitors);
        }

        let records: Vec<CollectedRecord> = scraped.iter().flatten().cloned().collect();
        self.store
            .add_records(&records)
            .await
            .map_err(CollectError::persistence)?;
        Ok(scraped)
    }

    async fn run_news(&self, research: &ResearchSubject) -> Result<NewsOutcome, CollectError> {
        let news = self
            .search
            .search_industry_news(
                &research.industry,
                &research.region,
                self.limits.news_search_limit,
            )
            .await;
        if news.is_empty() {
            return Ok(NewsOutcome {
                parsed: Vec::new(),
                persisted: 0,
            });
        }

        let source = self
            .registry
            .resolve(NEWS_SOURCE, SourceType::News, None, Some(Category::News.as_str()))
            .await
            .map_err(CollectError::persistence)?;

        let urls: Vec<String> = news
            .iter()
            .filter(|r| !r.url.is_empty())
            .map(|r| r.url.clone())
            .take(self.limits.max_news_urls.min(MAX_NEWS_URLS))
            .collect();
        let parsed = self.collaborators.news_parser.parse_many(&urls).await;

        let records: Vec<CollectedRecord> = parsed
            .iter()
            .flatten()
            .filter(|a| a.content.as_deref().is_some_and(|c| !c.trim().is_empty()))
            .map(|article| article_record(article, &source.id, &research.id))
            .collect();

        self.store
            .add_records(&records)
            .await
            .map_err(CollectError::persistence)?;
        Ok(NewsOutcome {
            parsed,
            persisted: records.len(),
        })
    }

    async fn run_api(&self, research: &ResearchSubject) -> Result<Vec<CollectedRecord>, CollectError> {
        let mut records = Vec::new();

        for entry in &self.collaborators.statistics {
            let source = self
                .registry
                .resolve(
                    &entry.name,
                    entry.kind,
                    entry.endpoint.as_deref(),
                    Some(entry.category.as_str()),
                )
                .await
                .map_err(CollectError::persistence)?;

            let data = match entry.api.fetch(&entry.indicator, &research.region).await {
                Some(data) if !is_empty_payload(&data) => data,
                _ => {
                    tracing::debug!(source = %entry.name, "statistics source returned no data");
                    continue;
                }
            };

            let content = serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string());
            let mut record = CollectedRecord::new(DataFormat::Json).with_processed_content(content);
            record.source_id = Some(source.id.clone());
            record.research_id = Some(research.id.clone());
            record.title = Some(format!("{} data for {}", entry.name, research.industry));
            record.raw_content = Some(data.to_string());
            record.source_url = entry.endpoint.clone();
            record.category = Some(entry.category);
            record.metadata = json!({
                "indicator": entry.indicator,
                "api_response": data,
            });
            records.push(record);
        }

        self.store
            .add_records(&records)
            .await
            .map_err(CollectError::persistence)?;
        Ok(records)
    }

    async fn run_verification(
        &self,
        research: &ResearchSubject,
    ) -> Result<Vec<VerificationResult>, CollectError> {
        let cap = self.limits.max_verify_records.min(MAX_VERIFY_RECORDS);
        let records = self
            .store
            .records_for_research(&research.id, Some(cap))
            .await
            .map_err(CollectError::persistence)?;

        let mut verified = Vec::new();
        for record in &records {
            match self.collaborators.verifier.verify(record, true, true).await {
                Ok(result) => verified.push(result),
                Err(err) => {
                    tracing::warn!(record_id = %record.id, error = %err, "verification failed; skipping record");
                }
            }
        }
        Ok(verified)
    }

    /// Counts over everything persisted for `research_id`.
    pub async fn get_summary(&self, research_id: &str) -> anyhow::Result<CollectionSummary> {
        summary::get_summary(self.store.as_ref(), research_id).await
    }

    /// The size-bounded digest of everything persisted for `research_id`.
    pub async fn format_for_consumption(&self, research_id: &str) -> anyhow::Result<String> {
        digest::format_for_consumption(self.store.as_ref(), research_id).await
    }
}

/// Run a stage future, turning a panic into [`CollectError::Aborted`].
async fn guarded<T, F>(stage: F) -> Result<T, CollectError>
where
    F: Future<Output = Result<T, CollectError>>,
{
    match AssertUnwindSafe(stage).catch_unwind().await {
        Ok(result) => result,
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            Err(CollectError::Aborted(message))
        }
    }
}

fn article_record(article: &ParsedArticle, source_id: &str, research_id: &str) -> CollectedRecord {
    let content = article.content.clone().unwrap_or_default();
    let mut record = CollectedRecord::new(DataFormat::Text).with_processed_content(content);
    record.source_id = Some(source_id.to_string());
    record.research_id = Some(research_id.to_string());
    record.title = Some(article.title.clone().unwrap_or_else(|| "No title".to_string()));
    record.raw_content = serde_json::to_string(article).ok();
    record.source_url = Some(article.url.clone());
    record.category = Some(Category::News);
    record.metadata = json!({
        "author": article.author,
        "published_date": article.published_date,
        "tags": article.tags,
        "summary": article.summary,
    });
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_advance_linearly() {
        let mut state = PipelineState::Idle;
        let mut seen = vec![state];
        while state != PipelineState::Completed {
            state = state.next();
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                PipelineState::Idle,
                PipelineState::Searching,
                PipelineState::Scraping,
                PipelineState::NewsCollecting,
                PipelineState::ApiFetching,
                PipelineState::Verifying,
                PipelineState::Completed,
            ]
        );
        assert_eq!(PipelineState::Completed.next(), PipelineState::Completed);
    }

    #[test]
    fn flags_default_to_all_enabled() {
        let flags = StageFlags::default();
        assert!(flags.is_enabled(PipelineState::Searching));
        assert!(flags.is_enabled(PipelineState::Verifying));

        let only_search = StageFlags {
            search: true,
            ..StageFlags::none()
        };
        assert!(only_search.is_enabled(PipelineState::Searching));
        assert!(!only_search.is_enabled(PipelineState::Scraping));
    }

    #[test]
    fn article_record_keeps_metadata() {
        let article = ParsedArticle {
            url: "https://news.example/1".into(),
            title: None,
            content: Some("Текст статьи".into()),
            author: Some("Автор".into()),
            published_date: Some("2024-01-01".into()),
            tags: vec!["IT".into()],
            summary: None,
        };
        let record = article_record(&article, "src", "r1");
        assert_eq!(record.title.as_deref(), Some("No title"));
        assert_eq!(record.category, Some(Category::News));
        assert_eq!(record.size_bytes, "Текст статьи".len() as u64);
        assert_eq!(record.metadata["author"], "Автор");
        assert_eq!(record.metadata["tags"][0], "IT");
    }

    #[tokio::test]
    async fn guarded_converts_panics() {
        let stage = async {
            let boom: Option<()> = None;
            boom.expect("boom");
            Ok::<(), CollectError>(())
        };
        let result = guarded(stage).await;
        assert!(matches!(result, Err(CollectError::Aborted(ref m)) if m == "boom"));
    }

    #[test]
    fn stage_report_serializes_flat() {
        let report = StageReport {
            stage: PipelineState::Scraping,
            status: StageStatus::Failed("disk full".into()),
            items: 0,
        };
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["stage"], "scraping");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["error"], "disk full");
    }
}
