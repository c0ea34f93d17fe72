//! Collection pipeline runs against scripted collaborators and the
//! in-memory store.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use research_harness::config::{CollectionConfig, SearchConfig};
use research_harness::error::{CollectError, ProviderError};
use research_harness::pipeline::{
    Collaborators, CollectionPipeline, PipelineState, StageFlags, StageStatus,
};
use research_harness::statistics::StatisticsEntry;
use research_harness::traits::{
    Fetcher, NewsParser, ParsedArticle, SearchProvider, SearchRequest, StatisticsApi,
    VerificationResult, Verifier,
};
use research_harness::verify::BasicVerifier;
use research_harness::web_search::WebSearchService;
use research_harness_core::models::{
    Category, CollectedRecord, DataFormat, DataSource, ResearchSubject, SearchResult, SourceType,
};
use research_harness_core::store::memory::InMemoryStore;
use research_harness_core::store::Store;

// ═══════════════════════════════════════════════════════════════════════
// Scripted collaborators
// ═══════════════════════════════════════════════════════════════════════

/// Answers competitor queries ("компании"), market data queries
/// ("статистика"), and news queries ("новости"); everything else is empty.
struct ScriptedProvider {
    competitors: usize,
    market: usize,
    news: usize,
}

fn hits(prefix: &str, n: usize) -> Vec<SearchResult> {
    (0..n)
        .map(|i| {
            SearchResult::new(
                format!("{prefix} {i}"),
                format!("https://{prefix}{i}.example/"),
                format!("{prefix} snippet {i}"),
                "scripted",
            )
        })
        .collect()
}

#[async_trait]
impl SearchProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, ProviderError> {
        if request.query.contains("компании") {
            Ok(hits("competitor", self.competitors))
        } else if request.query.contains("статистика") {
            Ok(hits("market", self.market))
        } else {
            Ok(Vec::new())
        }
    }

    async fn news(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, ProviderError> {
        if request.query.contains("новости") {
            Ok(hits("news", self.news))
        } else {
            Ok(Vec::new())
        }
    }
}

/// Fails every `fail_every`-th url (1-based); records the urls it saw.
struct ScriptedFetcher {
    fail_every: usize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    fn new(fail_every: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_every,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> usize {
        self.seen.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch_many(
        &self,
        urls: &[String],
        sources: &[DataSource],
    ) -> Vec<Option<CollectedRecord>> {
        self.seen.lock().unwrap().extend(urls.iter().cloned());
        urls.iter()
            .enumerate()
            .map(|(i, url)| {
                if (i + 1) % self.fail_every == 0 {
                    return None;
                }
                let mut record = CollectedRecord::new(DataFormat::Html)
                    .with_processed_content(format!("page body of {url}"));
                record.source_id = sources.get(i).map(|s| s.id.clone());
                record.source_url = Some(url.clone());
                record.title = Some(format!("Page {i}"));
                Some(record)
            })
            .collect()
    }
}

struct PanickingFetcher;

#[async_trait]
impl Fetcher for PanickingFetcher {
    async fn fetch_many(&self, _: &[String], _: &[DataSource]) -> Vec<Option<CollectedRecord>> {
        panic!("fetcher exploded")
    }
}

/// Every url parses; urls containing `news0` come back without content.
struct ScriptedNewsParser {
    seen: AtomicUsize,
}

#[async_trait]
impl NewsParser for ScriptedNewsParser {
    async fn parse_many(&self, urls: &[String]) -> Vec<Option<ParsedArticle>> {
        self.seen.fetch_add(urls.len(), Ordering::SeqCst);
        urls.iter()
            .map(|url| {
                Some(ParsedArticle {
                    url: url.clone(),
                    title: Some(format!("Article {url}")),
                    content: (!url.contains("news0")).then(|| format!("article text {url}")),
                    author: None,
                    published_date: None,
                    tags: Vec::new(),
                    summary: None,
                })
            })
            .collect()
    }
}

struct FixedStatistics(Option<Value>);

#[async_trait]
impl StatisticsApi for FixedStatistics {
    async fn fetch(&self, _indicator: &str, _region_code: &str) -> Option<Value> {
        self.0.clone()
    }
}

/// Fails every other record it is asked about, starting with the second.
struct FlakyVerifier {
    seen: AtomicUsize,
}

#[async_trait]
impl Verifier for FlakyVerifier {
    async fn verify(
        &self,
        record: &CollectedRecord,
        cross_validate: bool,
        fact_check: bool,
    ) -> Result<VerificationResult, CollectError> {
        assert!(cross_validate && fact_check);
        let n = self.seen.fetch_add(1, Ordering::SeqCst);
        if n % 2 == 1 {
            return Err(CollectError::verification(&record.id, "checker unavailable"));
        }
        Ok(VerificationResult {
            record_id: record.id.clone(),
            verified: true,
            confidence: 1.0,
            checks: Vec::new(),
        })
    }
}

/// Delegates to an in-memory store but rejects batches of one format.
struct RejectingStore {
    inner: InMemoryStore,
    reject: DataFormat,
}

#[async_trait]
impl Store for RejectingStore {
    async fn find_source_by_name(&self, name: &str) -> Result<Option<DataSource>> {
        self.inner.find_source_by_name(name).await
    }

    async fn insert_source(&self, source: &DataSource) -> Result<DataSource> {
        self.inner.insert_source(source).await
    }

    async fn list_sources(&self) -> Result<Vec<DataSource>> {
        self.inner.list_sources().await
    }

    async fn add_records(&self, records: &[CollectedRecord]) -> Result<()> {
        if records.iter().any(|r| r.format == self.reject) {
            bail!("disk full");
        }
        self.inner.add_records(records).await
    }

    async fn records_for_research(
        &self,
        research_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<CollectedRecord>> {
        self.inner.records_for_research(research_id, limit).await
    }

    async fn attach_verification(&self, record_id: &str, verification: &Value) -> Result<()> {
        self.inner.attach_verification(record_id, verification).await
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Fixture
// ═══════════════════════════════════════════════════════════════════════

struct Fixture {
    provider: ScriptedProvider,
    fetcher: Arc<dyn Fetcher>,
    news_parser: Arc<ScriptedNewsParser>,
    statistics: Vec<StatisticsEntry>,
    verifier: Option<Arc<dyn Verifier>>,
    limits: CollectionConfig,
    per_category_limit: usize,
}

impl Fixture {
    fn new() -> Self {
        Self {
            provider: ScriptedProvider {
                competitors: 3,
                market: 1,
                news: 2,
            },
            fetcher: ScriptedFetcher::new(3),
            news_parser: Arc::new(ScriptedNewsParser {
                seen: AtomicUsize::new(0),
            }),
            statistics: vec![
                StatisticsEntry::new(
                    "rosstat",
                    SourceType::GovernmentApi,
                    Category::Statistics,
                    "market_size",
                    Arc::new(FixedStatistics(Some(json!({"value": 1250, "unit": "bn RUB"})))),
                ),
                StatisticsEntry::new(
                    "hh-labor-market",
                    SourceType::GenericApi,
                    Category::LaborMarket,
                    "vacancies",
                    Arc::new(FixedStatistics(None)),
                ),
            ],
            verifier: None,
            limits: CollectionConfig::default(),
            per_category_limit: 10,
        }
    }

    fn build(self, store: Arc<dyn Store>) -> CollectionPipeline {
        let search_config = SearchConfig {
            rate_limit_ms: 0,
            ..SearchConfig::default()
        };
        let search = WebSearchService::new(Arc::new(self.provider), None, search_config);
        let collaborators = Collaborators {
            fetcher: self.fetcher,
            news_parser: self.news_parser,
            statistics: self.statistics,
            verifier: self.verifier.unwrap_or_else(|| {
                Arc::new(BasicVerifier::new(store.clone())) as Arc<dyn Verifier>
            }),
        };
        CollectionPipeline::new(
            store,
            search,
            collaborators,
            self.limits,
            self.per_category_limit,
        )
    }
}

fn subject() -> ResearchSubject {
    ResearchSubject::new("IT", "Moscow", "")
}

// ═══════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn search_and_scraping_statistics() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Fixture::new().build(store.clone());
    let research = subject();

    let flags = StageFlags {
        search: true,
        scraping: true,
        ..StageFlags::none()
    };
    let run = pipeline.collect_all_data(&research, flags).await;

    assert_eq!(run.research_id, research.id);
    assert_eq!(run.web_search_results.len(), 6);
    assert_eq!(run.statistics.total_sources, 6);
    assert_eq!(run.scraped_data.len(), 3);
    assert_eq!(run.statistics.successful_sources, 2);
    assert_eq!(run.statistics.failed_sources, 1);
    assert_eq!(run.statistics.verified_sources, 0);

    // 6 search records + 2 scraped pages.
    assert_eq!(store.record_count(), 8);
    let records = store.records_for_research(&research.id, None).await.unwrap();
    let scraped: Vec<_> = records
        .iter()
        .filter(|r| r.format == DataFormat::Html)
        .collect();
    assert_eq!(scraped.len(), 2);
    assert!(scraped
        .iter()
        .all(|r| r.category == Some(Category::Competitors) && r.research_id.is_some()));
}

#[tokio::test]
async fn search_results_are_tagged_in_category_order() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Fixture::new().build(store);

    let flags = StageFlags {
        search: true,
        ..StageFlags::none()
    };
    let run = pipeline.collect_all_data(&subject(), flags).await;
    let categories: Vec<_> = run
        .web_search_results
        .iter()
        .map(|r| r.category)
        .collect();
    assert_eq!(
        categories,
        vec![
            Some(Category::Competitors),
            Some(Category::Competitors),
            Some(Category::Competitors),
            Some(Category::News),
            Some(Category::News),
            Some(Category::MarketData),
        ]
    );
}

#[tokio::test]
async fn full_run_collects_every_stage() {
    let store = Arc::new(InMemoryStore::new());
    let mut fixture = Fixture::new();
    let news_parser = fixture.news_parser.clone();
    fixture.fetcher = ScriptedFetcher::new(usize::MAX);
    let pipeline = fixture.build(store.clone());
    let research = subject();

    let run = pipeline
        .collect_all_data(&research, StageFlags::default())
        .await;

    assert_eq!(run.statistics.total_sources, 6);
    // 3 pages + 1 article with content + 1 statistics payload.
    assert_eq!(run.statistics.successful_sources, 5);
    assert_eq!(run.statistics.failed_sources, 0);
    assert_eq!(run.news_articles.len(), 2);
    assert_eq!(news_parser.seen.load(Ordering::SeqCst), 2);
    assert_eq!(run.api_data.len(), 1);
    assert_eq!(run.api_data[0].format, DataFormat::Json);
    assert_eq!(run.api_data[0].category, Some(Category::Statistics));
    assert_eq!(
        run.api_data[0].title.as_deref(),
        Some("rosstat data for IT")
    );

    // 6 search + 3 scraped + 1 news + 1 api.
    assert_eq!(store.record_count(), 11);
    assert_eq!(run.statistics.verified_sources, 11);
    assert_eq!(run.verified_data.len(), 11);

    for report in &run.stage_reports {
        assert_eq!(report.status, StageStatus::Completed, "{:?}", report);
    }
    assert!(run.completed_at >= run.started_at);
    let elapsed = (run.completed_at - run.started_at).num_milliseconds() as f64 / 1000.0;
    assert_eq!(run.duration_seconds, elapsed);

    let records = store.records_for_research(&research.id, None).await.unwrap();
    assert!(records.iter().all(|r| r.metadata.get("verification").is_some()));
}

#[tokio::test]
async fn disabled_stages_produce_nothing() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Fixture::new().build(store.clone());

    let run = pipeline.collect_all_data(&subject(), StageFlags::none()).await;

    assert!(run.web_search_results.is_empty());
    assert!(run.scraped_data.is_empty());
    assert!(run.news_articles.is_empty());
    assert!(run.api_data.is_empty());
    assert!(run.verified_data.is_empty());
    assert_eq!(run.statistics.total_sources, 0);
    assert_eq!(store.record_count(), 0);
    assert_eq!(store.source_count(), 0);
    assert_eq!(run.stage_reports.len(), 5);
    assert!(run
        .stage_reports
        .iter()
        .all(|r| r.status == StageStatus::Skipped));
}

#[tokio::test]
async fn scraping_without_search_has_no_urls() {
    let store = Arc::new(InMemoryStore::new());
    let fetcher = ScriptedFetcher::new(usize::MAX);
    let mut fixture = Fixture::new();
    fixture.fetcher = fetcher.clone();
    let pipeline = fixture.build(store);

    let flags = StageFlags {
        scraping: true,
        ..StageFlags::none()
    };
    let run = pipeline.collect_all_data(&subject(), flags).await;
    assert!(run.scraped_data.is_empty());
    assert_eq!(fetcher.seen(), 0);
    assert_eq!(
        run.report(PipelineState::Scraping).map(|r| &r.status),
        Some(&StageStatus::Completed)
    );
}

#[tokio::test]
async fn scraping_is_capped_at_fifteen_urls() {
    let store = Arc::new(InMemoryStore::new());
    let fetcher = ScriptedFetcher::new(usize::MAX);
    let mut fixture = Fixture::new();
    fixture.provider.competitors = 30;
    fixture.per_category_limit = 40;
    fixture.fetcher = fetcher.clone();
    let pipeline = fixture.build(store);

    let flags = StageFlags {
        search: true,
        scraping: true,
        ..StageFlags::none()
    };
    let run = pipeline.collect_all_data(&subject(), flags).await;
    assert_eq!(fetcher.seen(), 15);
    assert_eq!(run.scraped_data.len(), 15);
    assert_eq!(run.statistics.successful_sources, 15);
}

#[tokio::test]
async fn raised_scrape_limit_is_still_capped() {
    let store = Arc::new(InMemoryStore::new());
    let fetcher = ScriptedFetcher::new(usize::MAX);
    let mut fixture = Fixture::new();
    fixture.provider.competitors = 30;
    fixture.per_category_limit = 40;
    fixture.fetcher = fetcher.clone();
    fixture.limits = CollectionConfig {
        max_scrape_urls: 100,
        ..CollectionConfig::default()
    };
    let pipeline = fixture.build(store);

    let flags = StageFlags {
        search: true,
        scraping: true,
        ..StageFlags::none()
    };
    pipeline.collect_all_data(&subject(), flags).await;
    assert_eq!(fetcher.seen(), 15);
}

#[tokio::test]
async fn news_is_capped_at_ten_urls() {
    let store = Arc::new(InMemoryStore::new());
    let mut fixture = Fixture::new();
    fixture.provider.news = 25;
    let news_parser = fixture.news_parser.clone();
    let pipeline = fixture.build(store);

    let flags = StageFlags {
        news: true,
        ..StageFlags::none()
    };
    let run = pipeline.collect_all_data(&subject(), flags).await;
    assert_eq!(news_parser.seen.load(Ordering::SeqCst), 10);
    assert_eq!(run.news_articles.len(), 10);
    // news0 has no content and is not persisted.
    assert_eq!(run.statistics.successful_sources, 9);
}

#[tokio::test]
async fn verification_caps_records_and_skips_failures() {
    let store = Arc::new(InMemoryStore::new());
    let research = subject();
    let records: Vec<_> = (0..60)
        .map(|i| {
            let mut r = CollectedRecord::new(DataFormat::Text)
                .with_processed_content(format!("record {i}"));
            r.research_id = Some(research.id.clone());
            r
        })
        .collect();
    store.add_records(&records).await.unwrap();

    let verifier = Arc::new(FlakyVerifier {
        seen: AtomicUsize::new(0),
    });
    let mut fixture = Fixture::new();
    fixture.verifier = Some(verifier.clone() as Arc<dyn Verifier>);
    let pipeline = fixture.build(store);

    let flags = StageFlags {
        verification: true,
        ..StageFlags::none()
    };
    let run = pipeline.collect_all_data(&research, flags).await;

    assert_eq!(verifier.seen.load(Ordering::SeqCst), 50);
    assert_eq!(run.statistics.verified_sources, 25);
    assert_eq!(run.verified_data.len(), 25);
    assert_eq!(run.verified_data[0].record_id, records[0].id);
    assert_eq!(
        run.report(PipelineState::Verifying).map(|r| &r.status),
        Some(&StageStatus::Completed)
    );
}

#[tokio::test]
async fn failing_stage_does_not_stop_later_stages() {
    let store: Arc<dyn Store> = Arc::new(RejectingStore {
        inner: InMemoryStore::new(),
        reject: DataFormat::Html,
    });
    let mut fixture = Fixture::new();
    fixture.fetcher = ScriptedFetcher::new(usize::MAX);
    let pipeline = fixture.build(store.clone());
    let research = subject();

    let flags = StageFlags {
        verification: false,
        ..StageFlags::default()
    };
    let run = pipeline.collect_all_data(&research, flags).await;

    let scraping = run.report(PipelineState::Scraping).unwrap();
    assert!(matches!(scraping.status, StageStatus::Failed(ref e) if e.contains("disk full")));
    assert!(run.scraped_data.is_empty());
    assert_eq!(run.statistics.failed_sources, 0);

    assert_eq!(run.statistics.total_sources, 6);
    // 1 news article + 1 statistics payload; scraping contributed nothing.
    assert_eq!(run.statistics.successful_sources, 2);
    assert_eq!(
        run.report(PipelineState::ApiFetching).map(|r| &r.status),
        Some(&StageStatus::Completed)
    );

    let records = store.records_for_research(&research.id, None).await.unwrap();
    assert!(records.iter().all(|r| r.format != DataFormat::Html));
}

#[tokio::test]
async fn panicking_collaborator_is_contained() {
    let store = Arc::new(InMemoryStore::new());
    let mut fixture = Fixture::new();
    fixture.fetcher = Arc::new(PanickingFetcher);
    let pipeline = fixture.build(store);

    let run = pipeline
        .collect_all_data(&subject(), StageFlags::default())
        .await;

    let scraping = run.report(PipelineState::Scraping).unwrap();
    assert!(
        matches!(scraping.status, StageStatus::Failed(ref e) if e.contains("fetcher exploded")),
        "{:?}",
        scraping.status
    );
    assert_eq!(
        run.report(PipelineState::Verifying).map(|r| &r.status),
        Some(&StageStatus::Completed)
    );
    assert!(run.statistics.verified_sources > 0);
}

#[tokio::test]
async fn repeated_runs_reuse_sources() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Fixture::new().build(store.clone());

    pipeline
        .collect_all_data(&subject(), StageFlags::default())
        .await;
    let after_first = store.source_count();
    pipeline
        .collect_all_data(&subject(), StageFlags::default())
        .await;

    // web-search, competitor-scraping, news-aggregator, and both statistics sources.
    assert_eq!(after_first, 5);
    assert_eq!(store.source_count(), after_first);
}

#[tokio::test]
async fn concurrent_runs_share_one_source_per_name() {
    let store = Arc::new(InMemoryStore::new());
    let pipeline = Arc::new(Fixture::new().build(store.clone()));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            pipeline
                .collect_all_data(&subject(), StageFlags::default())
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let sources = store.list_sources().await.unwrap();
    let mut names: Vec<_> = sources.iter().map(|s| s.name.as_str()).collect();
    names.dedup();
    assert_eq!(names.len(), sources.len());
    assert_eq!(sources.len(), 5);
}

#[tokio::test]
async fn digest_and_summary_after_run() {
    let store = Arc::new(InMemoryStore::new());
    let mut fixture = Fixture::new();
    fixture.fetcher = ScriptedFetcher::new(usize::MAX);
    let pipeline = fixture.build(store);
    let research = subject();

    let flags = StageFlags {
        search: true,
        api: true,
        ..StageFlags::none()
    };
    pipeline.collect_all_data(&research, flags).await;

    let digest = pipeline.format_for_consumption(&research.id).await.unwrap();
    assert!(digest.starts_with("# Collected Real Data"));
    let competitors = digest.find("## Competitors").unwrap();
    let news = digest.find("## News").unwrap();
    let market = digest.find("## Market data").unwrap();
    let statistics = digest.find("## Statistics").unwrap();
    assert!(competitors < news && news < market && market < statistics);
    assert!(digest.contains("### Source 1: competitor 0"));
    assert!(digest.contains("URL: https://competitor0.example/"));

    let summary = pipeline.get_summary(&research.id).await.unwrap();
    assert_eq!(summary.total_items, 7);
    assert_eq!(summary.by_format.get("text"), Some(&6));
    assert_eq!(summary.by_format.get("json"), Some(&1));
    assert!(summary.oldest_date.is_some());

    let empty = pipeline.get_summary("nobody").await.unwrap();
    assert_eq!(empty.total_items, 0);
}
