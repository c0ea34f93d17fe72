//! Multi-provider web search with fallback, rate limiting, and URL dedup.
//!
//! # Providers
//!
//! | Role      | Default            | Availability                     |
//! |-----------|--------------------|----------------------------------|
//! | primary   | DuckDuckGo (free)  | always                           |
//! | secondary | SerpAPI (paid)     | only when a credential is set    |
//!
//! Every provider call goes through the shared [`RateLimiter`] and is
//! bounded by the configured per-call timeout. Provider failures never reach
//! callers of the category searches: a failed call contributes nothing and
//! is logged at `warn`.
//!
//! # Category searches
//!
//! Each category fans out into a fixed set of templated queries, runs them
//! in order, concatenates the hits, drops repeated URLs (first one wins),
//! and truncates to the requested size:
//!
//! ```text
//! templates ─▶ query 1 ─▶ fallback ─┐
//!              query 2 ─▶ fallback ─┼─▶ concat ─▶ dedup ─▶ truncate
//!              query N ─▶ fallback ─┘
//! ```
//!
//! [`WebSearchService::comprehensive_search`] runs the three categories
//! concurrently; a category that fails degrades to an empty list.

use futures::FutureExt;
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use url::Url;

use research_harness_core::models::{
    Category, CollectedRecord, DataFormat, DataSource, SearchResult,
};

use crate::config::SearchConfig;
use crate::error::ProviderError;
use crate::provider_duckduckgo::DuckDuckGoProvider;
use crate::provider_serpapi::SerpApiProvider;
use crate::rate_limit::RateLimiter;
use crate::traits::{Safety, SearchProvider, SearchRequest};

/// Upper bound on keywords taken from a product description.
pub const MAX_KEYWORDS: usize = 10;

/// Search results of one research subject, split by category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CategorizedResults {
    pub competitors: Vec<SearchResult>,
    pub news: Vec<SearchResult>,
    pub market_data: Vec<SearchResult>,
}

impl CategorizedResults {
    pub fn total(&self) -> usize {
        self.competitors.len() + self.news.len() + self.market_data.len()
    }

    /// Flatten all categories into one list, stamping each result with its
    /// category. Order: competitors, news, market data.
    pub fn into_tagged(self) -> Vec<SearchResult> {
        let tag = |results: Vec<SearchResult>, category: Category| {
            results.into_iter().map(move |r| r.with_category(category))
        };
        tag(self.competitors, Category::Competitors)
            .chain(tag(self.news, Category::News))
            .chain(tag(self.market_data, Category::MarketData))
            .collect()
    }
}

pub struct WebSearchService {
    primary: Arc<dyn SearchProvider>,
    secondary: Option<Arc<dyn SearchProvider>>,
    limiter: Arc<RateLimiter>,
    config: SearchConfig,
}

impl WebSearchService {
    pub fn new(
        primary: Arc<dyn SearchProvider>,
        secondary: Option<Arc<dyn SearchProvider>>,
        config: SearchConfig,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit()));
        Self {
            primary,
            secondary,
            limiter,
            config,
        }
    }

    /// Build the default provider set: DuckDuckGo, plus SerpAPI when a key
    /// is available.
    pub fn from_config(config: &SearchConfig) -> anyhow::Result<Self> {
        let primary: Arc<dyn SearchProvider> = Arc::new(DuckDuckGoProvider::new(config.timeout())?);
        let secondary = match config.resolve_serpapi_key() {
            Some(key) => {
                let provider: Arc<dyn SearchProvider> =
                    Arc::new(SerpApiProvider::new(key, config.timeout())?);
                Some(provider)
            }
            None => {
                tracing::info!("SerpAPI key not configured; secondary search provider disabled");
                None
            }
        };
        Ok(Self::new(primary, secondary, config.clone()))
    }

    pub fn has_secondary(&self) -> bool {
        self.secondary.is_some()
    }

    fn base_request(&self, query: &str, max_results: usize) -> SearchRequest {
        SearchRequest {
            query: query.to_string(),
            max_results,
            region: self.config.region.clone(),
            safety: self.config.safe_search,
            engine: self.config.engine.clone(),
            country: self.config.country.clone(),
            language: self.config.language.clone(),
        }
    }

    /// One rate-limited, time-bounded provider call.
    async fn call(
        &self,
        provider: &dyn SearchProvider,
        request: &SearchRequest,
        news: bool,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        self.limiter.acquire().await;

        let timeout = self.config.timeout();
        let call = if news {
            provider.news(request)
        } else {
            provider.search(request)
        };
        let outcome = match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(timeout)),
        };

        match &outcome {
            Ok(results) => tracing::debug!(
                provider = provider.name(),
                query = %request.query,
                count = results.len(),
                "provider call finished"
            ),
            Err(err) => tracing::warn!(
                provider = provider.name(),
                query = %request.query,
                error = %err,
                "provider call failed"
            ),
        }
        outcome
    }

    /// Search the free provider.
    pub async fn search_primary(
        &self,
        query: &str,
        max_results: usize,
        region: &str,
        safety: Safety,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let mut request = self.base_request(query, max_results);
        request.region = region.to_string();
        request.safety = safety;
        self.call(self.primary.as_ref(), &request, false).await
    }

    /// Search the paid provider. Without a credential this returns an empty
    /// list and makes no call.
    pub async fn search_secondary(
        &self,
        query: &str,
        max_results: usize,
        engine: &str,
        country: &str,
        language: &str,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let Some(secondary) = self.secondary.as_deref() else {
            tracing::debug!("secondary provider unavailable; skipping");
            return Ok(Vec::new());
        };
        let mut request = self.base_request(query, max_results);
        request.engine = engine.to_string();
        request.country = country.to_string();
        request.language = language.to_string();
        self.call(secondary, &request, false).await
    }

    /// News search through the primary provider.
    pub async fn search_news(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, ProviderError> {
        let request = self.base_request(query, max_results);
        self.call(self.primary.as_ref(), &request, true).await
    }

    /// Try the preferred provider, then the other one if the first yielded
    /// nothing. At most two calls; errors count as "nothing".
    pub async fn search_with_fallback(
        &self,
        query: &str,
        max_results: usize,
        prefer_secondary: bool,
    ) -> Vec<SearchResult> {
        let config = &self.config;
        let primary = || self.search_primary(query, max_results, &config.region, config.safe_search);
        let secondary = || {
            self.search_secondary(
                query,
                max_results,
                &config.engine,
                &config.country,
                &config.language,
            )
        };

        if prefer_secondary && self.has_secondary() {
            let results = secondary().await.unwrap_or_default();
            if !results.is_empty() {
                return results;
            }
            return primary().await.unwrap_or_default();
        }

        let results = primary().await.unwrap_or_default();
        if !results.is_empty() || !self.has_secondary() {
            return results;
        }
        tracing::debug!(query, "primary provider empty; falling back to secondary");
        secondary().await.unwrap_or_default()
    }

    async fn run_queries(&self, queries: &[String], budget: usize, news: bool) -> Vec<SearchResult> {
        let mut all = Vec::new();
        for query in queries {
            let results = if news {
                self.search_news(query, budget).await.unwrap_or_default()
            } else {
                self.search_with_fallback(query, budget, self.config.prefer_secondary)
                    .await
            };
            all.extend(results);
        }
        all
    }

    /// Companies and market leaders of an industry in a region.
    pub async fn search_competitors(
        &self,
        industry: &str,
        region: &str,
        product_keywords: &[String],
        max_results: usize,
    ) -> Vec<SearchResult> {
        let queries = competitor_queries(industry, region, product_keywords);
        let budget = per_query_budget(max_results, queries.len(), 5);
        let mut results = dedup_by_url(self.run_queries(&queries, budget, false).await);
        results.truncate(max_results);
        results
    }

    /// Recent industry news, via the provider's news endpoint.
    pub async fn search_industry_news(
        &self,
        industry: &str,
        region: &str,
        max_results: usize,
    ) -> Vec<SearchResult> {
        let queries = news_queries(industry, region);
        let budget = per_query_budget(max_results, queries.len(), 5);
        let mut results = dedup_by_url(self.run_queries(&queries, budget, true).await);
        results.truncate(max_results);
        results
    }

    /// Market size, statistics, and analytics pages.
    pub async fn search_market_data(
        &self,
        industry: &str,
        region: &str,
        keywords: &[String],
        max_results: usize,
    ) -> Vec<SearchResult> {
        let queries = market_data_queries(industry, region, keywords);
        let budget = per_query_budget(max_results, queries.len(), 4);
        let mut results = dedup_by_url(self.run_queries(&queries, budget, false).await);
        results.truncate(max_results);
        results
    }

    /// Run all three category searches concurrently.
    pub async fn comprehensive_search(
        &self,
        industry: &str,
        region: &str,
        product_description: &str,
        per_category_limit: usize,
    ) -> CategorizedResults {
        let keywords = extract_keywords(product_description);

        let (competitors, news, market_data) = tokio::join!(
            isolate(
                "competitors",
                self.search_competitors(industry, region, &keywords, per_category_limit)
            ),
            isolate(
                "news",
                self.search_industry_news(industry, region, per_category_limit)
            ),
            isolate(
                "market_data",
                self.search_market_data(industry, region, &keywords, per_category_limit)
            ),
        );

        CategorizedResults {
            competitors,
            news,
            market_data,
        }
    }
}

/// Run one category branch; a panic inside it degrades to an empty list.
async fn isolate<F>(category: &str, branch: F) -> Vec<SearchResult>
where
    F: std::future::Future<Output = Vec<SearchResult>>,
{
    match AssertUnwindSafe(branch).catch_unwind().await {
        Ok(results) => results,
        Err(_) => {
            tracing::warn!(category, "search branch panicked; using empty result");
            Vec::new()
        }
    }
}

fn per_query_budget(max_results: usize, query_count: usize, floor: usize) -> usize {
    (max_results / query_count.max(1)).max(floor)
}

fn joined_keywords(keywords: &[String], take: usize) -> String {
    keywords
        .iter()
        .take(take)
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

fn template(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn competitor_queries(industry: &str, region: &str, keywords: &[String]) -> Vec<String> {
    let kw = joined_keywords(keywords, 3);
    vec![
        template(&[industry, "компании", region]),
        template(&[industry, "лидеры рынка", region]),
        template(&[&kw, "производители", region]),
        template(&["конкуренты", industry, region]),
    ]
}

pub fn news_queries(industry: &str, region: &str) -> Vec<String> {
    vec![
        template(&[industry, "новости", region]),
        template(&[industry, "тренды", region]),
        template(&[industry, "рынок", region]),
    ]
}

pub fn market_data_queries(industry: &str, region: &str, keywords: &[String]) -> Vec<String> {
    let kw = joined_keywords(keywords, 2);
    vec![
        template(&[industry, "статистика", region]),
        template(&[industry, "объем рынка", region]),
        template(&[industry, "аналитика", region]),
        template(&[&kw, "рынок данные", region]),
    ]
}

/// Candidate keywords: whitespace tokens longer than three characters made
/// only of letters and digits. At most [`MAX_KEYWORDS`].
pub fn extract_keywords(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|w| w.chars().count() > 3 && w.chars().all(char::is_alphanumeric))
        .take(MAX_KEYWORDS)
        .map(str::to_string)
        .collect()
}

/// Canonical form used as the dedup key.
///
/// Lowercases scheme and host, drops the fragment, `utm_*` parameters, and
/// a trailing slash. Unparseable input is only trimmed.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut parsed) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    parsed.set_fragment(None);

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| !k.to_ascii_lowercase().starts_with("utm_"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }

    let mut out = parsed.to_string();
    if out.ends_with('/') && parsed.query().is_none() {
        out.pop();
    }
    out
}

/// Keep the first result per normalized URL, in order of appearance.
///
/// Results with an empty URL cannot collide and are always kept.
pub fn dedup_by_url(results: impl IntoIterator<Item = SearchResult>) -> Vec<SearchResult> {
    let mut seen = HashSet::new();
    results
        .into_iter()
        .filter(|r| r.url.trim().is_empty() || seen.insert(normalize_url(&r.url)))
        .collect()
}

/// Turn search hits into records. Pure; no I/O.
pub fn normalize_to_records(
    results: &[SearchResult],
    source: Option<&DataSource>,
    research_id: Option<&str>,
) -> Vec<CollectedRecord> {
    results
        .iter()
        .map(|result| {
            let title = if result.title.is_empty() {
                "No title"
            } else {
                result.title.as_str()
            };
            let content = format!(
                "Title: {}\n\nURL: {}\n\nSnippet: {}",
                title, result.url, result.snippet
            );

            let mut record = CollectedRecord::new(DataFormat::Text).with_processed_content(content);
            record.source_id = source.map(|s| s.id.clone());
            record.research_id = research_id.map(str::to_string);
            record.title = Some(title.to_string());
            record.raw_content = serde_json::to_string(result).ok();
            record.source_url = Some(result.url.clone());
            record.category = result.category;
            record.metadata = json!({
                "search_source": result.provider,
                "snippet": result.snippet,
                "date": result.date,
                "position": result.position,
            });
            record
        })
        .collect()
}
