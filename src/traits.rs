//! Collaborator traits consumed by the collection pipeline.
//!
//! Every external service the pipeline talks to sits behind one of these
//! traits, so tests and embedders can swap in their own implementations:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 CollectionPipeline                   │
//! │  ┌──────────────┐ ┌─────────┐ ┌──────────┐ ┌──────┐  │
//! │  │SearchProvider│ │ Fetcher │ │NewsParser│ │Stats │  │
//! │  │ DDG/SerpAPI  │ │  HTTP   │ │   HTTP   │ │ API  │  │
//! │  └──────────────┘ └─────────┘ └──────────┘ └──────┘  │
//! │                     ┌──────────┐                     │
//! │                     │ Verifier │                     │
//! │                     └──────────┘                     │
//! └──────────────────────────┬───────────────────────────┘
//!                            ▼
//!                         Store
//! ```
//!
//! Contract shared by all collaborators: an individual failure is reported
//! through the return value (`Err`, `None`, or a `None` slot in a batch),
//! never by panicking, and never aborts the batch it belongs to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use research_harness_core::models::{CollectedRecord, DataSource, SearchResult};

use crate::error::{CollectError, ProviderError};

// ═══════════════════════════════════════════════════════════════════════
// Search providers
// ═══════════════════════════════════════════════════════════════════════

/// Safe-search level passed to providers that support it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Safety {
    On,
    #[default]
    Moderate,
    Off,
}

/// Parameters of one provider call.
///
/// `region` and `safety` are read by the primary provider; `engine`,
/// `country`, and `language` by the secondary one. Providers ignore what
/// they do not understand.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: usize,
    pub region: String,
    pub safety: Safety,
    /// Engine variant for meta-search providers (`"google"`, `"yandex"`, `"bing"`).
    pub engine: String,
    pub country: String,
    pub language: String,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, max_results: usize) -> Self {
        Self {
            query: query.into(),
            max_results,
            region: "ru-ru".to_string(),
            safety: Safety::Moderate,
            engine: "google".to_string(),
            country: "ru".to_string(),
            language: "ru".to_string(),
        }
    }
}

/// A web search backend.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use research_harness::error::ProviderError;
/// use research_harness::traits::{SearchProvider, SearchRequest};
/// use research_harness_core::models::SearchResult;
///
/// struct Canned;
///
/// #[async_trait]
/// impl SearchProvider for Canned {
///     fn name(&self) -> &str { "canned" }
///
///     async fn search(&self, req: &SearchRequest) -> Result<Vec<SearchResult>, ProviderError> {
///         Ok(vec![SearchResult::new(&req.query, "https://example.com", "", "canned")])
///     }
/// }
/// ```
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider tag stamped on results and used in logs.
    fn name(&self) -> &str;

    /// General web search.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, ProviderError>;

    /// News search. Providers without a news endpoint keep the default.
    async fn news(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, ProviderError> {
        let _ = request;
        Err(ProviderError::Unsupported(self.name().to_string()))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Page fetching and news parsing
// ═══════════════════════════════════════════════════════════════════════

/// Scrapes arbitrary pages into records.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch every url, pairing `urls[i]` with `sources[i]`.
    ///
    /// The output has one slot per url, in input order; `None` marks a
    /// failed url.
    async fn fetch_many(&self, urls: &[String], sources: &[DataSource])
        -> Vec<Option<CollectedRecord>>;
}

/// An article extracted from a news page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedArticle {
    pub url: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub published_date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub summary: Option<String>,
}

/// Downloads and parses news articles.
#[async_trait]
pub trait NewsParser: Send + Sync {
    /// Parse every url; one slot per url in input order, `None` on failure.
    async fn parse_many(&self, urls: &[String]) -> Vec<Option<ParsedArticle>>;
}

// ═══════════════════════════════════════════════════════════════════════
// Statistics APIs
// ═══════════════════════════════════════════════════════════════════════

/// An external statistics endpoint.
///
/// `None` means "no data", which is expected for unconfigured integrations
/// and is not treated as a failure.
#[async_trait]
pub trait StatisticsApi: Send + Sync {
    async fn fetch(&self, indicator: &str, region_code: &str) -> Option<Value>;
}

// ═══════════════════════════════════════════════════════════════════════
// Verification
// ═══════════════════════════════════════════════════════════════════════

/// One named check performed while verifying a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

/// Outcome of verifying a single record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub record_id: String,
    pub verified: bool,
    /// Share of passed checks, in `[0.0, 1.0]`.
    pub confidence: f64,
    pub checks: Vec<VerificationCheck>,
}

/// Cross-checks collected records.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(
        &self,
        record: &CollectedRecord,
        cross_validate: bool,
        fact_check: bool,
    ) -> Result<VerificationResult, CollectError>;
}
