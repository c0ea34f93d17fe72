//! Core data models used throughout Research Harness.
//!
//! These types represent the search results, data sources, and collected
//! records that flow through the collection pipeline and into the store.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;
use uuid::Uuid;

/// Thematic bucket a search result or collected record belongs to.
///
/// Drives grouping in the digest. Records without a category are rendered
/// under an "Other" heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Competitors,
    News,
    MarketData,
    Statistics,
    LaborMarket,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Competitors => "competitors",
            Category::News => "news",
            Category::MarketData => "market_data",
            Category::Statistics => "statistics",
            Category::LaborMarket => "labor_market",
        }
    }

    /// Heading used for this category in the digest.
    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Competitors => "Competitors",
            Category::News => "News",
            Category::MarketData => "Market data",
            Category::Statistics => "Statistics",
            Category::LaborMarket => "Labor market",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "competitors" => Ok(Category::Competitors),
            "news" => Ok(Category::News),
            "market_data" => Ok(Category::MarketData),
            "statistics" => Ok(Category::Statistics),
            "labor_market" => Ok(Category::LaborMarket),
            other => Err(anyhow!("unknown category: '{}'", other)),
        }
    }
}

/// A single hit returned by a search provider.
///
/// Transient: never persisted directly, only via [`CollectedRecord`].
/// Two results with the same non-empty `url` are the same item for
/// deduplication purposes.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    /// Provider tag (`"duckduckgo"`, `"serpapi"`, or a news outlet name).
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

impl SearchResult {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
            provider: provider.into(),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }
}

/// Kind of external origin a [`DataSource`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    WebSearch,
    Scraping,
    News,
    GovernmentApi,
    GenericApi,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::WebSearch => "web-search",
            SourceType::Scraping => "scraping",
            SourceType::News => "news",
            SourceType::GovernmentApi => "government-api",
            SourceType::GenericApi => "generic-api",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "web-search" => Ok(SourceType::WebSearch),
            "scraping" => Ok(SourceType::Scraping),
            "news" => Ok(SourceType::News),
            "government-api" => Ok(SourceType::GovernmentApi),
            "generic-api" => Ok(SourceType::GenericApi),
            other => Err(anyhow!("unknown source type: '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    Active,
    Inactive,
}

impl SourceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceStatus::Active => "active",
            SourceStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for SourceStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SourceStatus::Active),
            "inactive" => Ok(SourceStatus::Inactive),
            other => Err(anyhow!("unknown source status: '{}'", other)),
        }
    }
}

/// Named provenance descriptor for collected data.
///
/// `name` is the natural key: at most one persisted row exists per name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSource {
    pub id: String,
    pub name: String,
    pub source_type: SourceType,
    pub url: Option<String>,
    pub category: Option<String>,
    pub status: SourceStatus,
    pub created_at: DateTime<Utc>,
}

impl DataSource {
    /// Build a new, active, not-yet-persisted source.
    pub fn new(
        name: impl Into<String>,
        source_type: SourceType,
        url: Option<String>,
        category: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            source_type,
            url,
            category,
            status: SourceStatus::Active,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    Text,
    Json,
    Html,
    Xml,
    Csv,
}

impl DataFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Text => "text",
            DataFormat::Json => "json",
            DataFormat::Html => "html",
            DataFormat::Xml => "xml",
            DataFormat::Csv => "csv",
        }
    }
}

impl FromStr for DataFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(DataFormat::Text),
            "json" => Ok(DataFormat::Json),
            "html" => Ok(DataFormat::Html),
            "xml" => Ok(DataFormat::Xml),
            "csv" => Ok(DataFormat::Csv),
            other => Err(anyhow!("unknown data format: '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingState {
    Unprocessed,
    Processed,
}

impl ProcessingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingState::Unprocessed => "unprocessed",
            ProcessingState::Processed => "processed",
        }
    }
}

impl FromStr for ProcessingState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unprocessed" => Ok(ProcessingState::Unprocessed),
            "processed" => Ok(ProcessingState::Processed),
            other => Err(anyhow!("unknown processing state: '{}'", other)),
        }
    }
}

/// One normalized unit of evidence tied to a source and a research subject.
///
/// `source_id` and `research_id` are weak references: the store does not
/// enforce that the referenced rows exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedRecord {
    pub id: String,
    pub source_id: Option<String>,
    pub research_id: Option<String>,
    pub title: Option<String>,
    /// Provider-specific payload, stored verbatim.
    pub raw_content: Option<String>,
    pub processed_content: Option<String>,
    pub format: DataFormat,
    pub source_url: Option<String>,
    pub collected_at: DateTime<Utc>,
    pub size_bytes: u64,
    pub category: Option<Category>,
    /// Free-form JSON object (author, tags, provider details, verification).
    pub metadata: Value,
    pub processing: ProcessingState,
}

impl CollectedRecord {
    /// Build an empty, unprocessed record collected now.
    pub fn new(format: DataFormat) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_id: None,
            research_id: None,
            title: None,
            raw_content: None,
            processed_content: None,
            format,
            source_url: None,
            collected_at: Utc::now(),
            size_bytes: 0,
            category: None,
            metadata: json!({}),
            processing: ProcessingState::Unprocessed,
        }
    }

    /// Set the processed content and recompute `size_bytes` from its UTF-8 length.
    pub fn with_processed_content(mut self, content: impl Into<String>) -> Self {
        let content = content.into();
        self.size_bytes = content.len() as u64;
        self.processed_content = Some(content);
        self
    }

    /// Text used for display: processed content, falling back to the raw payload.
    ///
    /// Empty strings count as absent.
    pub fn content(&self) -> Option<&str> {
        self.processed_content
            .as_deref()
            .filter(|c| !c.is_empty())
            .or_else(|| self.raw_content.as_deref().filter(|c| !c.is_empty()))
    }

    /// Host part of `source_url` as [`Url`] normalizes it: lowercased,
    /// IDNs in punycode, IPv6 literals in brackets.
    pub fn url_host(&self) -> Option<String> {
        let url = Url::parse(self.source_url.as_deref()?).ok()?;
        url.host_str()
            .filter(|h| !h.is_empty())
            .map(str::to_string)
    }
}

/// The research subject a collection run is performed for.
///
/// Owned by the consuming application; the pipeline only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchSubject {
    pub id: String,
    pub industry: String,
    pub region: String,
    pub product_description: String,
}

impl ResearchSubject {
    pub fn new(
        industry: impl Into<String>,
        region: impl Into<String>,
        product_description: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            industry: industry.into(),
            region: region.into(),
            product_description: product_description.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_prefers_processed_over_raw() {
        let mut record = CollectedRecord::new(DataFormat::Text).with_processed_content("clean");
        record.raw_content = Some("raw".into());
        assert_eq!(record.content(), Some("clean"));
    }

    #[test]
    fn content_falls_back_to_raw_when_processed_empty() {
        let mut record = CollectedRecord::new(DataFormat::Text).with_processed_content("");
        record.raw_content = Some("raw".into());
        assert_eq!(record.content(), Some("raw"));
    }

    #[test]
    fn processed_content_sets_byte_size() {
        let record = CollectedRecord::new(DataFormat::Text).with_processed_content("Москва");
        assert_eq!(record.size_bytes, 12);
    }

    #[test]
    fn url_host_strips_scheme_port_and_path() {
        let mut record = CollectedRecord::new(DataFormat::Html);
        record.source_url = Some("https://Example.COM:8443/a/b?q=1".into());
        assert_eq!(record.url_host().as_deref(), Some("example.com"));

        record.source_url = Some(String::new());
        assert_eq!(record.url_host(), None);
    }

    #[test]
    fn url_host_keeps_ipv6_literals_whole() {
        let mut a = CollectedRecord::new(DataFormat::Html);
        a.source_url = Some("https://[2001:db8::1]/x".into());
        let mut b = CollectedRecord::new(DataFormat::Html);
        b.source_url = Some("https://[2001:db8::2]:8080/x".into());
        assert_eq!(a.url_host().as_deref(), Some("[2001:db8::1]"));
        assert_ne!(a.url_host(), b.url_host());

        a.source_url = Some("http://[::1]:8080/a".into());
        assert_eq!(a.url_host().as_deref(), Some("[::1]"));
    }

    #[test]
    fn url_host_matches_unicode_and_punycode_forms() {
        let mut unicode = CollectedRecord::new(DataFormat::Html);
        unicode.source_url = Some("https://пример.рф/новости".into());
        let mut ascii = CollectedRecord::new(DataFormat::Html);
        ascii.source_url = Some("https://xn--e1afmkfd.xn--p1ai/".into());
        assert_eq!(unicode.url_host().as_deref(), Some("xn--e1afmkfd.xn--p1ai"));
        assert_eq!(unicode.url_host(), ascii.url_host());
    }

    #[test]
    fn url_host_of_unparseable_url_is_none() {
        let mut record = CollectedRecord::new(DataFormat::Html);
        record.source_url = Some("not a url".into());
        assert_eq!(record.url_host(), None);
    }

    #[test]
    fn enums_round_trip_through_strings() {
        for c in [
            Category::Competitors,
            Category::News,
            Category::MarketData,
            Category::Statistics,
            Category::LaborMarket,
        ] {
            assert_eq!(c.as_str().parse::<Category>().unwrap(), c);
        }
        assert_eq!(
            "government-api".parse::<SourceType>().unwrap(),
            SourceType::GovernmentApi
        );
        assert!("bogus".parse::<DataFormat>().is_err());
    }

    #[test]
    fn new_source_is_active() {
        let source = DataSource::new("web-search", SourceType::WebSearch, None, None);
        assert_eq!(source.status, SourceStatus::Active);
        assert!(!source.id.is_empty());
    }
}
