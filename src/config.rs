//! TOML configuration parsing and validation.
//!
//! Configuration is read from a single TOML file (default `./config/rh.toml`).
//! Every section except `[db]` is optional and falls back to defaults tuned
//! for polite, bounded collection. The paid search credential may come from
//! the file or from the `SERPAPI_KEY` environment variable.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use research_harness_core::models::{Category, SourceType};

use crate::traits::Safety;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub statistics: StatisticsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum spacing between two provider calls.
    #[serde(default = "default_rate_limit_ms")]
    pub rate_limit_ms: u64,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub safe_search: Safety,
    #[serde(default = "default_engine")]
    pub engine: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default)]
    pub prefer_secondary: bool,
    #[serde(default = "default_per_category_limit")]
    pub per_category_limit: usize,
    #[serde(default)]
    pub serpapi_key: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_search_timeout_secs(),
            rate_limit_ms: default_rate_limit_ms(),
            region: default_region(),
            safe_search: Safety::default(),
            engine: default_engine(),
            country: default_country(),
            language: default_language(),
            prefer_secondary: false,
            per_category_limit: default_per_category_limit(),
            serpapi_key: None,
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_millis(self.rate_limit_ms)
    }

    /// The secondary provider credential: environment first, then file.
    ///
    /// Empty strings count as "not configured".
    pub fn resolve_serpapi_key(&self) -> Option<String> {
        first_credential(std::env::var("SERPAPI_KEY").ok(), self.serpapi_key.clone())
    }
}

fn first_credential(env: Option<String>, file: Option<String>) -> Option<String> {
    let present = |k: &String| !k.trim().is_empty();
    env.filter(present).or_else(|| file.filter(present))
}

fn default_search_timeout_secs() -> u64 {
    30
}
fn default_rate_limit_ms() -> u64 {
    1000
}
fn default_region() -> String {
    "ru-ru".to_string()
}
fn default_engine() -> String {
    "google".to_string()
}
fn default_country() -> String {
    "ru".to_string()
}
fn default_language() -> String {
    "ru".to_string()
}
fn default_per_category_limit() -> usize {
    10
}

/// Hard ceiling on competitor pages scraped per run.
pub const MAX_SCRAPE_URLS: usize = 15;
/// Hard ceiling on news articles parsed per run.
pub const MAX_NEWS_URLS: usize = 10;
/// Hard ceiling on records verified per run.
pub const MAX_VERIFY_RECORDS: usize = 50;

/// Per-run fan-out limits. The url and record caps may be lowered but never
/// raised past [`MAX_SCRAPE_URLS`], [`MAX_NEWS_URLS`] and [`MAX_VERIFY_RECORDS`].
#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    #[serde(default = "default_max_scrape_urls")]
    pub max_scrape_urls: usize,
    #[serde(default = "default_max_news_urls")]
    pub max_news_urls: usize,
    #[serde(default = "default_news_search_limit")]
    pub news_search_limit: usize,
    #[serde(default = "default_max_verify_records")]
    pub max_verify_records: usize,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_scrape_urls: default_max_scrape_urls(),
            max_news_urls: default_max_news_urls(),
            news_search_limit: default_news_search_limit(),
            max_verify_records: default_max_verify_records(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            fetch_concurrency: default_fetch_concurrency(),
        }
    }
}

fn default_max_scrape_urls() -> usize {
    MAX_SCRAPE_URLS
}
fn default_max_news_urls() -> usize {
    MAX_NEWS_URLS
}
fn default_news_search_limit() -> usize {
    20
}
fn default_max_verify_records() -> usize {
    MAX_VERIFY_RECORDS
}
fn default_fetch_timeout_secs() -> u64 {
    20
}
fn default_fetch_concurrency() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct StatisticsConfig {
    #[serde(default = "default_statistics_sources")]
    pub sources: Vec<StatisticsSourceConfig>,
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self {
            sources: default_statistics_sources(),
        }
    }
}

/// One entry of the statistics API catalogue.
#[derive(Debug, Deserialize, Clone)]
pub struct StatisticsSourceConfig {
    pub name: String,
    #[serde(default = "default_statistics_kind")]
    pub kind: SourceType,
    #[serde(default)]
    pub category: Option<Category>,
    pub indicator: String,
    /// URL template with `{indicator}` and optional `{region}` placeholders.
    #[serde(default)]
    pub endpoint: Option<String>,
}

fn default_statistics_kind() -> SourceType {
    SourceType::GenericApi
}

fn default_statistics_sources() -> Vec<StatisticsSourceConfig> {
    vec![
        StatisticsSourceConfig {
            name: "rosstat".to_string(),
            kind: SourceType::GovernmentApi,
            category: Some(Category::Statistics),
            indicator: "market_size".to_string(),
            endpoint: None,
        },
        StatisticsSourceConfig {
            name: "hh-labor-market".to_string(),
            kind: SourceType::GenericApi,
            category: Some(Category::LaborMarket),
            indicator: "vacancies".to_string(),
            endpoint: None,
        },
    ]
}

impl Config {
    /// A config with defaults everywhere, pointing at the given database.
    pub fn with_db_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db: DbConfig { path: path.into() },
            search: SearchConfig::default(),
            collection: CollectionConfig::default(),
            statistics: StatisticsConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.search.timeout_secs == 0 {
        bail!("search.timeout_secs must be > 0");
    }
    if config.search.per_category_limit == 0 {
        bail!("search.per_category_limit must be > 0");
    }
    let caps = [
        ("max_scrape_urls", config.collection.max_scrape_urls, MAX_SCRAPE_URLS),
        ("max_news_urls", config.collection.max_news_urls, MAX_NEWS_URLS),
        ("max_verify_records", config.collection.max_verify_records, MAX_VERIFY_RECORDS),
    ];
    for (name, value, ceiling) in caps {
        if value == 0 || value > ceiling {
            bail!("collection.{} must be between 1 and {}, got {}", name, ceiling, value);
        }
    }
    if config.collection.news_search_limit == 0 {
        bail!("collection.news_search_limit must be > 0");
    }
    if config.collection.fetch_timeout_secs == 0 {
        bail!("collection.fetch_timeout_secs must be > 0");
    }
    if config.collection.fetch_concurrency == 0 {
        bail!("collection.fetch_concurrency must be > 0");
    }

    for source in &config.statistics.sources {
        if source.name.trim().is_empty() {
            bail!("statistics.sources: name must not be empty");
        }
        if source.indicator.trim().is_empty() {
            bail!("statistics.sources '{}': indicator must not be empty", source.name);
        }
        if let Some(ref endpoint) = source.endpoint {
            if !endpoint.contains("{indicator}") {
                bail!(
                    "statistics.sources '{}': endpoint must contain an {{indicator}} placeholder",
                    source.name
                );
            }
        }
    }

    Ok(())
}
