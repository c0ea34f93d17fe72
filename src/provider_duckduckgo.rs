//! DuckDuckGo provider: the free primary search backend.
//!
//! Text search uses the JavaScript-free endpoint at
//! `https://html.duckduckgo.com/html/` and scrapes the result list. News
//! search goes through the `news.js` JSON endpoint, which needs a per-query
//! `vqd` token scraped from the regular search page first.
//!
//! DuckDuckGo throttles aggressively; callers are expected to space calls
//! with a [`RateLimiter`](crate::rate_limit::RateLimiter).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use scraper::{Html, Selector};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use research_harness_core::models::SearchResult;

use crate::error::ProviderError;
use crate::http;
use crate::traits::{Safety, SearchProvider, SearchRequest};

pub const PROVIDER_NAME: &str = "duckduckgo";

const HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";
const TOKEN_ENDPOINT: &str = "https://duckduckgo.com/";
const NEWS_ENDPOINT: &str = "https://duckduckgo.com/news.js";

pub struct DuckDuckGoProvider {
    client: reqwest::Client,
}

impl DuckDuckGoProvider {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
        })
    }

    /// Fetch the `vqd` token the news endpoint requires for `query`.
    async fn fetch_vqd(&self, query: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .get(TOKEN_ENDPOINT)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| ProviderError::Http(format!("DuckDuckGo token request failed: {e}")))?;
        let response = http::check_provider_status(response, PROVIDER_NAME)?;
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(format!("DuckDuckGo token read failed: {e}")))?;

        extract_vqd(&body).ok_or_else(|| ProviderError::Parse("vqd token not found".into()))
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, ProviderError> {
        tracing::debug!(query = %request.query, region = %request.region, "DuckDuckGo search");

        let params = [
            ("q", request.query.as_str()),
            ("kl", request.region.as_str()),
            ("kp", safety_param(request.safety)),
        ];

        let response = self
            .client
            .post(HTML_ENDPOINT)
            .form(&params)
            .header("Accept-Language", "ru-RU,ru;q=0.9,en;q=0.8")
            .send()
            .await
            .map_err(|e| ProviderError::Http(format!("DuckDuckGo request failed: {e}")))?;
        let response = http::check_provider_status(response, PROVIDER_NAME)?;

        let html = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(format!("DuckDuckGo response read failed: {e}")))?;

        tracing::trace!(bytes = html.len(), "DuckDuckGo response received");
        parse_html_results(&html, request.max_results)
    }

    async fn news(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, ProviderError> {
        tracing::debug!(query = %request.query, region = %request.region, "DuckDuckGo news search");

        let vqd = self.fetch_vqd(&request.query).await?;
        let params = [
            ("l", request.region.as_str()),
            ("o", "json"),
            ("noamp", "1"),
            ("q", request.query.as_str()),
            ("vqd", vqd.as_str()),
            ("p", safety_param(request.safety)),
        ];

        let response = self
            .client
            .get(NEWS_ENDPOINT)
            .query(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Http(format!("DuckDuckGo news request failed: {e}")))?;
        let response = http::check_provider_status(response, PROVIDER_NAME)?;

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(format!("DuckDuckGo news read failed: {e}")))?;

        parse_news_json(&body, request.max_results)
    }
}

fn safety_param(safety: Safety) -> &'static str {
    match safety {
        Safety::On => "1",
        Safety::Moderate => "-1",
        Safety::Off => "-2",
    }
}

/// Unwrap DuckDuckGo's `//duckduckgo.com/l/?uddg=<target>` redirect links.
fn extract_url(href: &str) -> Option<String> {
    let full_href = if href.starts_with("//") {
        format!("https:{href}")
    } else {
        href.to_string()
    };

    let parsed = Url::parse(&full_href).ok()?;

    if parsed.host_str() == Some("duckduckgo.com") && parsed.path().starts_with("/l/") {
        parsed
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, value)| value.into_owned())
    } else {
        Some(full_href)
    }
}

/// Parse the HTML endpoint's result page. Ads are skipped.
pub(crate) fn parse_html_results(
    html: &str,
    max_results: usize,
) -> Result<Vec<SearchResult>, ProviderError> {
    let document = Html::parse_document(html);

    let result_sel = Selector::parse(
        ".result.results_links.results_links_deep:not(.result--ad), .web-result:not(.result--ad)",
    )
    .map_err(|e| ProviderError::Parse(format!("invalid result selector: {e:?}")))?;
    let title_sel = Selector::parse(".result__a")
        .map_err(|e| ProviderError::Parse(format!("invalid title selector: {e:?}")))?;
    let snippet_sel = Selector::parse(".result__snippet")
        .map_err(|e| ProviderError::Parse(format!("invalid snippet selector: {e:?}")))?;

    let mut results = Vec::new();

    for element in document.select(&result_sel) {
        if results.len() >= max_results {
            break;
        }

        let Some(title_el) = element.select(&title_sel).next() else {
            continue;
        };
        let title = title_el.text().collect::<String>().trim().to_string();
        if title.is_empty() {
            continue;
        }
        let Some(url) = title_el.value().attr("href").and_then(extract_url) else {
            continue;
        };

        let snippet = element
            .select(&snippet_sel)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let mut result = SearchResult::new(title, url, snippet, PROVIDER_NAME);
        result.position = Some(results.len() as u32 + 1);
        results.push(result);
    }

    tracing::debug!(count = results.len(), "DuckDuckGo results parsed");
    Ok(results)
}

/// Pull the `vqd` token out of a DuckDuckGo search page.
///
/// The token shows up as `vqd="4-123..."`, `vqd='4-123...'` or inside a
/// query string as `vqd=4-123...&`.
fn extract_vqd(html: &str) -> Option<String> {
    for prefix in ["vqd=\"", "vqd='", "vqd="] {
        let mut rest = html;
        while let Some(pos) = rest.find(prefix) {
            rest = &rest[pos + prefix.len()..];
            let token: String = rest
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
                .collect();
            if !token.is_empty() {
                return Some(token);
            }
        }
    }
    None
}

#[derive(Debug, Deserialize)]
struct NewsResponse {
    #[serde(default)]
    results: Vec<NewsItem>,
}

#[derive(Debug, Deserialize)]
struct NewsItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    excerpt: String,
    /// Unix seconds.
    #[serde(default)]
    date: Option<i64>,
    #[serde(default)]
    source: Option<String>,
}

/// Parse a `news.js` response body.
///
/// The outlet name becomes the result's provider tag when present.
pub(crate) fn parse_news_json(
    body: &str,
    max_results: usize,
) -> Result<Vec<SearchResult>, ProviderError> {
    let parsed: NewsResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("DuckDuckGo news JSON: {e}")))?;

    let results: Vec<SearchResult> = parsed
        .results
        .into_iter()
        .take(max_results)
        .enumerate()
        .map(|(i, item)| {
            let provider = item
                .source
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| PROVIDER_NAME.to_string());
            let mut result = SearchResult::new(
                strip_markup(&item.title),
                item.url,
                strip_markup(&item.excerpt),
                provider,
            );
            result.date = item
                .date
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
                .map(|dt| dt.to_rfc3339());
            result.position = Some(i as u32 + 1);
            result
        })
        .collect();

    tracing::debug!(count = results.len(), "DuckDuckGo news parsed");
    Ok(results)
}

/// Drop inline tags (`<b>`) and decode entities in a news excerpt.
fn strip_markup(fragment: &str) -> String {
    Html::parse_fragment(fragment)
        .root_element()
        .text()
        .collect::<String>()
        .trim()
        .to_string()
}
