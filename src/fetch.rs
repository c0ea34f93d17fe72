//! HTTP implementations of the [`Fetcher`] and [`NewsParser`] collaborators.
//!
//! Both download pages with bounded concurrency. `buffered` (not
//! `buffer_unordered`) keeps output slots aligned with the input urls.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::json;
use std::time::Duration;

use research_harness_core::models::{CollectedRecord, DataFormat, DataSource};

use crate::error::CollectError;
use crate::extract::{extract_article, extract_page};
use crate::http;
use crate::traits::{Fetcher, NewsParser, ParsedArticle};

/// Download one page as text. Non-success statuses and non-textual content
/// types are failures.
async fn download(client: &reqwest::Client, url: &str) -> Result<String, CollectError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| CollectError::fetch(url, e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CollectError::fetch(url, format!("HTTP {status}")));
    }

    if let Some(content_type) = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    {
        let ct = content_type.to_ascii_lowercase();
        if !(ct.contains("html") || ct.contains("xml") || ct.starts_with("text/")) {
            return Err(CollectError::fetch(
                url,
                format!("unsupported content type {content_type}"),
            ));
        }
    }

    response.text().await.map_err(|e| CollectError::fetch(url, e))
}

/// Scrapes pages into HTML-format records.
pub struct HttpFetcher {
    client: reqwest::Client,
    concurrency: usize,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, concurrency: usize) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            concurrency: concurrency.max(1),
        })
    }

    async fn fetch_one(
        &self,
        url: &str,
        source: Option<&DataSource>,
    ) -> Result<CollectedRecord, CollectError> {
        let html = download(&self.client, url).await?;
        let page = extract_page(&html);
        if page.text.is_empty() {
            return Err(CollectError::fetch(url, "no readable text"));
        }

        let mut record = CollectedRecord::new(DataFormat::Html).with_processed_content(page.text);
        record.source_id = source.map(|s| s.id.clone());
        record.title = page.title;
        record.source_url = Some(url.to_string());
        record.metadata = json!({ "html_bytes": html.len() });
        record.raw_content = Some(html);
        Ok(record)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_many(
        &self,
        urls: &[String],
        sources: &[DataSource],
    ) -> Vec<Option<CollectedRecord>> {
        let futures: Vec<_> = urls
            .iter()
            .enumerate()
            .map(|(i, url)| {
                let source = sources.get(i).or_else(|| sources.last());
                async move {
                    match self.fetch_one(url, source).await {
                        Ok(record) => {
                            tracing::debug!(url = %url, bytes = record.size_bytes, "page scraped");
                            Some(record)
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "scrape failed");
                            None
                        }
                    }
                }
            })
            .collect();
        stream::iter(futures)
            .buffered(self.concurrency)
            .collect()
            .await
    }
}

/// Downloads news pages and extracts article fields.
pub struct HttpNewsParser {
    client: reqwest::Client,
    concurrency: usize,
}

impl HttpNewsParser {
    pub fn new(timeout: Duration, concurrency: usize) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            concurrency: concurrency.max(1),
        })
    }
}

#[async_trait]
impl NewsParser for HttpNewsParser {
    async fn parse_many(&self, urls: &[String]) -> Vec<Option<ParsedArticle>> {
        let futures: Vec<_> = urls
            .iter()
            .map(|url| async move {
                match download(&self.client, url).await {
                    Ok(html) => Some(extract_article(&html, url)),
                    Err(err) => {
                        tracing::warn!(error = %err, "news fetch failed");
                        None
                    }
                }
            })
            .collect();
        stream::iter(futures)
            .buffered(self.concurrency)
            .collect()
            .await
    }
}
