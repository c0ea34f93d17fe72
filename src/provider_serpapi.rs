//! SerpAPI provider: the optional paid secondary backend.
//!
//! Only constructed when a credential is configured (see
//! [`SearchConfig::resolve_serpapi_key`](crate::config::SearchConfig::resolve_serpapi_key)).

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use research_harness_core::models::SearchResult;

use crate::error::ProviderError;
use crate::http;
use crate::traits::{SearchProvider, SearchRequest};

pub const PROVIDER_NAME: &str = "serpapi";

const ENDPOINT: &str = "https://serpapi.com/search";

pub struct SerpApiProvider {
    client: reqwest::Client,
    api_key: String,
}

impl SerpApiProvider {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl SearchProvider for SerpApiProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured(PROVIDER_NAME.into()));
        }

        tracing::debug!(query = %request.query, engine = %request.engine, "SerpAPI search");

        let num = request.max_results.to_string();
        let params = [
            ("api_key", self.api_key.as_str()),
            ("q", request.query.as_str()),
            ("num", num.as_str()),
            ("engine", request.engine.as_str()),
            ("gl", request.country.as_str()),
            ("hl", request.language.as_str()),
        ];

        let response = self
            .client
            .get(ENDPOINT)
            .query(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Http(format!("SerpAPI request failed: {}", e.without_url())))?;
        let response = http::check_provider_status(response, PROVIDER_NAME)?;

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Http(format!("SerpAPI response read failed: {e}")))?;

        parse_organic_results(&body, request.max_results)
    }
}

#[derive(Debug, Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
}

#[derive(Debug, Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: String,
    #[serde(default)]
    position: Option<u32>,
}

/// Map `organic_results` of a SerpAPI response, truncated to `max_results`.
///
/// SerpAPI reports account problems (bad key, exhausted plan) as a 200 with
/// an `error` field; those become [`ProviderError::Http`].
pub(crate) fn parse_organic_results(
    body: &str,
    max_results: usize,
) -> Result<Vec<SearchResult>, ProviderError> {
    let parsed: SerpApiResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::Parse(format!("SerpAPI JSON: {e}")))?;

    if let Some(error) = parsed.error {
        // "Google hasn't returned any results" is an empty page, not a failure.
        if error.contains("hasn't returned any results") {
            return Ok(Vec::new());
        }
        return Err(ProviderError::Http(format!("SerpAPI: {error}")));
    }

    Ok(parsed
        .organic_results
        .into_iter()
        .take(max_results)
        .map(|r| {
            let mut result = SearchResult::new(r.title, r.link, r.snippet, PROVIDER_NAME);
            result.position = r.position;
            result
        })
        .collect())
}
