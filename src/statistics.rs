//! Statistics API collaborators and the catalogue the pipeline iterates.
//!
//! A catalogue entry without an endpoint is backed by
//! [`UnconfiguredStatisticsApi`], which always reports "no data". That is
//! the expected state for most installations and is not a failure.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use research_harness_core::models::{Category, SourceType};

use crate::config::{StatisticsConfig, StatisticsSourceConfig};
use crate::http;
use crate::traits::StatisticsApi;

/// GET a JSON document from an endpoint template.
///
/// `{indicator}` and `{region}` in the template are replaced with the
/// percent-encoded call arguments.
pub struct HttpStatisticsApi {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpStatisticsApi {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::build_client(timeout)?,
            endpoint: endpoint.into(),
        })
    }

    fn url_for(&self, indicator: &str, region_code: &str) -> String {
        let encode = |s: &str| url::form_urlencoded::byte_serialize(s.as_bytes()).collect::<String>();
        self.endpoint
            .replace("{indicator}", &encode(indicator))
            .replace("{region}", &encode(region_code))
    }
}

#[async_trait]
impl StatisticsApi for HttpStatisticsApi {
    async fn fetch(&self, indicator: &str, region_code: &str) -> Option<Value> {
        let url = self.url_for(indicator, region_code);
        tracing::debug!(%url, "statistics API request");

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(%url, error = %e, "statistics API request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            tracing::warn!(%url, status = %response.status(), "statistics API returned an error");
            return None;
        }

        match response.json::<Value>().await {
            Ok(value) if !is_empty_payload(&value) => Some(value),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(%url, error = %e, "statistics API returned invalid JSON");
                None
            }
        }
    }
}

/// Stand-in for integrations without an endpoint.
pub struct UnconfiguredStatisticsApi;

#[async_trait]
impl StatisticsApi for UnconfiguredStatisticsApi {
    async fn fetch(&self, _indicator: &str, _region_code: &str) -> Option<Value> {
        None
    }
}

/// `null`, `{}`, `[]` and `""` carry no data.
pub fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// One resolved catalogue entry.
#[derive(Clone)]
pub struct StatisticsEntry {
    pub name: String,
    pub kind: SourceType,
    pub category: Category,
    pub indicator: String,
    pub endpoint: Option<String>,
    pub api: Arc<dyn StatisticsApi>,
}

impl StatisticsEntry {
    pub fn new(
        name: impl Into<String>,
        kind: SourceType,
        category: Category,
        indicator: impl Into<String>,
        api: Arc<dyn StatisticsApi>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            category,
            indicator: indicator.into(),
            endpoint: None,
            api,
        }
    }

    fn from_config(source: &StatisticsSourceConfig, timeout: Duration) -> anyhow::Result<Self> {
        let api: Arc<dyn StatisticsApi> = match &source.endpoint {
            Some(endpoint) => Arc::new(HttpStatisticsApi::new(endpoint.clone(), timeout)?),
            None => Arc::new(UnconfiguredStatisticsApi),
        };
        Ok(Self {
            name: source.name.clone(),
            kind: source.kind,
            category: source.category.unwrap_or(Category::Statistics),
            indicator: source.indicator.clone(),
            endpoint: source.endpoint.clone(),
            api,
        })
    }
}

pub fn build_catalogue(
    config: &StatisticsConfig,
    timeout: Duration,
) -> anyhow::Result<Vec<StatisticsEntry>> {
    config
        .sources
        .iter()
        .map(|source| StatisticsEntry::from_config(source, timeout))
        .collect()
}
