//! Shared HTTP client construction for providers and fetchers.

use anyhow::{Context, Result};
use reqwest::StatusCode;
use std::time::Duration;

use crate::error::ProviderError;

/// Browser-like User-Agent; some search frontends refuse obvious bots.
pub const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Build a [`reqwest::Client`] with cookies, compression, a bounded
/// redirect chain, and the given timeout.
pub fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .cookie_store(true)
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .context("failed to build HTTP client")
}

/// Map a provider response status onto [`ProviderError`].
///
/// DuckDuckGo answers throttled clients with `202 Accepted` and an empty
/// page, so 202 is treated like 429.
pub fn check_provider_status(
    response: reqwest::Response,
    provider: &str,
) -> std::result::Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::ACCEPTED {
        return Err(ProviderError::RateLimited(provider.to_string()));
    }
    if !status.is_success() {
        return Err(ProviderError::Http(format!("{provider} returned {status}")));
    }
    Ok(response)
}
