//! Error taxonomy for the collection pipeline.
//!
//! Every variant is recoverable somewhere: provider errors by fallback or
//! an empty result, fetch errors by null-marking the item, persistence
//! errors by degrading the enclosing stage, and verification errors by
//! skipping the record. None of them abort a pipeline run.

use std::time::Duration;

/// Failure of a single search provider call.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The request could not be sent or returned a non-success status.
    #[error("HTTP error: {0}")]
    Http(String),

    /// The call exceeded its per-call timeout.
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),

    /// The provider rejected the request as too frequent.
    #[error("rate limited by {0}")]
    RateLimited(String),

    /// The response body did not have the expected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// The provider needs a credential that is not configured.
    #[error("provider not configured: {0}")]
    NotConfigured(String),

    /// The provider has no endpoint for this kind of query.
    #[error("operation not supported by {0}")]
    Unsupported(String),
}

/// Failure classes surfaced by collection stages and collaborators.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A scrape or news fetch failed for one url.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// A store operation (usually the stage commit) failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Verification of one record failed.
    #[error("verification failed for record {record_id}: {reason}")]
    Verification { record_id: String, reason: String },

    /// A stage panicked; only its own output is lost.
    #[error("stage aborted: {0}")]
    Aborted(String),
}

impl CollectError {
    pub fn persistence(err: anyhow::Error) -> Self {
        CollectError::Persistence(format!("{:#}", err))
    }

    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        CollectError::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn verification(record_id: impl Into<String>, reason: impl ToString) -> Self {
        CollectError::Verification {
            record_id: record_id.into(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_stable() {
        assert_eq!(
            ProviderError::Http("connection refused".into()).to_string(),
            "HTTP error: connection refused"
        );
        assert_eq!(
            ProviderError::RateLimited("duckduckgo".into()).to_string(),
            "rate limited by duckduckgo"
        );
        assert_eq!(
            CollectError::fetch("https://a.example", "404").to_string(),
            "fetch failed for https://a.example: 404"
        );
    }

    #[test]
    fn provider_error_converts_transparently() {
        let err: CollectError = ProviderError::Parse("bad json".into()).into();
        assert_eq!(err.to_string(), "parse error: bad json");
    }

    #[test]
    fn persistence_keeps_context_chain() {
        let inner = anyhow::anyhow!("disk full").context("commit failed");
        let err = CollectError::persistence(inner);
        assert_eq!(err.to_string(), "persistence error: commit failed: disk full");
    }

    #[test]
    fn errors_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProviderError>();
        assert_send_sync::<CollectError>();
    }
}
