//! A self-contained [`Verifier`] that needs no external service.
//!
//! Checks performed:
//!
//! | Check              | Enabled by       | Passes when                                        |
//! |--------------------|------------------|----------------------------------------------------|
//! | `has_content`      | always           | processed or raw content is non-empty              |
//! | `cross_validation` | `cross_validate` | another record of the subject shares the url host  |
//! | `fact_check`       | `fact_check`     | content is present and the url is http(s)          |
//!
//! `confidence` is the share of passed checks; a record is `verified` when
//! at least half pass. The result is merged into the record's metadata
//! under `verification`.

use async_trait::async_trait;
use std::sync::Arc;

use research_harness_core::models::CollectedRecord;
use research_harness_core::store::Store;

use crate::error::CollectError;
use crate::traits::{VerificationCheck, VerificationResult, Verifier};

pub const VERIFIED_THRESHOLD: f64 = 0.5;

pub struct BasicVerifier {
    store: Arc<dyn Store>,
}

impl BasicVerifier {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn cross_validation(
        &self,
        record: &CollectedRecord,
    ) -> Result<VerificationCheck, CollectError> {
        let (Some(research_id), Some(host)) = (record.research_id.as_deref(), record.url_host())
        else {
            return Ok(VerificationCheck {
                name: "cross_validation".into(),
                passed: false,
                detail: "record has no research subject or url".into(),
            });
        };

        let siblings = self
            .store
            .records_for_research(research_id, None)
            .await
            .map_err(|e| CollectError::verification(&record.id, format!("{e:#}")))?;
        let corroborating = siblings
            .iter()
            .filter(|r| r.id != record.id && r.url_host().as_deref() == Some(host.as_str()))
            .count();

        Ok(VerificationCheck {
            name: "cross_validation".into(),
            passed: corroborating > 0,
            detail: format!("{corroborating} other record(s) from {host}"),
        })
    }
}

fn has_content(record: &CollectedRecord) -> VerificationCheck {
    let passed = record.content().is_some();
    VerificationCheck {
        name: "has_content".into(),
        passed,
        detail: if passed { "content present" } else { "no content" }.into(),
    }
}

fn fact_check(record: &CollectedRecord) -> VerificationCheck {
    let http_url = record
        .source_url
        .as_deref()
        .is_some_and(|u| u.starts_with("http://") || u.starts_with("https://"));
    let passed = record.content().is_some() && http_url;
    VerificationCheck {
        name: "fact_check".into(),
        passed,
        detail: if http_url {
            "traceable http(s) source".into()
        } else {
            "no traceable http(s) source".into()
        },
    }
}

#[async_trait]
impl Verifier for BasicVerifier {
    async fn verify(
        &self,
        record: &CollectedRecord,
        cross_validate: bool,
        fact_check_enabled: bool,
    ) -> Result<VerificationResult, CollectError> {
        let mut checks = vec![has_content(record)];
        if cross_validate {
            checks.push(self.cross_validation(record).await?);
        }
        if fact_check_enabled {
            checks.push(fact_check(record));
        }

        let passed = checks.iter().filter(|c| c.passed).count();
        let confidence = passed as f64 / checks.len() as f64;
        let result = VerificationResult {
            record_id: record.id.clone(),
            verified: confidence >= VERIFIED_THRESHOLD,
            confidence,
            checks,
        };

        let payload = serde_json::to_value(&result)
            .map_err(|e| CollectError::verification(&record.id, e))?;
        self.store
            .attach_verification(&record.id, &payload)
            .await
            .map_err(|e| CollectError::verification(&record.id, format!("{e:#}")))?;

        tracing::debug!(record_id = %record.id, confidence, "record verified");
        Ok(result)
    }
}
