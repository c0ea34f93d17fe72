//! SqliteStore against a real database file.

use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

use research_harness::config::Config;
use research_harness::registry::SourceRegistry;
use research_harness::sqlite_store::SqliteStore;
use research_harness::{db, migrate};
use research_harness_core::models::{
    Category, CollectedRecord, DataFormat, DataSource, ProcessingState, SourceStatus, SourceType,
};
use research_harness_core::store::Store;

async fn open_store() -> (TempDir, SqliteStore) {
    let tmp = TempDir::new().unwrap();
    let config = Config::with_db_path(tmp.path().join("data/rh.sqlite"));
    let pool = db::connect(&config).await.unwrap();
    migrate::apply(&pool).await.unwrap();
    (tmp, SqliteStore::new(pool))
}

fn record(research_id: &str, title: &str) -> CollectedRecord {
    let mut record = CollectedRecord::new(DataFormat::Text).with_processed_content(format!("body of {title}"));
    record.research_id = Some(research_id.to_string());
    record.title = Some(title.to_string());
    record.source_url = Some(format!("https://{title}.example/"));
    record.category = Some(Category::Competitors);
    record.metadata = json!({ "search_source": "duckduckgo" });
    record
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let tmp = TempDir::new().unwrap();
    let config = Config::with_db_path(tmp.path().join("rh.sqlite"));
    migrate::run_migrations(&config).await.unwrap();
    migrate::run_migrations(&config).await.unwrap();

    let pool = db::connect(&config).await.unwrap();
    let store = SqliteStore::new(pool);
    assert!(store.list_sources().await.unwrap().is_empty());
}

#[tokio::test]
async fn insert_source_keeps_first_row_per_name() {
    let (_tmp, store) = open_store().await;

    let first = DataSource::new(
        "web-search",
        SourceType::WebSearch,
        Some("https://duckduckgo.com".to_string()),
        Some("web_search".to_string()),
    );
    let persisted = store.insert_source(&first).await.unwrap();
    assert_eq!(persisted.id, first.id);
    assert_eq!(persisted.status, SourceStatus::Active);
    assert_eq!(persisted.source_type, SourceType::WebSearch);

    let second = DataSource::new("web-search", SourceType::News, None, None);
    let again = store.insert_source(&second).await.unwrap();
    assert_eq!(again.id, first.id);
    assert_eq!(again.url.as_deref(), Some("https://duckduckgo.com"));
    assert_eq!(store.list_sources().await.unwrap().len(), 1);

    let found = store.find_source_by_name("web-search").await.unwrap().unwrap();
    assert_eq!(found.created_at.timestamp_millis(), first.created_at.timestamp_millis());
    assert!(store.find_source_by_name("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn records_come_back_in_insertion_order() {
    let (_tmp, store) = open_store().await;

    let batch: Vec<_> = ["zeta", "alpha", "mu"].iter().map(|t| record("r1", t)).collect();
    store.add_records(&batch).await.unwrap();
    store.add_records(&[record("r2", "other")]).await.unwrap();
    store.add_records(&[]).await.unwrap();

    let records = store.records_for_research("r1", None).await.unwrap();
    let titles: Vec<_> = records.iter().map(|r| r.title.as_deref().unwrap()).collect();
    assert_eq!(titles, vec!["zeta", "alpha", "mu"]);

    let first = &records[0];
    assert_eq!(first.id, batch[0].id);
    assert_eq!(first.format, DataFormat::Text);
    assert_eq!(first.category, Some(Category::Competitors));
    assert_eq!(first.processing, ProcessingState::Unprocessed);
    assert_eq!(first.size_bytes, "body of zeta".len() as u64);
    assert_eq!(first.metadata["search_source"], "duckduckgo");

    let capped = store.records_for_research("r1", Some(2)).await.unwrap();
    assert_eq!(capped.len(), 2);
    assert_eq!(capped[1].title.as_deref(), Some("alpha"));

    assert!(store.records_for_research("nobody", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_batch_writes_nothing() {
    let (_tmp, store) = open_store().await;

    let a = record("r1", "a");
    let duplicate = a.clone();
    assert!(store.add_records(&[a, duplicate]).await.is_err());
    assert!(store.records_for_research("r1", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn verification_merges_into_metadata() {
    let (_tmp, store) = open_store().await;
    let r = record("r1", "acme");
    store.add_records(&[r.clone()]).await.unwrap();

    store
        .attach_verification(&r.id, &json!({ "verified": true, "confidence": 1.0 }))
        .await
        .unwrap();

    let stored = store.records_for_research("r1", None).await.unwrap();
    assert_eq!(stored[0].metadata["search_source"], "duckduckgo");
    assert_eq!(stored[0].metadata["verification"]["verified"], true);

    assert!(store
        .attach_verification("missing", &json!({}))
        .await
        .is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn registry_creates_one_row_under_contention() {
    let (_tmp, store) = open_store().await;
    let registry = Arc::new(SourceRegistry::new(Arc::new(store)));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let registry = registry.clone();
        handles.push(tokio::spawn(async move {
            registry
                .resolve("news-aggregator", SourceType::News, None, Some("news"))
                .await
                .unwrap()
                .id
        }));
    }
    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
}
