//! Ledger Store Integration Tests
//!
//! Exercises the file-backed ledger through the public API: durability
//! across store instances, the on-disk JSON shape, and date bucketing
//! used by retention.

use chrono::{NaiveDate, TimeZone, Utc};
use tempfile::TempDir;

use bdaycast::{Ledger, LedgerEntry, LedgerStore};

#[tokio::test]
async fn test_entries_survive_across_store_instances() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("messages.json");

    let writer = LedgerStore::new(&path);
    writer
        .append(LedgerEntry::new(7, "birthday", Utc::now()))
        .await
        .unwrap();
    drop(writer);

    let reader = LedgerStore::new(&path);
    let ledger = reader.load().await;
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger.entries[0].id, 7);
}

#[tokio::test]
async fn test_on_disk_document_is_versioned_json() {
    let temp = TempDir::new().unwrap();
    let store = LedgerStore::new(temp.path().join("messages.json"));

    store
        .append(LedgerEntry::new(1, "birthday", Utc::now()))
        .await
        .unwrap();

    let raw = std::fs::read_to_string(store.path()).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["version"], 1);
    assert_eq!(doc["entries"][0]["id"], 1);
    assert_eq!(doc["entries"][0]["caption"], "birthday");
}

#[tokio::test]
async fn test_save_replaces_previous_contents() {
    let temp = TempDir::new().unwrap();
    let store = LedgerStore::new(temp.path().join("messages.json"));

    store
        .append(LedgerEntry::new(1, "birthday", Utc::now()))
        .await
        .unwrap();

    // Retention rewrites the store with the surviving subset
    store.save(&Ledger::new()).await.unwrap();

    let ledger = store.load().await;
    assert!(ledger.is_empty());
    assert!(!store.path().with_extension("json.tmp").exists());
}

#[test]
fn test_published_on_buckets_by_utc_date() {
    let late_evening = Utc.with_ymd_and_hms(2026, 3, 14, 23, 59, 0).unwrap();
    let entry = LedgerEntry::new(1, "birthday", late_evening);

    assert_eq!(
        entry.published_on(),
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    );
}
