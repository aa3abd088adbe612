//! Durable record of published greeting videos.
//!
//! Simple JSON document, fully rewritten on every mutation. The write goes
//! to a sibling temp file first and is renamed into place, so a reader never
//! observes a half-written store. Single writer assumed: overlapping runs
//! are prevented by scheduling discipline (cron), not by locking.

pub mod retention;

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::error::{PipelineError, Result};

/// Ledger of every video this bot has published
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ledger {
    /// Ledger format version
    pub version: u32,

    /// Entries in publish order
    pub entries: Vec<LedgerEntry>,
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

impl Ledger {
    /// Create a new empty ledger
    pub fn new() -> Self {
        Self {
            version: 1,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One published video message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Remote message identifier
    pub id: i64,

    /// Caption the video was published with (the retention tag, not the name)
    pub caption: String,

    /// When the message was published
    pub published_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(id: i64, caption: impl Into<String>, published_at: DateTime<Utc>) -> Self {
        Self {
            id,
            caption: caption.into(),
            published_at,
        }
    }

    /// Calendar date of publication (UTC)
    pub fn published_on(&self) -> NaiveDate {
        self.published_at.date_naive()
    }
}

/// File-backed ledger store
#[derive(Debug, Clone)]
pub struct LedgerStore {
    path: PathBuf,
}

impl LedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the ledger. A missing or unparsable store yields an empty
    /// ledger; the caller never fails on load.
    pub async fn load(&self) -> Ledger {
        match fs::read_to_string(&self.path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(ledger) => ledger,
                Err(e) => {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "Ledger store unparsable, starting empty"
                    );
                    Ledger::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ledger::new(),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Ledger store unreadable, starting empty"
                );
                Ledger::new()
            }
        }
    }

    /// Rewrite the whole store. Writes a temp sibling then renames it into
    /// place so readers never see a partial document.
    pub async fn save(&self, ledger: &Ledger) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::Ledger(format!("create {}: {}", parent.display(), e)))?;
        }

        let content = serde_json::to_string_pretty(ledger)
            .map_err(|e| PipelineError::Ledger(format!("serialize: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .map_err(|e| PipelineError::Ledger(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| PipelineError::Ledger(format!("rename {}: {}", self.path.display(), e)))?;

        Ok(())
    }

    /// Record one published message (load-push-save)
    pub async fn append(&self, entry: LedgerEntry) -> Result<()> {
        let mut ledger = self.load().await;
        ledger.entries.push(entry);
        self.save(&ledger).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> LedgerStore {
        LedgerStore::new(temp.path().join("messages.json"))
    }

    #[tokio::test]
    async fn test_load_missing_store_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let ledger = store.load().await;
        assert!(ledger.is_empty());
        assert_eq!(ledger.version, 1);
    }

    #[tokio::test]
    async fn test_load_garbage_store_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        std::fs::write(store.path(), "{not json").unwrap();

        let ledger = store.load().await;
        assert!(ledger.is_empty());
    }

    #[tokio::test]
    async fn test_append_round_trip() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        let published = Utc::now();
        store
            .append(LedgerEntry::new(42, "birthday", published))
            .await
            .unwrap();

        let ledger = store.load().await;
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.entries[0].id, 42);
        assert_eq!(ledger.entries[0].caption, "birthday");
        assert_eq!(ledger.entries[0].published_at, published);
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        for id in 1..=4 {
            store
                .append(LedgerEntry::new(id, "birthday", Utc::now()))
                .await
                .unwrap();
        }

        let ledger = store.load().await;
        let ids: Vec<i64> = ledger.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        store.save(&Ledger::new()).await.unwrap();

        assert!(store.path().exists());
        assert!(!store.path().with_extension("json.tmp").exists());
    }
}
