//! Retention reconciliation: keep only today's greetings.
//!
//! Each ledger entry is evaluated independently:
//! 1. caption (trimmed) differs from the retention caption -> keep
//! 2. published on the keep date -> keep
//! 3. otherwise -> delete the remote message; the entry is dropped on
//!    success, and on failure its fate follows [`StalePolicy`]
//!
//! Only messages recorded in the ledger are ever deleted. Running twice
//! with no intervening publishes is a no-op the second time.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{Ledger, LedgerStore};
use crate::error::Result;
use crate::publish::Publisher;

/// Disposition of a stale entry whose remote deletion failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StalePolicy {
    /// Keep the entry so the next run re-attempts the deletion
    Retry,
    /// Drop the entry anyway; the remote message is abandoned
    Drop,
}

/// Reconciles the ledger against the "keep only today's" policy
pub struct RetentionReconciler<'a, P: Publisher + ?Sized> {
    store: &'a LedgerStore,
    publisher: &'a P,
    policy: StalePolicy,
}

/// Counts from one reconciliation pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub kept: usize,
    pub deleted: usize,
    pub failed: usize,
}

impl<'a, P: Publisher + ?Sized> RetentionReconciler<'a, P> {
    pub fn new(store: &'a LedgerStore, publisher: &'a P, policy: StalePolicy) -> Self {
        Self {
            store,
            publisher,
            policy,
        }
    }

    /// Delete every recorded message that carries `caption` but was not
    /// published on `keep_date`, then persist the filtered ledger.
    pub async fn reconcile(&self, caption: &str, keep_date: NaiveDate) -> Result<ReconcileOutcome> {
        let ledger = self.store.load().await;
        let mut retained = Ledger::new();
        let mut outcome = ReconcileOutcome::default();

        for entry in ledger.entries {
            if entry.caption.trim() != caption.trim() {
                retained.entries.push(entry);
                outcome.kept += 1;
                continue;
            }

            if entry.published_on() == keep_date {
                retained.entries.push(entry);
                outcome.kept += 1;
                continue;
            }

            match self.publisher.delete_remote(entry.id).await {
                Ok(()) => {
                    info!(
                        message_id = entry.id,
                        published = %entry.published_on(),
                        "Deleted stale greeting video"
                    );
                    outcome.deleted += 1;
                }
                Err(e) => {
                    warn!(
                        message_id = entry.id,
                        error = %e,
                        policy = ?self.policy,
                        "Remote deletion failed"
                    );
                    outcome.failed += 1;
                    if self.policy == StalePolicy::Retry {
                        retained.entries.push(entry);
                    }
                }
            }
        }

        self.store.save(&retained).await?;
        Ok(outcome)
    }
}
