//! Keyed in-memory submission store.
//!
//! Lifecycle: an entry is created by `start` and kept until purged. Each
//! entry carries its own `RwLock`, so readers of one submission never block
//! another and all mutation of one submission goes through one writer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Notify, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::error::SubmissionError;
use super::state::Submission;
use super::types::SubmissionId;
use crate::models::SubmissionStatus;

/// One stored submission plus its worker wake-up signal.
pub struct SubmissionEntry {
    id: SubmissionId,
    state: RwLock<Submission>,
    resumed: Notify,
}

impl SubmissionEntry {
    fn new(submission: Submission) -> Self {
        Self {
            id: submission.id,
            state: RwLock::new(submission),
            resumed: Notify::new(),
        }
    }

    pub fn id(&self) -> SubmissionId {
        self.id
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Submission> {
        self.state.read().await
    }

    pub async fn write(&self) -> RwLockWriteGuard<'_, Submission> {
        self.state.write().await
    }

    /// Wake a worker parked by `wait_while_paused`.
    pub fn notify_resumed(&self) {
        self.resumed.notify_one();
    }

    /// Park until the submission is no longer paused.
    pub async fn wait_while_paused(&self) {
        loop {
            let resumed = self.resumed.notified();
            if !self.state.read().await.is_paused() {
                return;
            }
            resumed.await;
        }
    }
}

/// Outcome of inserting a submission under its fingerprint.
pub enum Inserted {
    New(Arc<SubmissionEntry>),
    Existing(Arc<SubmissionEntry>),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionSummary {
    pub submission_id: SubmissionId,
    pub status: SubmissionStatus,
    pub total_batches: usize,
    pub total_records: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Index {
    entries: HashMap<SubmissionId, Arc<SubmissionEntry>>,
    by_fingerprint: HashMap<String, SubmissionId>,
}

#[derive(Default)]
pub struct SubmissionStore {
    index: RwLock<Index>,
}

impl SubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless a submission with the same fingerprint already exists.
    pub async fn insert_unique(&self, submission: Submission) -> Inserted {
        let mut index = self.index.write().await;
        if let Some(existing) = index
            .by_fingerprint
            .get(&submission.fingerprint)
            .and_then(|id| index.entries.get(id))
        {
            return Inserted::Existing(existing.clone());
        }
        let id = submission.id;
        let fingerprint = submission.fingerprint.clone();
        let entry = Arc::new(SubmissionEntry::new(submission));
        index.entries.insert(id, entry.clone());
        index.by_fingerprint.insert(fingerprint, id);
        Inserted::New(entry)
    }

    pub async fn get(&self, id: SubmissionId) -> Result<Arc<SubmissionEntry>, SubmissionError> {
        self.index
            .read()
            .await
            .entries
            .get(&id)
            .cloned()
            .ok_or(SubmissionError::NotFound(id))
    }

    pub async fn len(&self) -> usize {
        self.index.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Summaries of every stored submission, newest first.
    pub async fn list(&self) -> Vec<SubmissionSummary> {
        let entries: Vec<Arc<SubmissionEntry>> =
            self.index.read().await.entries.values().cloned().collect();
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let s = entry.read().await;
            out.push(SubmissionSummary {
                submission_id: s.id,
                status: s.status(),
                total_batches: s.batches.len(),
                total_records: s.total_records(),
                created_at: s.created_at,
                updated_at: s.updated_at,
            });
        }
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Drop a finished submission. Running or paused ones are kept so the
    /// worker never loses its state.
    pub async fn purge(&self, id: SubmissionId) -> Result<(), SubmissionError> {
        let entry = self.get(id).await?;
        let status = entry.read().await.status();
        if !status.is_terminal() {
            return Err(SubmissionError::InvalidTransition {
                action: "purge",
                status,
            });
        }
        let mut index = self.index.write().await;
        index.entries.remove(&id);
        index.by_fingerprint.retain(|_, v| *v != id);
        tracing::info!(submission_id = %id, "Submission purged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InformationProvider;
    use crate::pipeline::submission::testing::record;
    use crate::pipeline::submission::types::Batch;
    use std::time::Duration;
    use uuid::Uuid;

    fn submission(fingerprint: &str) -> Submission {
        Submission::new(
            Uuid::new_v4(),
            fingerprint.into(),
            InformationProvider {
                provider_number: "2448141T".into(),
                hpio_number: None,
                hpii_number: None,
            },
            vec![record(1)],
            vec![Batch::new(0, vec![1], 1)],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn same_fingerprint_returns_existing() {
        let store = SubmissionStore::new();
        let first = submission("abc");
        let first_id = first.id;
        assert!(matches!(store.insert_unique(first).await, Inserted::New(_)));
        match store.insert_unique(submission("abc")).await {
            Inserted::Existing(entry) => assert_eq!(entry.id(), first_id),
            Inserted::New(_) => panic!("duplicate fingerprint inserted"),
        }
        assert!(matches!(store.insert_unique(submission("xyz")).await, Inserted::New(_)));
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let store = SubmissionStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(store.get(id).await, Err(SubmissionError::NotFound(x)) if x == id));
    }

    #[tokio::test]
    async fn purge_only_finished_submissions() {
        let store = SubmissionStore::new();
        let s = submission("abc");
        let id = s.id;
        let Inserted::New(entry) = store.insert_unique(s).await else {
            panic!("expected new entry");
        };
        assert!(matches!(
            store.purge(id).await,
            Err(SubmissionError::InvalidTransition { action: "purge", .. })
        ));

        entry.write().await.mark_finished();
        store.purge(id).await.unwrap();
        assert!(store.is_empty().await);
        // Fingerprint is released with the entry.
        assert!(matches!(store.insert_unique(submission("abc")).await, Inserted::New(_)));
    }

    #[tokio::test]
    async fn wait_while_paused_returns_after_resume() {
        let store = SubmissionStore::new();
        let Inserted::New(entry) = store.insert_unique(submission("p")).await else {
            panic!("expected new entry");
        };
        entry.write().await.pause().unwrap();

        let waiter = {
            let entry = entry.clone();
            tokio::spawn(async move { entry.wait_while_paused().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        entry.write().await.resume().unwrap();
        entry.notify_resumed();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("worker should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn list_reports_status() {
        let store = SubmissionStore::new();
        store.insert_unique(submission("a")).await;
        let list = store.list().await;
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].status, SubmissionStatus::Running);
        assert_eq!(list[0].total_records, 1);
    }
}
