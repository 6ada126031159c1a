//! In-memory ledger store.
//!
//! Conditional-update semantics: every mutation reads and writes the row
//! in one step under the store lock, which is the in-process equivalent of
//! a conditional write against a remote table. Callers never see a stale
//! read-modify-write window.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{CommitId, LedgerError, LedgerUpdate, RequestId, RequestLedger};
use crate::ports::clock::Clock;
use crate::ports::ledger::LedgerStore;

type Key = (CommitId, RequestId);

pub struct MemoryLedgerStore {
    rows: Mutex<HashMap<Key, RequestLedger>>,
    clock: Arc<dyn Clock>,
}

impl MemoryLedgerStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn create(&self, ledger: RequestLedger) -> Result<(), LedgerError> {
        let mut rows = self.rows.lock().await;
        rows.insert((ledger.commit_id.clone(), ledger.request_id), ledger);
        Ok(())
    }

    async fn get(
        &self,
        commit_id: &CommitId,
        request_id: RequestId,
    ) -> Result<Option<RequestLedger>, LedgerError> {
        let rows = self.rows.lock().await;
        Ok(rows.get(&(commit_id.clone(), request_id)).cloned())
    }

    async fn initialize(
        &self,
        commit_id: &CommitId,
        request_id: RequestId,
        task_total: u32,
    ) -> Result<(), LedgerError> {
        let now = self.clock.now();
        let mut rows = self.rows.lock().await;
        let ledger = rows
            .entry((commit_id.clone(), request_id))
            .or_insert_with(|| RequestLedger::new(request_id, commit_id.clone(), now));
        ledger.initialize(task_total, now);
        Ok(())
    }

    async fn increment_complete(
        &self,
        commit_id: &CommitId,
        request_id: RequestId,
    ) -> Result<LedgerUpdate, LedgerError> {
        let now = self.clock.now();
        let mut rows = self.rows.lock().await;
        match rows.get_mut(&(commit_id.clone(), request_id)) {
            Some(ledger) => Ok(ledger.record_complete(now)),
            None => Err(not_found(commit_id, request_id)),
        }
    }

    async fn increment_failure(
        &self,
        commit_id: &CommitId,
        request_id: RequestId,
    ) -> Result<LedgerUpdate, LedgerError> {
        let now = self.clock.now();
        let mut rows = self.rows.lock().await;
        match rows.get_mut(&(commit_id.clone(), request_id)) {
            Some(ledger) => Ok(ledger.record_failure(now)),
            None => Err(not_found(commit_id, request_id)),
        }
    }

    async fn try_complete(
        &self,
        commit_id: &CommitId,
        request_id: RequestId,
    ) -> Result<bool, LedgerError> {
        let now = self.clock.now();
        let mut rows = self.rows.lock().await;
        match rows.get_mut(&(commit_id.clone(), request_id)) {
            Some(ledger) => Ok(ledger.complete(now)),
            // 行が無いのは先行パスで完了済みのケース。勝者にはしない。
            None => Ok(false),
        }
    }
}

fn not_found(commit_id: &CommitId, request_id: RequestId) -> LedgerError {
    LedgerError::NotFound {
        commit_id: commit_id.to_string(),
        request_id: request_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RequestStatus;
    use crate::ports::clock::SystemClock;

    fn store() -> MemoryLedgerStore {
        MemoryLedgerStore::new(Arc::new(SystemClock))
    }

    fn key() -> (CommitId, RequestId) {
        (CommitId::new("abc"), RequestId::generate())
    }

    #[tokio::test]
    async fn initialize_upserts_and_fixes_total() {
        let store = store();
        let (commit, request) = key();

        store.initialize(&commit, request, 4).await.unwrap();
        let ledger = store.get(&commit, request).await.unwrap().unwrap();
        assert_eq!(ledger.task_total, 4);
        assert_eq!(ledger.status, RequestStatus::Initializing);
    }

    #[tokio::test]
    async fn increment_on_missing_row_is_not_found() {
        let store = store();
        let (commit, request) = key();
        let err = store.increment_complete(&commit, request).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[tokio::test]
    async fn concurrent_increments_never_break_the_invariant() {
        let store = Arc::new(store());
        let (commit, request) = key();
        store.initialize(&commit, request, 5).await.unwrap();

        let mut joins = Vec::new();
        for i in 0..10 {
            let store = Arc::clone(&store);
            let commit = commit.clone();
            joins.push(tokio::spawn(async move {
                if i % 2 == 0 {
                    store.increment_complete(&commit, request).await.unwrap()
                } else {
                    store.increment_failure(&commit, request).await.unwrap()
                }
            }));
        }

        let mut applied = 0;
        for join in joins {
            if join.await.unwrap() == LedgerUpdate::Applied {
                applied += 1;
            }
        }

        let ledger = store.get(&commit, request).await.unwrap().unwrap();
        assert_eq!(applied, 5);
        assert_eq!(ledger.accounted(), 5);
        assert!(ledger.accounted() <= ledger.task_total);
    }

    #[tokio::test]
    async fn try_complete_has_exactly_one_winner() {
        let store = Arc::new(store());
        let (commit, request) = key();
        store.initialize(&commit, request, 0).await.unwrap();

        let mut joins = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let commit = commit.clone();
            joins.push(tokio::spawn(
                async move { store.try_complete(&commit, request).await.unwrap() },
            ));
        }

        let mut winners = 0;
        for join in joins {
            if join.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn try_complete_without_row_is_a_no_op() {
        let store = store();
        let (commit, request) = key();
        assert!(!store.try_complete(&commit, request).await.unwrap());
    }
}
