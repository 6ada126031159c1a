//! Ledger store port.
//!
//! Every mutation is an atomic conditional update against the currently
//! stored row, never a caller-side read-modify-write: many executors write
//! the same row concurrently. The production counterpart is a conditional
//! write (DynamoDB-style update expression); the in-memory implementation
//! gets the same atomicity from updating under one lock.

use async_trait::async_trait;

use crate::domain::{CommitId, LedgerError, LedgerUpdate, RequestId, RequestLedger};

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Write the intake row (status Start, all counters zero).
    async fn create(&self, ledger: RequestLedger) -> Result<(), LedgerError>;

    async fn get(
        &self,
        commit_id: &CommitId,
        request_id: RequestId,
    ) -> Result<Option<RequestLedger>, LedgerError>;

    /// Fix the task total and zero the counters (status Initializing).
    /// Upserts, so a dispatcher can run without a prior intake row.
    async fn initialize(
        &self,
        commit_id: &CommitId,
        request_id: RequestId,
        task_total: u32,
    ) -> Result<(), LedgerError>;

    /// Atomically add one completed task.
    async fn increment_complete(
        &self,
        commit_id: &CommitId,
        request_id: RequestId,
    ) -> Result<LedgerUpdate, LedgerError>;

    /// Atomically add one failed task.
    async fn increment_failure(
        &self,
        commit_id: &CommitId,
        request_id: RequestId,
    ) -> Result<LedgerUpdate, LedgerError>;

    /// Conditional terminal transition: succeeds only while status is not
    /// yet Complete. Exactly one concurrent caller gets `true`.
    async fn try_complete(
        &self,
        commit_id: &CommitId,
        request_id: RequestId,
    ) -> Result<bool, LedgerError>;
}
