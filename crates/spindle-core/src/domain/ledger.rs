//! Request ledger: the durable aggregate-progress record.
//!
//! Design:
//! - One row per (commit_id, request_id), the only mutable shared state in
//!   the system.
//! - `task_total` is fixed once by the dispatcher before any task message
//!   becomes visible; the completion check reads it as the denominator.
//! - `task_complete` / `task_failure` only ever increment, and only through
//!   the methods here so the counter invariant holds at every instant:
//!   `task_complete + task_failure <= task_total`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CommitId, RequestId};

/// Request lifecycle status.
///
/// Start (intake) -> Initializing (total fixed) -> Processing (first result
/// recorded) -> Complete (terminal, entered exactly once).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Start,
    Initializing,
    Processing,
    Complete,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        self == RequestStatus::Complete
    }
}

/// Result of a conditional counter update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerUpdate {
    Applied,

    /// The update was a benign race (increment after Complete, or an
    /// increment that would break the counter invariant) and was dropped.
    Ignored,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLedger {
    pub request_id: RequestId,
    pub commit_id: CommitId,
    pub status: RequestStatus,

    pub task_total: u32,
    pub task_complete: u32,
    pub task_failure: u32,

    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl RequestLedger {
    pub fn new(request_id: RequestId, commit_id: CommitId, now: DateTime<Utc>) -> Self {
        Self {
            request_id,
            commit_id,
            status: RequestStatus::Start,
            task_total: 0,
            task_complete: 0,
            task_failure: 0,
            create_time: now,
            update_time: now,
        }
    }

    /// Tasks accounted for so far, success or failure.
    pub fn accounted(&self) -> u32 {
        self.task_complete + self.task_failure
    }

    pub fn is_fully_accounted(&self) -> bool {
        self.accounted() >= self.task_total
    }

    /// Fix the task total and zero the counters. Called by the dispatcher
    /// before anything is enqueued.
    pub fn initialize(&mut self, task_total: u32, now: DateTime<Utc>) {
        self.status = RequestStatus::Initializing;
        self.task_total = task_total;
        self.task_complete = 0;
        self.task_failure = 0;
        self.update_time = now;
    }

    pub fn record_complete(&mut self, now: DateTime<Utc>) -> LedgerUpdate {
        self.record(now, |ledger| ledger.task_complete += 1)
    }

    pub fn record_failure(&mut self, now: DateTime<Utc>) -> LedgerUpdate {
        self.record(now, |ledger| ledger.task_failure += 1)
    }

    fn record(&mut self, now: DateTime<Utc>, bump: impl FnOnce(&mut Self)) -> LedgerUpdate {
        // 完了後・全件計上後の増分は無害な no-op として落とす
        if self.status.is_terminal() || self.is_fully_accounted() {
            return LedgerUpdate::Ignored;
        }
        bump(self);
        self.status = RequestStatus::Processing;
        self.update_time = now;
        LedgerUpdate::Applied
    }

    /// Terminal transition. Returns false if already Complete; the caller
    /// that sees true is the single finalization winner.
    pub fn complete(&mut self, now: DateTime<Utc>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = RequestStatus::Complete;
        self.update_time = now;
        true
    }
}
