//! Status views for operators and tests.

use serde::{Deserialize, Serialize};

use crate::domain::{RequestLedger, RequestStatus};

/// Message counts by queue state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueCounts {
    pub ready: usize,
    pub delayed: usize,
    pub in_flight: usize,
    pub dead: usize,
}

/// Serializable snapshot of one request's aggregate progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestProgress {
    pub status: RequestStatus,
    pub task_total: u32,
    pub task_complete: u32,
    pub task_failure: u32,
}

impl RequestProgress {
    pub fn accounted(&self) -> u32 {
        self.task_complete + self.task_failure
    }
}

impl From<&RequestLedger> for RequestProgress {
    fn from(ledger: &RequestLedger) -> Self {
        Self {
            status: ledger.status,
            task_total: ledger.task_total,
            task_complete: ledger.task_complete,
            task_failure: ledger.task_failure,
        }
    }
}
