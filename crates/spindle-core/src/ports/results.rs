//! Task-result store port.

use async_trait::async_trait;

use crate::domain::{RequestId, ResultStoreError, TaskResult};

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Record one task result. First write wins: a second write for the
    /// same (request_id, number) returns `AlreadyRecorded`, which is how
    /// redelivered task messages are kept from double-counting.
    async fn record(&self, result: TaskResult) -> Result<(), ResultStoreError>;

    /// All results recorded for a request, ordered by task number.
    async fn results_for(&self, request_id: RequestId) -> Result<Vec<TaskResult>, ResultStoreError>;
}
