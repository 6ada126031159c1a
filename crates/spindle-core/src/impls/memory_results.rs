//! In-memory task-result store with a unique (request_id, number) key.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{RequestId, ResultStoreError, TaskResult};
use crate::ports::results::ResultStore;

#[derive(Default)]
pub struct MemoryResultStore {
    rows: Mutex<HashMap<(RequestId, u32), TaskResult>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn record(&self, result: TaskResult) -> Result<(), ResultStoreError> {
        let mut rows = self.rows.lock().await;
        let key = (result.request_id, result.number);
        if rows.contains_key(&key) {
            return Err(ResultStoreError::AlreadyRecorded {
                request_id: result.request_id.to_string(),
                number: result.number,
            });
        }
        rows.insert(key, result);
        Ok(())
    }

    async fn results_for(
        &self,
        request_id: RequestId,
    ) -> Result<Vec<TaskResult>, ResultStoreError> {
        let rows = self.rows.lock().await;
        let mut results: Vec<TaskResult> = rows
            .values()
            .filter(|r| r.request_id == request_id)
            .cloned()
            .collect();
        results.sort_by_key(|r| r.number);
        Ok(results)
    }
}
