//! Retry executor: runs one task descriptor to a recorded result.
//!
//! Backoff blocks this worker only; sibling tasks run on other workers.
//! Accounting is exactly-once: the result store's unique key decides
//! whether this delivery gets to increment a ledger counter, so a message
//! redelivered mid-loop after a worker crash cannot double-count.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{EngineError, ResultStoreError, TaskDescriptor, TaskResult};
use crate::ports::clock::Clock;
use crate::ports::ledger::LedgerStore;
use crate::ports::llm::ModelInvoker;
use crate::ports::results::ResultStore;
use crate::retry::RetryPolicy;

pub struct RetryExecutor {
    invoker: Arc<dyn ModelInvoker>,
    results: Arc<dyn ResultStore>,
    ledger: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl RetryExecutor {
    pub fn new(
        invoker: Arc<dyn ModelInvoker>,
        results: Arc<dyn ResultStore>,
        ledger: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            invoker,
            results,
            ledger,
            clock,
            policy,
        }
    }

    /// Execute one task: invoke with bounded exponential backoff, record
    /// the result, bump the matching ledger counter.
    ///
    /// On exhaustion the error is returned to the caller so the queue's
    /// redelivery/dead-letter policy decides the message's fate.
    pub async fn execute(&self, task: &TaskDescriptor) -> Result<(), EngineError> {
        task.validate()?;

        let mut errors = Vec::new();
        for attempt in 0..self.policy.max_retries {
            if attempt > 0 {
                debug!(number = task.number, attempt, "retrying task");
            }
            match self.invoker.invoke(task.model, &task.prompt_data).await {
                Ok(reply) => {
                    info!(
                        request_id = %task.request_id,
                        number = task.number,
                        rule = %task.rule_name,
                        "task succeeded"
                    );
                    return self.record_success(task, reply).await;
                }
                Err(err) => {
                    warn!(
                        request_id = %task.request_id,
                        number = task.number,
                        attempt,
                        %err,
                        "task attempt failed"
                    );
                    errors.push(format!("attempt {}: {err}", attempt + 1));
                    if attempt + 1 < self.policy.max_retries {
                        tokio::time::sleep(self.policy.next_delay(attempt)).await;
                    }
                }
            }
        }

        self.record_failure(task, errors.join("\n")).await?;
        Err(EngineError::RetriesExhausted {
            number: task.number,
            attempts: self.policy.max_retries,
        })
    }

    async fn record_success(&self, task: &TaskDescriptor, reply: String) -> Result<(), EngineError> {
        let result = TaskResult::success(task.request_id, task.number, reply, self.clock.now());
        self.record(task, result).await
    }

    async fn record_failure(&self, task: &TaskDescriptor, trace: String) -> Result<(), EngineError> {
        let result = TaskResult::failure(task.request_id, task.number, trace, self.clock.now());
        self.record(task, result).await
    }

    async fn record(&self, task: &TaskDescriptor, result: TaskResult) -> Result<(), EngineError> {
        let succeeded = result.succeeded;
        match self.results.record(result).await {
            Ok(()) => {
                let update = if succeeded {
                    self.ledger
                        .increment_complete(&task.commit_id, task.request_id)
                        .await?
                } else {
                    self.ledger
                        .increment_failure(&task.commit_id, task.request_id)
                        .await?
                };
                debug!(number = task.number, ?update, "ledger counter updated");
                Ok(())
            }
            Err(ResultStoreError::AlreadyRecorded { .. }) => {
                // 再配送との競合。先勝ちなので計上はスキップする。
                debug!(
                    request_id = %task.request_id,
                    number = task.number,
                    "result already recorded, skipping increment"
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
