//! Completion poller.
//!
//! The "poll loop" is not an in-process loop: each checker delivery is one
//! independent evaluation, and continuation happens by requeueing a fresh
//! token with a fixed delay. State lives entirely in the ledger, so any
//! worker can run any evaluation.
//!
//! Report ordering: the report runs before the terminal transition. If it
//! fails, the error propagates, the consumed token stays un-acked, and
//! native redelivery retries the whole evaluation while the ledger is
//! still not Complete. The conditional transition keeps an
//! already-finalized token from ever reporting again.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::{CheckerToken, EngineError, QueueMessage, encode_body};
use crate::ports::clock::Clock;
use crate::ports::ledger::LedgerStore;
use crate::ports::queue::MessageQueue;
use crate::ports::report::ReportTrigger;

/// Why a request finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionKind {
    /// Every task is accounted for (complete + failure == total).
    AllAccounted,

    /// The report timeout elapsed first; the report covers partial results.
    TimedOut,
}

/// Decision taken for one delivered checker token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A prior pass already finalized this request; idempotent no-op.
    AlreadyFinalized,

    /// This pass finalized the request and triggered the report.
    Finalized(CompletionKind),

    /// Not done yet; a fresh token was enqueued with delay.
    Requeued,
}

pub struct CompletionPoller {
    ledger: Arc<dyn LedgerStore>,
    queue: Arc<dyn MessageQueue>,
    report: Arc<dyn ReportTrigger>,
    clock: Arc<dyn Clock>,
    report_timeout: Duration,
    poll_delay: Duration,
}

impl CompletionPoller {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        queue: Arc<dyn MessageQueue>,
        report: Arc<dyn ReportTrigger>,
        clock: Arc<dyn Clock>,
        report_timeout: Duration,
        poll_delay: Duration,
    ) -> Self {
        Self {
            ledger,
            queue,
            report,
            clock,
            report_timeout,
            poll_delay,
        }
    }

    /// Evaluate one checker token against the ledger.
    pub async fn poll(&self, token: &CheckerToken) -> Result<PollOutcome, EngineError> {
        let Some(ledger) = self
            .ledger
            .get(&token.commit_id, token.request_id)
            .await?
        else {
            // 行が無い = 先行パスで完了済み。冪等に終了する。
            debug!(request_id = %token.request_id, "ledger row absent, nothing to do");
            return Ok(PollOutcome::AlreadyFinalized);
        };

        if ledger.status.is_terminal() {
            debug!(request_id = %token.request_id, "request already complete");
            return Ok(PollOutcome::AlreadyFinalized);
        }

        let accounted = ledger.accounted();
        let elapsed = (self.clock.now() - ledger.create_time)
            .to_std()
            .unwrap_or_default();

        let kind = if ledger.is_fully_accounted() {
            Some(CompletionKind::AllAccounted)
        } else if elapsed > self.report_timeout {
            Some(CompletionKind::TimedOut)
        } else {
            None
        };

        match kind {
            Some(kind) => {
                debug!(
                    request_id = %token.request_id,
                    accounted,
                    total = ledger.task_total,
                    ?kind,
                    "finalizing request"
                );
                // Report first: a failure here propagates and redelivery
                // retries while the ledger is still not Complete.
                let url = self
                    .report
                    .generate(token.request_id, &token.commit_id, token.mode)
                    .await?;

                let won = self
                    .ledger
                    .try_complete(&token.commit_id, token.request_id)
                    .await?;
                if !won {
                    // Duplicate token raced us between report and
                    // transition; benign, but worth an operator trace.
                    warn!(request_id = %token.request_id, "lost finalization race after reporting");
                    return Ok(PollOutcome::AlreadyFinalized);
                }

                info!(
                    request_id = %token.request_id,
                    commit_id = %token.commit_id,
                    complete = ledger.task_complete,
                    failure = ledger.task_failure,
                    total = ledger.task_total,
                    report_url = %url,
                    "request complete, report triggered"
                );
                Ok(PollOutcome::Finalized(kind))
            }
            None => {
                debug!(
                    request_id = %token.request_id,
                    accounted,
                    total = ledger.task_total,
                    "not accounted yet, requeueing checker"
                );
                self.queue
                    .enqueue(
                        encode_body(&QueueMessage::Checker(token.clone())),
                        Some(self.poll_delay),
                    )
                    .await?;
                Ok(PollOutcome::Requeued)
            }
        }
    }
}
