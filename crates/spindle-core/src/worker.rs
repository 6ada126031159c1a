//! Worker loop: the glue between the queue and the engine components.
//!
//! Workers share no state with each other; everything they coordinate on
//! lives in the queue and the ledger, so any number of them can run the
//! same loop.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::domain::{QueueMessage, decode_body};
use crate::executor::RetryExecutor;
use crate::poller::CompletionPoller;
use crate::ports::queue::{MessageLease, MessageQueue};

/// Routes one leased message to the right component and settles the lease.
///
/// Settlement policy per error class:
/// - permanent validation failures: log and ack (redelivery cannot fix a
///   malformed message);
/// - everything else: fail the lease so the queue's redelivery/dead-letter
///   policy decides.
pub struct MessageRouter {
    executor: RetryExecutor,
    poller: CompletionPoller,
}

impl MessageRouter {
    pub fn new(executor: RetryExecutor, poller: CompletionPoller) -> Self {
        Self { executor, poller }
    }

    pub async fn handle(&self, lease: Box<dyn MessageLease>) {
        let outcome = match decode_body(lease.body()) {
            Err(err) => {
                error!(%err, "rejecting malformed message");
                Settle::Drop
            }
            Ok(QueueMessage::Task(task)) => match self.executor.execute(&task).await {
                Ok(()) => Settle::Done,
                Err(err) if err.is_permanent() => {
                    error!(number = task.number, %err, "rejecting invalid task");
                    Settle::Drop
                }
                Err(err) => {
                    warn!(number = task.number, %err, "task failed, handing back to queue");
                    Settle::Retry(err.to_string())
                }
            },
            Ok(QueueMessage::Checker(token)) => match self.poller.poll(&token).await {
                Ok(outcome) => {
                    debug!(request_id = %token.request_id, ?outcome, "checker evaluated");
                    Settle::Done
                }
                Err(err) => {
                    warn!(request_id = %token.request_id, %err, "checker failed, handing back to queue");
                    Settle::Retry(err.to_string())
                }
            },
        };

        let settled = match outcome {
            Settle::Done | Settle::Drop => lease.ack().await,
            Settle::Retry(reason) => lease.fail(reason).await,
        };
        if let Err(err) = settled {
            error!(%err, "failed to settle lease");
        }
    }
}

enum Settle {
    Done,
    Drop,
    Retry(String),
}

/// Worker group handle.
/// - dropping/using `shutdown` stops all workers after their current message
/// - `shutdown_and_join` waits for them
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers over one queue.
    pub fn spawn(n: usize, queue: Arc<dyn MessageQueue>, router: Arc<MessageRouter>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let queue = Arc::clone(&queue);
            let router = Arc::clone(&router);
            let mut rx = shutdown_rx.clone();

            joins.push(tokio::spawn(async move {
                worker_loop(worker_id, queue, router, &mut rx).await;
            }));
        }

        Self { shutdown_tx, joins }
    }

    /// Request shutdown. In-flight handling finishes; no new leases are
    /// taken.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<dyn MessageQueue>,
    router: Arc<MessageRouter>,
    shutdown_rx: &mut watch::Receiver<bool>,
) {
    loop {
        // shutdown が来ていたら抜ける
        if *shutdown_rx.borrow() {
            break;
        }

        // lease は待つ可能性があるので shutdown と競合させる
        let lease = tokio::select! {
            _ = shutdown_rx.changed() => continue,
            lease = queue.lease() => lease,
        };

        let Some(lease) = lease else {
            tokio::task::yield_now().await;
            continue;
        };

        debug!(worker_id, "leased message");
        router.handle(lease).await;
    }
}
