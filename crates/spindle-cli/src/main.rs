//! Demo wiring: an in-memory review pipeline end to end.
//!
//! A fake source provider and a flaky model invoker drive the real
//! dispatcher / executor / poller over the in-memory queue and stores.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::time::sleep;

use spindle_core::config::EngineConfig;
use spindle_core::dispatch::FanOutDispatcher;
use spindle_core::domain::{
    CommitId, InvokeError, ModelId, PromptData, ReportError, RequestId, RequestLedger,
    RequestStatus, ReviewMode, ReviewRequest, ReviewRule, SourceError,
};
use spindle_core::executor::RetryExecutor;
use spindle_core::impls::{MemoryLedgerStore, MemoryQueue, MemoryResultStore, MemoryRuleStore};
use spindle_core::observability::RequestProgress;
use spindle_core::poller::CompletionPoller;
use spindle_core::ports::clock::{Clock, SystemClock};
use spindle_core::ports::ledger::LedgerStore;
use spindle_core::ports::llm::ModelInvoker;
use spindle_core::ports::queue::MessageQueue;
use spindle_core::ports::report::ReportTrigger;
use spindle_core::ports::results::ResultStore;
use spindle_core::ports::source::{ContentChunk, SourceProvider};
use spindle_core::worker::{MessageRouter, WorkerGroup};

struct DemoSource;

#[async_trait]
impl SourceProvider for DemoSource {
    async fn content_chunks(
        &self,
        _commit_id: &CommitId,
        _targets: &[String],
    ) -> Result<Vec<ContentChunk>, SourceError> {
        Ok(vec![
            ContentChunk {
                path: "src/lib.rs".to_string(),
                content: "pub fn add(a: u32, b: u32) -> u32 { a + b }".to_string(),
            },
            ContentChunk {
                path: "src/io.rs".to_string(),
                content: "pub fn read(p: &str) -> String { std::fs::read_to_string(p).unwrap() }"
                    .to_string(),
            },
        ])
    }

    async fn changed_files(
        &self,
        _from: &CommitId,
        _to: &CommitId,
    ) -> Result<Vec<String>, SourceError> {
        Ok(Vec::new())
    }

    async fn file_at(&self, _path: &str, _commit_id: &CommitId) -> Result<String, SourceError> {
        Ok(String::new())
    }
}

/// Fails the first `n` invocations to exercise the retry path.
struct FlakyInvoker {
    remaining_failures: AtomicU32,
}

impl FlakyInvoker {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl ModelInvoker for FlakyInvoker {
    async fn invoke(&self, model: ModelId, prompt: &PromptData) -> Result<String, InvokeError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(InvokeError(format!("intentional failure (left={left})")));
        }
        Ok(format!(
            "[{model}] reviewed {} chars, no findings",
            prompt.prompt_user.len()
        ))
    }
}

struct StdoutReport;

#[async_trait]
impl ReportTrigger for StdoutReport {
    async fn generate(
        &self,
        request_id: RequestId,
        commit_id: &CommitId,
        mode: ReviewMode,
    ) -> Result<String, ReportError> {
        println!("report generated for {request_id} (commit={commit_id}, mode={mode})");
        Ok(format!("https://reports.example/{request_id}"))
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = EngineConfig {
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(1),
        poll_delay: Duration::from_millis(500),
        ..EngineConfig::from_env()
    };

    // (A) ports: in-memory queue and stores, demo collaborators
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let queue = Arc::new(MemoryQueue::new(config.max_receives));
    let ledger = Arc::new(MemoryLedgerStore::new(Arc::clone(&clock)));
    let results = Arc::new(MemoryResultStore::new());

    let rules = MemoryRuleStore::new();
    for rule in [
        ReviewRule::new(
            ReviewMode::All,
            ModelId::Claude3Sonnet,
            "security",
            "Audit for security issues:\n{{code}}",
        )
        .with_system_prompt("You are a security reviewer."),
        ReviewRule::new(
            ReviewMode::All,
            ModelId::Claude3Haiku,
            "style",
            "Point out style problems in commit {{commit_id}}:\n{{code}}",
        ),
    ] {
        rules.insert(rule).await.expect("demo rules are valid");
    }

    // (B) engine components
    let executor = RetryExecutor::new(
        Arc::new(FlakyInvoker::new(2)),
        Arc::clone(&results) as _,
        Arc::clone(&ledger) as _,
        Arc::clone(&clock),
        config.retry_policy(),
    );
    let poller = CompletionPoller::new(
        Arc::clone(&ledger) as _,
        Arc::clone(&queue) as Arc<dyn MessageQueue>,
        Arc::new(StdoutReport),
        Arc::clone(&clock),
        config.report_timeout,
        config.poll_delay,
    );
    let router = Arc::new(MessageRouter::new(executor, poller));
    let workers = WorkerGroup::spawn(4, Arc::clone(&queue) as Arc<dyn MessageQueue>, router);

    // (C) intake + dispatch one whole-project review
    let request = ReviewRequest::new(
        CommitId::new("3f2a9c1"),
        ReviewMode::All,
        vec!["**".to_string()],
        Utc::now(),
    );
    ledger
        .create(RequestLedger::new(
            request.request_id,
            request.commit_id.clone(),
            request.create_time,
        ))
        .await
        .expect("intake row");

    let dispatcher = FanOutDispatcher::new(
        Arc::new(DemoSource),
        Arc::new(rules),
        Arc::clone(&ledger) as _,
        Arc::clone(&queue) as Arc<dyn MessageQueue>,
    );
    let outcome = dispatcher.dispatch(&request).await.expect("dispatch");
    println!("dispatched {} tasks for {}", outcome.task_total, request.request_id);

    // (D) wait for the ledger to reach Complete
    loop {
        let row = ledger
            .get(&request.commit_id, request.request_id)
            .await
            .expect("ledger read")
            .expect("ledger row");
        if row.status == RequestStatus::Complete {
            let progress = RequestProgress::from(&row);
            println!(
                "final: {}/{} complete, {} failed",
                progress.task_complete, progress.task_total, progress.task_failure
            );
            for result in results
                .results_for(request.request_id)
                .await
                .expect("results")
            {
                let summary = result
                    .payload
                    .or(result.error_trace)
                    .unwrap_or_default()
                    .replace('\n', " | ");
                println!("  task {}: succeeded={} {summary}", result.number, result.succeeded);
            }
            break;
        }
        sleep(Duration::from_millis(100)).await;
    }

    println!("queue counts: {:?}", queue.counts().await);
    workers.shutdown_and_join().await;
}
