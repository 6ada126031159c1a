//! Fan-out dispatcher.
//!
//! Expands one review request into (content chunk × rule) task descriptors
//! plus one checker token. Ordering is load-bearing: the ledger's task
//! total must be durable before any task message becomes visible, or a
//! completion check could observe a premature total of 0 and declare the
//! request fully accounted.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::glob::filter_targets;
use crate::domain::prompt::render_rule;
use crate::domain::{
    CheckerToken, EngineError, QueueMessage, ReviewMode, ReviewRequest, ReviewRule, TaskDescriptor,
    encode_body,
};
use crate::ports::ledger::LedgerStore;
use crate::ports::queue::MessageQueue;
use crate::ports::rules::RuleStore;
use crate::ports::source::{ContentChunk, SourceProvider};

/// Placeholder path for the single whole-project chunk in `All` mode.
const WHOLE_PROJECT: &str = "<The Whole Project>";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub task_total: u32,
}

pub struct FanOutDispatcher {
    source: Arc<dyn SourceProvider>,
    rules: Arc<dyn RuleStore>,
    ledger: Arc<dyn LedgerStore>,
    queue: Arc<dyn MessageQueue>,
}

impl FanOutDispatcher {
    pub fn new(
        source: Arc<dyn SourceProvider>,
        rules: Arc<dyn RuleStore>,
        ledger: Arc<dyn LedgerStore>,
        queue: Arc<dyn MessageQueue>,
    ) -> Self {
        Self {
            source,
            rules,
            ledger,
            queue,
        }
    }

    pub async fn dispatch(&self, request: &ReviewRequest) -> Result<DispatchOutcome, EngineError> {
        request.validate()?;

        let chunks = self.resolve_chunks(request).await?;
        let rules = self.rules.rules_for(request.mode).await?;
        let descriptors = build_descriptors(request, &chunks, &rules);
        let task_total = descriptors.len() as u32;

        // 台帳を先に書く。キューが先だと完了判定が先走る。
        self.ledger
            .initialize(&request.commit_id, request.request_id, task_total)
            .await?;
        info!(
            request_id = %request.request_id,
            commit_id = %request.commit_id,
            task_total,
            "ledger initialized, enqueueing tasks"
        );

        for descriptor in &descriptors {
            let body = encode_body(&QueueMessage::Task(descriptor.clone()));
            if let Err(err) = self.queue.enqueue(body, None).await {
                // The task will never run; count it as failed so the
                // accounted total still reaches task_total.
                warn!(
                    number = descriptor.number,
                    %err,
                    "failed to enqueue task, recording as failure"
                );
                self.ledger
                    .increment_failure(&request.commit_id, request.request_id)
                    .await?;
            }
        }

        // 最後に checker を1通だけ積む（0件でも完了検知のために必要）
        let token = CheckerToken::new(
            request.commit_id.clone(),
            request.request_id,
            request.mode,
        );
        self.queue
            .enqueue(encode_body(&QueueMessage::Checker(token)), None)
            .await?;

        debug!(task_total, "dispatch complete");
        Ok(DispatchOutcome { task_total })
    }

    /// Resolve the reviewable content for a request.
    ///
    /// `All`: whatever the provider returns for the target patterns.
    /// `Single`: the diff's files, target-filtered, one fenced chunk each.
    async fn resolve_chunks(
        &self,
        request: &ReviewRequest,
    ) -> Result<Vec<ContentChunk>, EngineError> {
        if request.targets.is_empty() {
            debug!("no target patterns, skipping content resolution");
            return Ok(Vec::new());
        }

        match request.mode {
            ReviewMode::All => {
                let chunks = self
                    .source
                    .content_chunks(&request.commit_id, &request.targets)
                    .await?;
                Ok(chunks)
            }
            ReviewMode::Single => {
                let Some(previous) = request.previous_commit_id.as_ref() else {
                    return Err(EngineError::Validation(
                        "previous_commit_id is required for single mode".to_string(),
                    ));
                };
                let changed = self
                    .source
                    .changed_files(previous, &request.commit_id)
                    .await?;
                let selected = filter_targets(&changed, &request.targets);
                debug!(
                    changed = changed.len(),
                    selected = selected.len(),
                    "filtered changed files by targets"
                );

                let mut chunks = Vec::with_capacity(selected.len());
                for path in selected {
                    let code = self.source.file_at(&path, &request.commit_id).await?;
                    let content = format!("{path}\n```\n{code}\n```");
                    chunks.push(ContentChunk { path, content });
                }
                Ok(chunks)
            }
        }
    }
}

fn build_descriptors(
    request: &ReviewRequest,
    chunks: &[ContentChunk],
    rules: &[ReviewRule],
) -> Vec<TaskDescriptor> {
    let mut descriptors = Vec::new();
    let mut number = 0;

    for chunk in chunks {
        for rule in rules {
            // rules_for は mode で絞るが、絞らない実装も許容する
            if rule.mode != request.mode {
                continue;
            }
            number += 1;
            let prompt_data = render_rule(
                rule,
                &request.commit_id,
                &chunk.content,
                &request.variables,
            );
            let filepath = if chunk.path.is_empty() {
                WHOLE_PROJECT.to_string()
            } else {
                chunk.path.clone()
            };
            descriptors.push(TaskDescriptor {
                commit_id: request.commit_id.clone(),
                request_id: request.request_id,
                number,
                mode: request.mode,
                model: rule.model,
                rule_name: rule.name.clone(),
                filepath,
                prompt_data,
                context: serde_json::Value::Null,
            });
        }
    }
    descriptors
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;

    use crate::domain::{CommitId, LedgerError, ModelId, RequestStatus, SourceError, decode_body};
    use crate::impls::{MemoryLedgerStore, MemoryQueue, MemoryRuleStore};
    use crate::ports::clock::SystemClock;
    use crate::ports::ledger::LedgerStore;

    struct FakeSource;

    #[async_trait]
    impl SourceProvider for FakeSource {
        async fn content_chunks(
            &self,
            _commit_id: &CommitId,
            _targets: &[String],
        ) -> Result<Vec<ContentChunk>, SourceError> {
            Ok(vec![
                ContentChunk {
                    path: "src/lib.rs".to_string(),
                    content: "fn a() {}".to_string(),
                },
                ContentChunk {
                    path: "src/worker.rs".to_string(),
                    content: "fn b() {}".to_string(),
                },
            ])
        }

        async fn changed_files(
            &self,
            _from: &CommitId,
            _to: &CommitId,
        ) -> Result<Vec<String>, SourceError> {
            Ok(vec![
                "src/lib.rs".to_string(),
                "docs/readme.md".to_string(),
            ])
        }

        async fn file_at(&self, path: &str, _commit_id: &CommitId) -> Result<String, SourceError> {
            Ok(format!("// contents of {path}"))
        }
    }

    async fn rule_store(rules: Vec<ReviewRule>) -> Arc<MemoryRuleStore> {
        let store = MemoryRuleStore::new();
        for rule in rules {
            store.insert(rule).await.unwrap();
        }
        Arc::new(store)
    }

    fn two_rules(mode: ReviewMode) -> Vec<ReviewRule> {
        vec![
            ReviewRule::new(mode, ModelId::Claude3Sonnet, "security", "audit {{code}}"),
            ReviewRule::new(mode, ModelId::Claude3Haiku, "style", "style of {{code}}"),
        ]
    }

    struct Harness {
        dispatcher: FanOutDispatcher,
        ledger: Arc<MemoryLedgerStore>,
        queue: Arc<MemoryQueue>,
    }

    async fn harness(rules: Vec<ReviewRule>) -> Harness {
        let ledger = Arc::new(MemoryLedgerStore::new(Arc::new(SystemClock)));
        let queue = Arc::new(MemoryQueue::new(3));
        let dispatcher = FanOutDispatcher::new(
            Arc::new(FakeSource),
            rule_store(rules).await,
            Arc::clone(&ledger) as Arc<dyn LedgerStore>,
            Arc::clone(&queue) as Arc<dyn MessageQueue>,
        );
        Harness {
            dispatcher,
            ledger,
            queue,
        }
    }

    async fn drain(queue: &MemoryQueue, n: usize) -> Vec<QueueMessage> {
        let mut out = Vec::new();
        for _ in 0..n {
            let lease = tokio::time::timeout(std::time::Duration::from_secs(1), queue.lease())
                .await
                .expect("message available")
                .unwrap();
            out.push(decode_body(lease.body()).unwrap());
            lease.ack().await.unwrap();
        }
        out
    }

    #[tokio::test]
    async fn two_chunks_times_two_rules_make_four_tasks_and_one_checker() {
        let h = harness(two_rules(ReviewMode::All)).await;
        let request = ReviewRequest::new(
            CommitId::new("abc"),
            ReviewMode::All,
            vec!["**".to_string()],
            Utc::now(),
        );

        let outcome = h.dispatcher.dispatch(&request).await.unwrap();
        assert_eq!(outcome.task_total, 4);

        let ledger = h
            .ledger
            .get(&request.commit_id, request.request_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ledger.task_total, 4);
        assert_eq!(ledger.status, RequestStatus::Initializing);

        let messages = drain(&h.queue, 5).await;
        let mut numbers = Vec::new();
        for message in &messages[..4] {
            match message {
                QueueMessage::Task(t) => numbers.push(t.number),
                QueueMessage::Checker(_) => panic!("checker before tasks"),
            }
        }
        numbers.sort_unstable();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
        assert!(matches!(messages[4], QueueMessage::Checker(_)));
        assert_eq!(h.queue.counts().await.ready, 0);
    }

    #[tokio::test]
    async fn zero_rules_still_enqueue_the_checker() {
        let h = harness(Vec::new()).await;
        let request = ReviewRequest::new(
            CommitId::new("abc"),
            ReviewMode::All,
            vec!["**".to_string()],
            Utc::now(),
        );

        let outcome = h.dispatcher.dispatch(&request).await.unwrap();
        assert_eq!(outcome.task_total, 0);

        let messages = drain(&h.queue, 1).await;
        assert!(matches!(messages[0], QueueMessage::Checker(_)));
    }

    #[tokio::test]
    async fn single_mode_filters_changed_files_by_targets() {
        let h = harness(two_rules(ReviewMode::Single)).await;
        let request = ReviewRequest::new(
            CommitId::new("head"),
            ReviewMode::Single,
            vec!["src/**".to_string()],
            Utc::now(),
        )
        .with_previous_commit(CommitId::new("base"));

        // changed: src/lib.rs + docs/readme.md; only src/** survives
        let outcome = h.dispatcher.dispatch(&request).await.unwrap();
        assert_eq!(outcome.task_total, 2);

        let messages = drain(&h.queue, 3).await;
        for message in &messages[..2] {
            let QueueMessage::Task(t) = message else {
                panic!("expected task");
            };
            assert_eq!(t.filepath, "src/lib.rs");
            assert!(t.prompt_data.prompt_user.contains("src/lib.rs"));
        }
    }

    #[tokio::test]
    async fn empty_targets_produce_a_zero_task_request() {
        let h = harness(two_rules(ReviewMode::All)).await;
        let request =
            ReviewRequest::new(CommitId::new("abc"), ReviewMode::All, Vec::new(), Utc::now());

        let outcome = h.dispatcher.dispatch(&request).await.unwrap();
        assert_eq!(outcome.task_total, 0);
        assert_eq!(h.queue.counts().await.ready, 1); // checker only
    }

    struct FailingLedger;

    #[async_trait]
    impl LedgerStore for FailingLedger {
        async fn create(&self, _ledger: crate::domain::RequestLedger) -> Result<(), LedgerError> {
            Err(LedgerError::OperationFailed("down".to_string()))
        }
        async fn get(
            &self,
            _commit_id: &CommitId,
            _request_id: crate::domain::RequestId,
        ) -> Result<Option<crate::domain::RequestLedger>, LedgerError> {
            Err(LedgerError::OperationFailed("down".to_string()))
        }
        async fn initialize(
            &self,
            _commit_id: &CommitId,
            _request_id: crate::domain::RequestId,
            _task_total: u32,
        ) -> Result<(), LedgerError> {
            Err(LedgerError::OperationFailed("down".to_string()))
        }
        async fn increment_complete(
            &self,
            _commit_id: &CommitId,
            _request_id: crate::domain::RequestId,
        ) -> Result<crate::domain::LedgerUpdate, LedgerError> {
            Err(LedgerError::OperationFailed("down".to_string()))
        }
        async fn increment_failure(
            &self,
            _commit_id: &CommitId,
            _request_id: crate::domain::RequestId,
        ) -> Result<crate::domain::LedgerUpdate, LedgerError> {
            Err(LedgerError::OperationFailed("down".to_string()))
        }
        async fn try_complete(
            &self,
            _commit_id: &CommitId,
            _request_id: crate::domain::RequestId,
        ) -> Result<bool, LedgerError> {
            Err(LedgerError::OperationFailed("down".to_string()))
        }
    }

    #[tokio::test]
    async fn ledger_write_failure_aborts_before_anything_is_enqueued() {
        let queue = Arc::new(MemoryQueue::new(3));
        let dispatcher = FanOutDispatcher::new(
            Arc::new(FakeSource),
            rule_store(two_rules(ReviewMode::All)).await,
            Arc::new(FailingLedger),
            Arc::clone(&queue) as Arc<dyn MessageQueue>,
        );
        let request = ReviewRequest::new(
            CommitId::new("abc"),
            ReviewMode::All,
            vec!["**".to_string()],
            Utc::now(),
        );

        assert!(dispatcher.dispatch(&request).await.is_err());
        let counts = queue.counts().await;
        assert_eq!(counts.ready + counts.delayed + counts.in_flight, 0);
    }
}
