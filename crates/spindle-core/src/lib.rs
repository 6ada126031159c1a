//! spindle-core
//!
//! Work-dispatch and completion-tracking engine for a webhook-triggered
//! code-review pipeline. One review request fans out into many independent
//! model-invocation tasks; a durable ledger plus a self-requeuing checker
//! message detect completion without a central coordinator.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, request, rule, prompt, message, ledger, task_result, errors）
//! - **ports**: 抽象化レイヤー（MessageQueue, LedgerStore, ResultStore, SourceProvider, RuleStore, ModelInvoker, ReportTrigger, Clock）
//! - **impls**: 開発・テスト用の in-memory 実装
//! - **dispatch / executor / poller**: ファンアウト、リトライ実行、完了判定
//! - **worker**: キューとコンポーネントをつなぐワーカーループ

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod executor;
pub mod impls;
pub mod observability;
pub mod poller;
pub mod ports;
pub mod retry;
pub mod worker;
