//! In-memory implementations of the durable ports.
//!
//! 開発・テスト用。本番相当は SQS / DynamoDB のような外部サービスになるが、
//! 意味論（at-least-once 配送、条件付き更新、一意キー）はここで揃えてある。

mod memory_ledger;
mod memory_queue;
mod memory_results;
mod memory_rules;

pub use memory_ledger::MemoryLedgerStore;
pub use memory_queue::MemoryQueue;
pub use memory_results::MemoryResultStore;
pub use memory_rules::MemoryRuleStore;
