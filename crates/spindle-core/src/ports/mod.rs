//! Ports: the trait seams between the engine and everything durable or
//! external.
//!
//! 実装の詳細（SQS/DynamoDB/Bedrock 相当）はここで隠蔽します。開発・テスト用の
//! in-memory 実装は `impls` にあります。

pub mod clock;
pub mod ledger;
pub mod llm;
pub mod queue;
pub mod report;
pub mod results;
pub mod rules;
pub mod source;

pub use clock::{Clock, FixedClock, SystemClock};
pub use ledger::LedgerStore;
pub use llm::ModelInvoker;
pub use queue::{MessageLease, MessageQueue};
pub use report::ReportTrigger;
pub use results::ResultStore;
pub use rules::RuleStore;
pub use source::{ContentChunk, SourceProvider};
