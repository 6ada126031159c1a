//! Domain model (IDs, requests, rules, messages, ledger, results, errors).

pub mod errors;
pub mod glob;
pub mod ids;
pub mod ledger;
pub mod message;
pub mod prompt;
pub mod request;
pub mod rule;
pub mod task_result;

pub use errors::{
    EngineError, InvokeError, LedgerError, QueueError, ReportError, ResultStoreError, RuleError,
    SourceError,
};
pub use ids::{CommitId, RequestId};
pub use ledger::{LedgerUpdate, RequestLedger, RequestStatus};
pub use message::{CheckerToken, QueueMessage, TaskDescriptor, decode_body, encode_body};
pub use prompt::{PromptData, render};
pub use request::{ReviewMode, ReviewRequest};
pub use rule::{ModelId, ReviewRule};
pub use task_result::TaskResult;
