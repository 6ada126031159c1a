//! Error taxonomy.
//!
//! Four operational classes drive handling decisions:
//! - transient external failures (model/store unavailable) are retried by
//!   the executor or the queue's redelivery;
//! - permanent validation failures are rejected immediately and logged;
//! - ledger races (row gone, increment after completion) are benign no-ops
//!   and never surface as errors;
//! - timeout finalization is policy, not an error.

use thiserror::Error;

/// Failure raised by the model-invocation port.
///
/// Treated as transient: the retry executor backs off and re-invokes until
/// its attempt budget runs out.
#[derive(Debug, Clone, Error)]
#[error("model invocation failed: {0}")]
pub struct InvokeError(pub String);

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue operation failed: {0}")]
    OperationFailed(String),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger row not found for commit_id={commit_id}, request_id={request_id}")]
    NotFound {
        commit_id: String,
        request_id: String,
    },

    #[error("ledger operation failed: {0}")]
    OperationFailed(String),
}

#[derive(Debug, Error)]
pub enum ResultStoreError {
    /// The (request_id, number) key already holds a result. First write
    /// wins; redelivered task messages hit this and must not re-count.
    #[error("result already recorded for request_id={request_id}, number={number}")]
    AlreadyRecorded { request_id: String, number: u32 },

    #[error("result store operation failed: {0}")]
    OperationFailed(String),
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("invalid rule '{name}': {reason}")]
    Invalid { name: String, reason: String },

    #[error("rule store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Error)]
#[error("source provider failed: {0}")]
pub struct SourceError(pub String);

#[derive(Debug, Clone, Error)]
#[error("report generation failed: {0}")]
pub struct ReportError(pub String);

/// Top-level engine error, one variant per boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation: {0}")]
    Validation(String),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Results(#[from] ResultStoreError),

    #[error(transparent)]
    Rules(#[from] RuleError),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Report(#[from] ReportError),

    /// Terminal task failure after the full retry budget. Surfaced to the
    /// queue so its redelivery/dead-letter policy owns the message's fate.
    #[error("task {number} failed after {attempts} attempts")]
    RetriesExhausted { number: u32, attempts: u32 },
}

impl EngineError {
    /// Permanent errors must not be retried; the message is dropped after
    /// logging instead of being handed back to the queue.
    pub fn is_permanent(&self) -> bool {
        matches!(self, EngineError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_is_permanent_everything_else_is_not() {
        assert!(EngineError::Validation("x".to_string()).is_permanent());
        assert!(
            !EngineError::RetriesExhausted {
                number: 1,
                attempts: 5
            }
            .is_permanent()
        );
        assert!(!EngineError::from(QueueError::OperationFailed("q".to_string())).is_permanent());
    }

    #[test]
    fn already_recorded_names_the_key() {
        let err = ResultStoreError::AlreadyRecorded {
            request_id: "req-1".to_string(),
            number: 7,
        };
        let msg = err.to_string();
        assert!(msg.contains("req-1") && msg.contains('7'));
    }
}
