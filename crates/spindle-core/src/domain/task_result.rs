//! Per-task result record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::RequestId;

/// The outcome of one fanned-out task.
///
/// Written exactly once per task descriptor and never mutated; the store
/// enforces uniqueness of (request_id, number).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub request_id: RequestId,
    pub number: u32,
    pub succeeded: bool,

    /// Model reply, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,

    /// Joined error trace of every attempt, present on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_trace: Option<String>,

    pub create_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
}

impl TaskResult {
    pub fn success(
        request_id: RequestId,
        number: u32,
        payload: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id,
            number,
            succeeded: true,
            payload: Some(payload.into()),
            error_trace: None,
            create_time: now,
            update_time: now,
        }
    }

    pub fn failure(
        request_id: RequestId,
        number: u32,
        error_trace: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id,
            number,
            succeeded: false,
            payload: None,
            error_trace: Some(error_trace.into()),
            create_time: now,
            update_time: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_carries_payload_only() {
        let r = TaskResult::success(RequestId::generate(), 1, "looks fine", Utc::now());
        assert!(r.succeeded);
        assert_eq!(r.payload.as_deref(), Some("looks fine"));
        assert!(r.error_trace.is_none());
    }

    #[test]
    fn failure_carries_error_trace_only() {
        let r = TaskResult::failure(RequestId::generate(), 2, "attempt 1: boom", Utc::now());
        assert!(!r.succeeded);
        assert!(r.payload.is_none());
        assert_eq!(r.error_trace.as_deref(), Some("attempt 1: boom"));
    }
}
