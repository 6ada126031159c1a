//! Queue message wire types and body codec.
//!
//! Two message kinds share one queue: task descriptors (one model
//! invocation each) and the checker token (the per-request completion
//! timer). Checker messages are tagged `"type": "checker"`; task messages
//! carry no tag, matching the original wire format. Bodies travel as
//! base64-encoded JSON.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use super::errors::EngineError;
use super::ids::{CommitId, RequestId};
use super::prompt::PromptData;
use super::request::ReviewMode;
use super::rule::ModelId;

/// One unit of fanned-out work: (content chunk × rule).
///
/// Immutable once enqueued. `number` starts at 1 and is unique within a
/// request; it identifies the task and implies no ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDescriptor {
    pub commit_id: CommitId,
    pub request_id: RequestId,
    pub number: u32,
    pub mode: ReviewMode,
    pub model: ModelId,
    pub rule_name: String,
    pub filepath: String,
    pub prompt_data: PromptData,

    /// Opaque trigger context passed through to collaborators.
    #[serde(default)]
    pub context: serde_json::Value,
}

impl TaskDescriptor {
    /// Field presence is enforced by deserialization; this rejects the
    /// semantically empty remainder.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.number == 0 {
            return Err(EngineError::Validation(
                "task number must start at 1".to_string(),
            ));
        }
        if self.rule_name.trim().is_empty() {
            return Err(EngineError::Validation("rule_name is empty".to_string()));
        }
        if self.prompt_data.prompt_user.trim().is_empty() {
            return Err(EngineError::Validation("prompt_user is empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
enum CheckerKind {
    Checker,
}

/// The recurring completion-check message: logically one re-armable timer
/// per request. The queue does not enforce per-key uniqueness; the
/// dispatcher enqueues exactly one and the poller requeues at most one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckerToken {
    #[serde(rename = "type")]
    kind: CheckerKind,
    pub commit_id: CommitId,
    pub request_id: RequestId,
    pub mode: ReviewMode,

    #[serde(default)]
    pub context: serde_json::Value,
}

impl CheckerToken {
    pub fn new(commit_id: CommitId, request_id: RequestId, mode: ReviewMode) -> Self {
        Self {
            kind: CheckerKind::Checker,
            commit_id,
            request_id,
            mode,
            context: serde_json::Value::Null,
        }
    }
}

/// Everything that can appear on the task queue.
///
/// Untagged: the checker variant is tried first and only matches bodies
/// carrying `"type": "checker"`; everything else must decode as a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueueMessage {
    Checker(CheckerToken),
    Task(TaskDescriptor),
}

/// Encode a message for the queue: JSON, then base64.
pub fn encode_body(message: &QueueMessage) -> String {
    // serialization of these closed types cannot fail
    let json = serde_json::to_vec(message).unwrap_or_default();
    BASE64.encode(json)
}

/// Decode a queue body. Any failure is a permanent validation error: the
/// message is malformed and redelivery cannot fix it.
pub fn decode_body(body: &str) -> Result<QueueMessage, EngineError> {
    let bytes = BASE64
        .decode(body.trim())
        .map_err(|e| EngineError::Validation(format!("body is not base64: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| EngineError::Validation(format!("body is not a queue message: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> TaskDescriptor {
        TaskDescriptor {
            commit_id: CommitId::new("abc"),
            request_id: RequestId::generate(),
            number: 1,
            mode: ReviewMode::All,
            model: ModelId::Claude3Sonnet,
            rule_name: "security".to_string(),
            filepath: "<The Whole Project>".to_string(),
            prompt_data: PromptData {
                prompt_system: None,
                prompt_user: "review this".to_string(),
            },
            context: serde_json::Value::Null,
        }
    }

    #[test]
    fn task_roundtrips_through_body_codec() {
        let body = encode_body(&QueueMessage::Task(task()));
        let decoded = decode_body(&body).unwrap();
        match decoded {
            QueueMessage::Task(t) => {
                assert_eq!(t.number, 1);
                assert_eq!(t.rule_name, "security");
            }
            QueueMessage::Checker(_) => panic!("decoded as checker"),
        }
    }

    #[test]
    fn checker_is_tagged_on_the_wire() {
        let token = CheckerToken::new(CommitId::new("abc"), RequestId::generate(), ReviewMode::All);
        let json = serde_json::to_value(QueueMessage::Checker(token.clone())).unwrap();
        assert_eq!(json["type"], "checker");

        let body = encode_body(&QueueMessage::Checker(token));
        assert!(matches!(decode_body(&body), Ok(QueueMessage::Checker(_))));
    }

    #[test]
    fn malformed_bodies_are_validation_errors() {
        assert!(matches!(
            decode_body("not base64 at all!!"),
            Err(EngineError::Validation(_))
        ));

        let not_a_message = BASE64.encode(b"{\"hello\": 1}");
        assert!(matches!(
            decode_body(&not_a_message),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn zero_number_and_empty_prompt_are_rejected() {
        let mut t = task();
        t.number = 0;
        assert!(t.validate().is_err());

        let mut t = task();
        t.prompt_data.prompt_user = " ".to_string();
        assert!(t.validate().is_err());

        assert!(task().validate().is_ok());
    }
}
