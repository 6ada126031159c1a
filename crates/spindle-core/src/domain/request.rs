//! Review request: the immutable input created once per webhook trigger.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::EngineError;
use super::ids::{CommitId, RequestId};

/// How much of the repository one request reviews.
///
/// - `All`: the whole project at a commit, as one content chunk.
/// - `Single`: only the files changed since a previous commit, one chunk
///   per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    All,
    Single,
}

impl fmt::Display for ReviewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewMode::All => f.write_str("all"),
            ReviewMode::Single => f.write_str("single"),
        }
    }
}

/// One review request. Created at intake, never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub request_id: RequestId,
    pub commit_id: CommitId,
    pub mode: ReviewMode,

    /// Glob patterns selecting the files under review (`**`, `*`, `?`).
    pub targets: Vec<String>,

    /// Base commit for `Single` mode diffs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_commit_id: Option<CommitId>,

    /// Template variables from the repository's review configuration.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    pub create_time: DateTime<Utc>,
}

impl ReviewRequest {
    pub fn new(
        commit_id: CommitId,
        mode: ReviewMode,
        targets: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id: RequestId::generate(),
            commit_id,
            mode,
            targets,
            previous_commit_id: None,
            variables: BTreeMap::new(),
            create_time: now,
        }
    }

    pub fn with_previous_commit(mut self, previous: CommitId) -> Self {
        self.previous_commit_id = Some(previous);
        self
    }

    pub fn with_variables(mut self, variables: BTreeMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    /// Reject requests that cannot be dispatched. Single mode reviews a
    /// diff, so the base commit is required.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.commit_id.as_str().is_empty() {
            return Err(EngineError::Validation("commit_id is empty".to_string()));
        }
        if self.mode == ReviewMode::Single && self.previous_commit_id.is_none() {
            return Err(EngineError::Validation(
                "previous_commit_id is required for single mode".to_string(),
            ));
        }
        Ok(())
    }
}
