//! Source-control provider port (external collaborator).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{CommitId, SourceError};

/// One reviewable blob of content with the path it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentChunk {
    pub path: String,
    pub content: String,
}

#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Content chunks for a whole-project review, already filtered by the
    /// target patterns. Providers may return one large chunk.
    async fn content_chunks(
        &self,
        commit_id: &CommitId,
        targets: &[String],
    ) -> Result<Vec<ContentChunk>, SourceError>;

    /// Paths changed between two commits.
    async fn changed_files(
        &self,
        from: &CommitId,
        to: &CommitId,
    ) -> Result<Vec<String>, SourceError>;

    /// Content of one file at a commit.
    async fn file_at(&self, path: &str, commit_id: &CommitId) -> Result<String, SourceError>;
}
