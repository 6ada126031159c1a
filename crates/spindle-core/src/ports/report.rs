//! Report trigger port (external collaborator).

use async_trait::async_trait;

use crate::domain::{CommitId, ReportError, RequestId, ReviewMode};

#[async_trait]
pub trait ReportTrigger: Send + Sync {
    /// Generate and deliver the review report; returns its URL.
    ///
    /// Invoked once per request by the completion poller, guarded by the
    /// ledger's terminal transition.
    async fn generate(
        &self,
        request_id: RequestId,
        commit_id: &CommitId,
        mode: ReviewMode,
    ) -> Result<String, ReportError>;
}
