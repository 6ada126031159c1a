//! Rule store port (external collaborator).

use async_trait::async_trait;

use crate::domain::{ReviewMode, ReviewRule, RuleError};

#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Rules applicable to a review mode.
    async fn rules_for(&self, mode: ReviewMode) -> Result<Vec<ReviewRule>, RuleError>;
}
