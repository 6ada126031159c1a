//! In-memory rule store with load-time validation.

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ReviewMode, ReviewRule, RuleError};
use crate::ports::rules::RuleStore;

#[derive(Default)]
pub struct MemoryRuleStore {
    rules: Mutex<Vec<ReviewRule>>,
}

impl MemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one rule, rejecting invalid ones before they can produce
    /// undispatchable tasks.
    pub async fn insert(&self, rule: ReviewRule) -> Result<(), RuleError> {
        rule.validate()?;
        self.rules.lock().await.push(rule);
        Ok(())
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn rules_for(&self, mode: ReviewMode) -> Result<Vec<ReviewRule>, RuleError> {
        let rules = self.rules.lock().await;
        Ok(rules.iter().filter(|r| r.mode == mode).cloned().collect())
    }
}
