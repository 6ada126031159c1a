//! Review rules and model selection.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::RuleError;
use super::request::ReviewMode;

/// Backend model family member, selected per rule.
///
/// Keeping this a closed enum (rather than a free-form string) means an
/// unknown model is rejected when the rule is loaded, not when a task is
/// already in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelId {
    /// Family default alias, resolved by the invoker.
    #[serde(rename = "claude3")]
    Claude3,
    #[serde(rename = "claude3-haiku")]
    Claude3Haiku,
    #[serde(rename = "claude3-sonnet")]
    Claude3Sonnet,
    #[serde(rename = "claude3-opus")]
    Claude3Opus,
}

impl ModelId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelId::Claude3 => "claude3",
            ModelId::Claude3Haiku => "claude3-haiku",
            ModelId::Claude3Sonnet => "claude3-sonnet",
            ModelId::Claude3Opus => "claude3-opus",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "claude3" => Some(ModelId::Claude3),
            "claude3-haiku" => Some(ModelId::Claude3Haiku),
            "claude3-sonnet" => Some(ModelId::Claude3Sonnet),
            "claude3-opus" => Some(ModelId::Claude3Opus),
            _ => None,
        }
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One review rule: which mode it applies to, which model runs it, and the
/// prompt templates rendered per content chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRule {
    pub mode: ReviewMode,
    pub model: ModelId,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_system: Option<String>,
    pub prompt_user: String,
}

impl ReviewRule {
    pub fn new(
        mode: ReviewMode,
        model: ModelId,
        name: impl Into<String>,
        prompt_user: impl Into<String>,
    ) -> Self {
        Self {
            mode,
            model,
            name: name.into(),
            prompt_system: None,
            prompt_user: prompt_user.into(),
        }
    }

    pub fn with_system_prompt(mut self, prompt_system: impl Into<String>) -> Self {
        self.prompt_system = Some(prompt_system.into());
        self
    }

    /// Checked when a rule is loaded into a store.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.name.trim().is_empty() {
            return Err(RuleError::Invalid {
                name: self.name.clone(),
                reason: "name is empty".to_string(),
            });
        }
        if self.prompt_user.trim().is_empty() {
            return Err(RuleError::Invalid {
                name: self.name.clone(),
                reason: "prompt_user is empty".to_string(),
            });
        }
        Ok(())
    }
}
