//! Prompt templating.
//!
//! Rendering is a pure substitution over `{{key}}` placeholders; it carries
//! no control flow. Unknown placeholders are left in place so a malformed
//! template is visible in the model input rather than silently dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::CommitId;
use super::rule::ReviewRule;

/// Rendered prompts for one task, as carried on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_system: Option<String>,
    pub prompt_user: String,
}

/// Replace every `{{key}}` with the trimmed value from `variables`.
pub fn render(template: &str, variables: &BTreeMap<String, String>) -> String {
    let mut text = template.to_string();
    for (key, value) in variables {
        text = text.replace(&format!("{{{{{key}}}}}"), value.trim());
    }
    text
}

/// Render both prompts of a rule for one content chunk.
///
/// `{{commit_id}}` and `{{code}}` are bound on top of the request's own
/// variables; request variables cannot shadow them.
pub fn render_rule(
    rule: &ReviewRule,
    commit_id: &CommitId,
    code: &str,
    variables: &BTreeMap<String, String>,
) -> PromptData {
    let finish = |template: &str| {
        render(template, variables)
            .replace("{{commit_id}}", commit_id.as_str())
            .replace("{{code}}", code)
    };

    PromptData {
        prompt_system: rule.prompt_system.as_deref().map(finish),
        prompt_user: finish(&rule.prompt_user),
    }
}
