//! Model invocation port (external collaborator).

use async_trait::async_trait;

use crate::domain::{InvokeError, ModelId, PromptData};

#[async_trait]
pub trait ModelInvoker: Send + Sync {
    /// Run one rendered prompt against a model and return the reply text.
    ///
    /// Errors are transient by contract; the retry executor owns backoff.
    async fn invoke(&self, model: ModelId, prompt: &PromptData) -> Result<String, InvokeError>;
}
