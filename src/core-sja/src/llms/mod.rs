pub mod chat;
#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;
pub mod prompts;

use std::sync::Arc;

use async_trait::async_trait;

pub use chat::ChatModel;
pub use prompts::{prompt_analyze_script, prompt_repair_output};

use crate::Error;

/// Interface to a hosted LLM that lets us complete a prompt and await a response.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn complete_prompt(&self, prompt: &str) -> Result<String, Error>;
}

/// Lets one provider serve as both the analysis and the repair model.
#[async_trait]
impl<T: LlmProvider + ?Sized> LlmProvider for Arc<T> {
    async fn complete_prompt(&self, prompt: &str) -> Result<String, Error> {
        (**self).complete_prompt(prompt).await
    }
}
