use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{ChatChoice, ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs},
};
use async_trait::async_trait;

use crate::Error;
use crate::common::LlmConfig;
use crate::llms::LlmProvider;

/// A chat model behind an OpenAI-compatible endpoint (Ollama's `/v1` API by default).
/// Each prompt is sent as a single user message.
#[derive(Debug, Clone)]
pub struct ChatModel {
    client: Client<OpenAIConfig>,
    model: String,
}

impl ChatModel {
    pub fn new(config: &LlmConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_base(config.api_base.clone())
            .with_api_key(config.api_key.clone());
        ChatModel {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LlmProvider for ChatModel {
    async fn complete_prompt(&self, prompt: &str) -> Result<String, Error> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .messages([ChatCompletionRequestUserMessageArgs::default()
                .content(prompt)
                .build()?
                .into()])
            .build()?;

        let response = self.client.chat().create(request).await?;
        completion_text(&self.model, &response.choices)
    }
}

/// Text of the first choice. A blank reply is still a reply and is left to the
/// output validator; only a response without any choice means the model gave nothing.
fn completion_text(model: &str, choices: &[ChatChoice]) -> Result<String, Error> {
    choices
        .first()
        .map(|choice| choice.message.content.clone().unwrap_or_default())
        .ok_or_else(|| Error::ModelUnavailable(format!("{} returned no choices", model)))
}
