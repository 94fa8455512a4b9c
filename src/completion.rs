//! Text-completion abstraction over chat models
//!
//! The workflow treats generation as a black box: a system instruction plus
//! a user prompt in, prose out. Implementations carry their own model and
//! sampling configuration so the multi-agent pipeline can tune each stage
//! independently.

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;

use crate::error::{AssistantError, Result};

/// A text-completion capability.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Send a system instruction and user prompt, returning generated text.
    async fn complete(&self, system: &str, prompt: &str) -> Result<String>;
}

/// OpenAI chat-completion client with a fixed model and temperature.
pub struct OpenAiCompletion {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiCompletion {
    /// Build a client reading OPENAI_API_KEY from the environment.
    pub fn new(model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            temperature,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Completion for OpenAiCompletion {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.as_str())
            .temperature(self.temperature)
            .messages([
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: Some(system.to_string()),
                    ..Default::default()
                }),
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    content: Some(ChatCompletionRequestUserMessageContent::Text(prompt.to_string())),
                    ..Default::default()
                }),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| {
                AssistantError::Completion("model returned no content".to_string())
            })?;

        Ok(content.trim().to_string())
    }
}
