//! services/api/src/adapters/text_llm.rs
//!
//! `TextGenerator` implementations: the OpenAI chat-completion adapter used for
//! report insights, and a disabled stand-in for deployments without an API key.

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use job_tracker_core::ports::{GenerationOptions, PortError, PortResult, TextGenerator};

const SYSTEM_PROMPT: &str = "You are a career coach reviewing a job seeker's application statistics. \
Write plain prose: no headings, no bullet markup, no preamble. Be specific and encouraging, and only \
use numbers that appear in the prompt.";

pub struct OpenAiTextAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiTextAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl TextGenerator for OpenAiTextAdapter {
    async fn generate(&self, prompt: &str, options: GenerationOptions) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(options.max_tokens)
            .temperature(options.temperature)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let text = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| PortError::Unexpected("No insight text generated".to_string()))?;

        Ok(text.trim().to_string())
    }
}

/// Used when no API key is configured. Every call fails, so reports simply
/// carry no insights.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledTextGenerator;

#[async_trait]
impl TextGenerator for DisabledTextGenerator {
    async fn generate(&self, _prompt: &str, _options: GenerationOptions) -> PortResult<String> {
        Err(PortError::Unexpected(
            "text generation is disabled: OPENAI_API_KEY is not set".to_string(),
        ))
    }
}
