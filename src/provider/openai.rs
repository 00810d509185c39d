//! OpenAI provider implementation, backed by `async-openai`.

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{LLMProvider, Message, MessageRole, ProviderConfig, StreamChunk};
use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestAssistantMessage, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use futures::Stream;
use futures::StreamExt;
use std::pin::Pin;
use tracing::{debug, info, trace, warn};

pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    config: ProviderConfig,
}

impl OpenAIProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let openai_config = OpenAIConfig::new().with_api_key(api_key);
        let client = Client::with_config(openai_config);

        Self {
            client,
            config: ProviderConfig::new("gpt-4"),
        }
    }

    pub fn from_env() -> ProviderResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ProviderError::Api("OPENAI_API_KEY environment variable not set".to_string()))?;

        Ok(Self::new(api_key))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config = self.config.with_temperature(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config = self.config.with_max_tokens(max_tokens);
        self
    }

    fn convert_messages(&self, messages: Vec<Message>) -> Vec<ChatCompletionRequestMessage> {
        messages
            .into_iter()
            .map(|m| match m.role {
                MessageRole::System => {
                    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                        content:
                            async_openai::types::ChatCompletionRequestSystemMessageContent::Text(
                                m.content,
                            ),
                        name: None,
                    })
                }
                MessageRole::User => {
                    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                        content: async_openai::types::ChatCompletionRequestUserMessageContent::Text(
                            m.content,
                        ),
                        name: None,
                    })
                }
                MessageRole::Assistant => {
                    ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                        content: Some(
                            async_openai::types::ChatCompletionRequestAssistantMessageContent::Text(
                                m.content,
                            ),
                        ),
                        name: None,
                        tool_calls: None,
                        refusal: None,
                        #[allow(deprecated)]
                        function_call: None,
                    })
                }
                MessageRole::Tool => {
                    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                        content:
                            async_openai::types::ChatCompletionRequestSystemMessageContent::Text(
                                format!("Tool result: {}", m.content),
                            ),
                        name: None,
                    })
                }
            })
            .collect()
    }

    async fn complete_with_temperature(&self, messages: Vec<Message>, temperature: f32) -> ProviderResult<String> {
        info!(model = %self.config.model, message_count = messages.len(), "requesting openai completion");

        let openai_messages = self.convert_messages(messages);

        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder
            .model(&self.config.model)
            .messages(openai_messages)
            .temperature(temperature);

        if let Some(max_tokens) = self.config.max_tokens {
            request_builder.max_tokens(max_tokens);
        }
        if let Some(top_p) = self.config.top_p {
            request_builder.top_p(top_p);
        }
        if let Some(frequency_penalty) = self.config.frequency_penalty {
            request_builder.frequency_penalty(frequency_penalty);
        }
        if let Some(presence_penalty) = self.config.presence_penalty {
            request_builder.presence_penalty(presence_penalty);
        }

        let request = request_builder
            .build()
            .map_err(|e| ProviderError::RequestBuild(e.to_string()))?;

        trace!("sending request to openai");

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!(error = %e, "openai api error");
            ProviderError::Api(e.to_string())
        })?;

        let message = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(ProviderError::EmptyResponse)?;

        debug!(response_length = message.len(), "openai completion successful");

        Ok(message)
    }
}

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn complete(&self, messages: Vec<Message>) -> ProviderResult<String> {
        self.complete_with_temperature(messages, self.config.temperature).await
    }

    async fn complete_at_temperature(&self, messages: Vec<Message>, temperature: f32) -> ProviderResult<String> {
        self.complete_with_temperature(messages, temperature).await
    }

    async fn stream(&self, messages: Vec<Message>) -> ProviderResult<Pin<Box<dyn Stream<Item = StreamChunk> + Send>>> {
        info!(model = %self.config.model, message_count = messages.len(), "requesting openai streaming completion");

        let openai_messages = self.convert_messages(messages);

        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder
            .model(&self.config.model)
            .messages(openai_messages)
            .temperature(self.config.temperature);

        if let Some(max_tokens) = self.config.max_tokens {
            request_builder.max_tokens(max_tokens);
        }
        if let Some(top_p) = self.config.top_p {
            request_builder.top_p(top_p);
        }

        let request = request_builder
            .build()
            .map_err(|e| ProviderError::RequestBuild(e.to_string()))?;

        trace!("sending streaming request to openai");

        let stream = self.client.chat().create_stream(request).await.map_err(|e| {
            warn!(error = %e, "openai streaming error");
            ProviderError::Api(e.to_string())
        })?;

        let mapped_stream = stream.map(|result| {
            result
                .map_err(|e| ProviderError::Api(e.to_string()))
                .and_then(|response| {
                    response
                        .choices
                        .first()
                        .and_then(|choice| choice.delta.content.clone())
                        .ok_or(ProviderError::EmptyResponse)
                })
        });

        Ok(Box::pin(mapped_stream))
    }

    fn name(&self) -> &str {
        "OpenAI"
    }

    fn config(&self) -> &ProviderConfig {
        &self.config
    }
}
