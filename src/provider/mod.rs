//! LLM provider abstraction (§4.D/§4.F/§4.G, §16): a trait-based interface
//! over chat-completion backends, plus a structured-output layer on top of
//! it for the schematic generations the engine's reasoning components need.

pub mod anthropic;
pub mod openai;
pub mod schematic;

use crate::error::{ProviderError, ProviderResult};
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// One message in a prompt sent to a provider. Distinct from
/// [`crate::event::Event`]: this is the flattened request payload a
/// component builds right before calling the LLM, not a persisted log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
}

/// Configuration for an LLM provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ProviderConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature.clamp(0.0, 2.0);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p.clamp(0.0, 1.0));
        self
    }

    pub fn with_frequency_penalty(mut self, penalty: f32) -> Self {
        self.frequency_penalty = Some(penalty.clamp(-2.0, 2.0));
        self
    }

    pub fn with_presence_penalty(mut self, penalty: f32) -> Self {
        self.presence_penalty = Some(penalty.clamp(-2.0, 2.0));
        self
    }
}

pub type StreamChunk = ProviderResult<String>;

/// A chat-completion backend. Concrete implementations live in
/// [`openai`]/[`anthropic`]; [`schematic::SchematicGenerator`] is layered on
/// top of this to get structured output.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, messages: Vec<Message>) -> ProviderResult<String>;

    async fn complete_at_temperature(&self, messages: Vec<Message>, temperature: f32) -> ProviderResult<String> {
        let _ = temperature;
        self.complete(messages).await
    }

    async fn stream(&self, messages: Vec<Message>) -> ProviderResult<Pin<Box<dyn Stream<Item = StreamChunk> + Send>>>;

    fn name(&self) -> &str;

    fn config(&self) -> &ProviderConfig;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_config_creation() {
        let config = ProviderConfig::new("gpt-5");
        assert_eq!(config.model, "gpt-5");
        assert_eq!(config.temperature, 0.7);
        assert!(config.max_tokens.is_none());
    }

    #[test]
    fn test_provider_config_temperature_clamping() {
        let config1 = ProviderConfig::new("gpt-5").with_temperature(-0.5);
        assert_eq!(config1.temperature, 0.0);

        let config2 = ProviderConfig::new("gpt-5").with_temperature(3.0);
        assert_eq!(config2.temperature, 2.0);
    }

    #[test]
    fn test_provider_config_with_penalties() {
        let config = ProviderConfig::new("gpt-5")
            .with_frequency_penalty(0.5)
            .with_presence_penalty(0.3);

        assert_eq!(config.frequency_penalty, Some(0.5));
        assert_eq!(config.presence_penalty, Some(0.3));
    }

    #[test]
    fn test_provider_config_serialization() {
        let config = ProviderConfig::new("gpt-5").with_temperature(0.8).with_max_tokens(500);

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: ProviderConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config.model, deserialized.model);
        assert_eq!(config.temperature, deserialized.temperature);
        assert_eq!(config.max_tokens, deserialized.max_tokens);
    }

    #[test]
    fn test_message_constructors() {
        let messages = vec![
            Message::system("You are a helpful assistant"),
            Message::user("Hello"),
            Message::assistant("Hi there!"),
        ];

        assert_eq!(messages[0].role, MessageRole::System);
        assert_eq!(messages[1].role, MessageRole::User);
        assert_eq!(messages[2].content, "Hi there!");
    }
}
