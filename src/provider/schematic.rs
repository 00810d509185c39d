//! Structured-output layer on top of [`super::LLMProvider`] (§16).
//!
//! The proposer, tool caller and message generator all need the model to
//! return a typed JSON object rather than free text. This mirrors the
//! original's `SchematicGenerator[T]`: wrap a provider, ask it for JSON, and
//! parse the result into `T`, retrying at alternate temperatures on a schema
//! failure (§4.D/§4.F/§4.G, §7's "LLM schema/validation error" row).

use crate::error::ProviderError;
use crate::provider::{LLMProvider, Message};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default retry temperatures for schematic generation (§4.G.4, §12).
pub const DEFAULT_RETRY_TEMPERATURES: [f32; 3] = [0.5, 1.0, 0.1];

/// Generates a `T` from a prompt, parsing the provider's completion as JSON
/// and retrying at alternate temperatures when parsing fails.
pub struct SchematicGenerator<T> {
    provider: Arc<dyn LLMProvider>,
    retry_temperatures: [f32; 3],
    _marker: std::marker::PhantomData<T>,
}

impl<T: DeserializeOwned> SchematicGenerator<T> {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            retry_temperatures: DEFAULT_RETRY_TEMPERATURES,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn with_retry_temperatures(mut self, temperatures: [f32; 3]) -> Self {
        self.retry_temperatures = temperatures;
        self
    }

    /// Extracts a JSON object from `text`, tolerating surrounding prose or
    /// markdown code fences the way an LLM completion often wraps its JSON.
    fn extract_json(text: &str) -> &str {
        let trimmed = text.trim();
        let without_fence = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .unwrap_or(trimmed)
            .trim_end_matches("```")
            .trim();

        let start = without_fence.find(['{', '[']);
        let end = without_fence.rfind(['}', ']']);
        match (start, end) {
            (Some(s), Some(e)) if e >= s => &without_fence[s..=e],
            _ => without_fence,
        }
    }

    /// Runs `messages` through the provider up to 3 times at
    /// `self.retry_temperatures`, parsing each completion as `T`. Returns the
    /// last parse/provider error if every attempt fails.
    pub async fn generate(&self, messages: Vec<Message>) -> Result<T, ProviderError> {
        let mut last_error = None;

        for (attempt, temperature) in self.retry_temperatures.iter().enumerate() {
            let completion = match self
                .provider
                .complete_at_temperature(messages.clone(), *temperature)
                .await
            {
                Ok(text) => text,
                Err(err) => {
                    warn!(attempt, %err, "schematic generation provider call failed");
                    last_error = Some(err);
                    continue;
                }
            };

            let json_slice = Self::extract_json(&completion);
            match serde_json::from_str::<T>(json_slice) {
                Ok(value) => {
                    debug!(attempt, "schematic generation succeeded");
                    return Ok(value);
                }
                Err(err) => {
                    warn!(attempt, %err, "schematic generation output failed to parse");
                    last_error = Some(ProviderError::Api(format!(
                        "schema validation failed on attempt {attempt}: {err}"
                    )));
                }
            }
        }

        Err(last_error.unwrap_or(ProviderError::EmptyResponse))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ProviderConfig, ProviderResult, StreamChunk};
    use async_trait::async_trait;
    use futures::Stream;
    use serde::Deserialize;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Scored {
        score: u8,
    }

    struct ScriptedProvider {
        responses: Vec<&'static str>,
        call_count: AtomicUsize,
        config: ProviderConfig,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<&'static str>) -> Self {
            Self {
                responses,
                call_count: AtomicUsize::new(0),
                config: ProviderConfig::new("mock"),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(&self, messages: Vec<Message>) -> ProviderResult<String> {
            self.complete_at_temperature(messages, self.config.temperature).await
        }

        async fn complete_at_temperature(&self, _messages: Vec<Message>, _temperature: f32) -> ProviderResult<String> {
            let index = self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(self.responses[index.min(self.responses.len() - 1)].to_string())
        }

        async fn stream(&self, _messages: Vec<Message>) -> ProviderResult<Pin<Box<dyn Stream<Item = StreamChunk> + Send>>> {
            unimplemented!("not exercised in these tests")
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn config(&self) -> &ProviderConfig {
            &self.config
        }
    }

    #[tokio::test]
    async fn test_generate_parses_clean_json() {
        let provider = Arc::new(ScriptedProvider::new(vec![r#"{"score": 8}"#]));
        let generator: SchematicGenerator<Scored> = SchematicGenerator::new(provider);

        let result = generator.generate(vec![Message::user("score this")]).await.unwrap();
        assert_eq!(result.score, 8);
    }

    #[tokio::test]
    async fn test_generate_strips_markdown_fence() {
        let provider = Arc::new(ScriptedProvider::new(vec!["```json\n{\"score\": 9}\n```"]));
        let generator: SchematicGenerator<Scored> = SchematicGenerator::new(provider);

        let result = generator.generate(vec![Message::user("score this")]).await.unwrap();
        assert_eq!(result.score, 9);
    }

    #[tokio::test]
    async fn test_generate_retries_on_schema_failure() {
        let provider = Arc::new(ScriptedProvider::new(vec!["not json at all", r#"{"score": 5}"#]));
        let generator: SchematicGenerator<Scored> = SchematicGenerator::new(provider);

        let result = generator.generate(vec![Message::user("score this")]).await.unwrap();
        assert_eq!(result.score, 5);
    }

    #[tokio::test]
    async fn test_generate_fails_after_exhausting_retries() {
        let provider = Arc::new(ScriptedProvider::new(vec!["garbage", "still garbage", "nope"]));
        let generator: SchematicGenerator<Scored> = SchematicGenerator::new(provider);

        let result = generator.generate(vec![Message::user("score this")]).await;
        assert!(result.is_err());
    }
}
