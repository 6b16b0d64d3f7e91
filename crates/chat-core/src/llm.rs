use crate::config::ProviderConfig;
use crate::error::ChatError;

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionResponseMessage, ChatCompletionTool,
    CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use std::time::Duration;

/// Client for an OpenAI-compatible chat completion endpoint.
pub struct ChatModel {
    client: Client<OpenAIConfig>,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ChatModel {
    pub fn new(config: &ProviderConfig, api_key: &str) -> Result<Self, ChatError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let openai_config = OpenAIConfig::new()
            .with_api_base(&config.api_base)
            .with_api_key(api_key);

        // async-openai retries rate-limited requests by default; a failed
        // turn is reported to the user instead.
        let no_retry = backoff::ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(Duration::ZERO))
            .build();

        let client = Client::with_config(openai_config)
            .with_http_client(http_client)
            .with_backoff(no_retry);

        Ok(Self {
            client,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// One completion round trip. Returns the first choice's message.
    pub async fn complete(
        &self,
        messages: Vec<ChatCompletionRequestMessage>,
        tools: &[ChatCompletionTool],
    ) -> Result<ChatCompletionResponseMessage, ChatError> {
        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens);
        if !tools.is_empty() {
            request_builder.tools(tools.to_vec());
        }
        let request = request_builder
            .build()
            .map_err(|e| ChatError::Provider(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| ChatError::Provider(e.to_string()))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| ChatError::Provider("No choices in response".into()))
    }
}
