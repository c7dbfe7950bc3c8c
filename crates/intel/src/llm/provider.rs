use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::policy::ApiConfiguration;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("rate limit exceeded")]
    RateLimited,

    #[error("generation backend overloaded")]
    Overloaded,

    #[error("generation API error: {0}")]
    Api(String),

    #[error("network error reaching generation backend: {0}")]
    Network(String),

    #[error("empty response from generation backend")]
    EmptyResponse,
}

impl GenerationError {
    /// Only the rate-limit/overload class is worth retrying; everything
    /// else is surfaced immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Overloaded)
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub payload: String,
    pub temperature: f32,
    pub top_p: f32,
}

#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub content: String,
    pub model: String,
}

/// Text-completion service boundary. The backend itself is an external
/// collaborator; this trait is all the pipeline knows about it.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError>;

    fn model_name(&self) -> &str;
}

/// Chat-completions backend speaking the OpenAI wire format, including
/// compatible third-party endpoints via a base-url override.
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIProvider {
    pub fn new(api: &ApiConfiguration) -> Result<Self, GenerationError> {
        let api_key = if api.api_key.trim().is_empty() {
            std::env::var("VANTAGE_API_KEY")
                .map_err(|_| GenerationError::Api("no API key configured".to_string()))?
        } else {
            api.api_key.clone()
        };

        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = &api.base_url {
            config = config.with_api_base(base_url);
        }

        Ok(Self {
            client: Client::with_config(config),
            model: api.model_name.clone(),
        })
    }

    fn classify(error: OpenAIError) -> GenerationError {
        let message = error.to_string();
        let lower = message.to_lowercase();
        if lower.contains("rate") || lower.contains("429") {
            GenerationError::RateLimited
        } else if lower.contains("overload")
            || lower.contains("unavailable")
            || lower.contains("503")
        {
            GenerationError::Overloaded
        } else if matches!(error, OpenAIError::Reqwest(_)) {
            GenerationError::Network(message)
        } else {
            GenerationError::Api(message)
        }
    }
}

#[async_trait]
impl GenerationProvider for OpenAIProvider {
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResponse, GenerationError> {
        debug!(model = %self.model, "sending generation request");

        let system_message = ChatCompletionRequestSystemMessage {
            content: request.system_instruction.clone(),
            ..Default::default()
        };
        let user_message = ChatCompletionRequestUserMessage {
            content: async_openai::types::ChatCompletionRequestUserMessageContent::Text(
                request.payload.clone(),
            ),
            ..Default::default()
        };

        let api_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestMessage::System(system_message),
                ChatCompletionRequestMessage::User(user_message),
            ])
            .temperature(request.temperature)
            .top_p(request.top_p)
            .build()
            .map_err(|e| GenerationError::Api(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(api_request)
            .await
            .map_err(Self::classify)?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or(GenerationError::EmptyResponse)?;

        debug!(model = %response.model, "generation response received");

        Ok(GenerationResponse {
            content,
            model: response.model,
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
