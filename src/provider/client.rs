//! Provider capability and the OpenAI-compatible HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::error::{decode_error_body, redact, ProviderError};
use super::types::{
    ChatCompletionRequest, ChatCompletionResponse, CompletionRequest, CompletionResponse,
    EmbeddingRequest, EmbeddingResponse, ImageRequest, ImageResponse, Message,
};
use super::ByteStream;
use crate::config::ApiKey;

/// Chat model used when the caller names none.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
/// Completion model used when the caller names none.
pub const DEFAULT_COMPLETION_MODEL: &str = "gpt-3.5-turbo-instruct";
/// Generation-length cap for text completions.
pub const COMPLETION_MAX_TOKENS: u32 = 1000;
pub const EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const IMAGE_MODEL: &str = "dall-e-3";
pub const DEFAULT_IMAGE_COUNT: u32 = 1;
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Resolve an optional chat model name to the one actually sent.
pub fn resolve_chat_model(model: Option<&str>) -> &str {
    model.unwrap_or(DEFAULT_CHAT_MODEL)
}

/// Uniform capability over a generative-AI provider.
///
/// Every method performs at most one outbound call. Implementations hold no
/// mutable state, so one instance may serve many requests concurrently.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Chat completion; returns the assistant reply text.
    async fn chat(&self, messages: &[Message], model: Option<&str>) -> Result<String, ProviderError>;

    /// Text completion; returns the generated text.
    async fn completion(&self, prompt: &str, model: Option<&str>) -> Result<String, ProviderError>;

    async fn create_embedding(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// Image generation; returns one URL per generated image.
    async fn generate_image(
        &self,
        prompt: &str,
        n: Option<u32>,
        size: Option<&str>,
    ) -> Result<Vec<String>, ProviderError>;

    /// Streaming chat completion; yields the provider's raw server-sent events.
    async fn chat_stream(
        &self,
        _messages: &[Message],
        _model: Option<&str>,
    ) -> Result<ByteStream, ProviderError> {
        Err(ProviderError::rejected(
            "Streaming is not supported by this provider",
        ))
    }
}

/// Connection settings for [`OpenAiClient`].
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Base URL of an OpenAI-compatible API, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

/// [`Provider`] backed by the OpenAI HTTP API.
///
/// The credential is passed in by the caller and never read from the
/// environment here.
pub struct OpenAiClient {
    http: Client,
    base_url: String,
    api_key: ApiKey,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key)
            .finish()
    }
}

impl OpenAiClient {
    pub fn new(settings: &ProviderSettings, api_key: ApiKey) -> Result<Self, ProviderError> {
        let mut builder = Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ProviderError::transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Send one POST and turn any failure into a redacted [`ProviderError`].
    async fn send<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ProviderError> {
        let secret = self.api_key.expose_secret();
        let url = self.endpoint(path);

        let response = self
            .http
            .post(&url)
            .bearer_auth(secret)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                let message = redact(&e.to_string(), secret);
                tracing::error!(error = %message, endpoint = %path, "Failed to reach provider");
                ProviderError::transport(message)
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.bytes().await.unwrap_or_default();
        tracing::error!(
            status = %status,
            endpoint = %path,
            body = %redact(&String::from_utf8_lossy(&body), secret),
            "Provider returned error"
        );
        Err(decode_error_body(&body).redacted(secret))
    }

    /// Send one POST and decode the success body as `R`.
    async fn call<B, R>(&self, path: &str, body: &B) -> Result<R, ProviderError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let secret = self.api_key.expose_secret();
        let response = self.send(path, body).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::transport(redact(&e.to_string(), secret)))?;

        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::error!(error = %e, endpoint = %path, "Failed to parse provider response");
            ProviderError::malformed(format!("Failed to parse provider response: {}", e))
        })
    }
}

#[async_trait]
impl Provider for OpenAiClient {
    async fn chat(&self, messages: &[Message], model: Option<&str>) -> Result<String, ProviderError> {
        let model = resolve_chat_model(model);
        tracing::debug!(model = %model, messages = messages.len(), "Sending chat completion");

        let response: ChatCompletionResponse = self
            .call(
                "chat/completions",
                &ChatCompletionRequest {
                    model,
                    messages,
                    stream: false,
                },
            )
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::malformed("Provider response contained no chat choices"))
    }

    async fn completion(&self, prompt: &str, model: Option<&str>) -> Result<String, ProviderError> {
        let model = model.unwrap_or(DEFAULT_COMPLETION_MODEL);
        tracing::debug!(model = %model, "Sending text completion");

        let response: CompletionResponse = self
            .call(
                "completions",
                &CompletionRequest {
                    model,
                    prompt,
                    max_tokens: COMPLETION_MAX_TOKENS,
                },
            )
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.text)
            .ok_or_else(|| {
                ProviderError::malformed("Provider response contained no completion choices")
            })
    }

    async fn create_embedding(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let response: EmbeddingResponse = self
            .call(
                "embeddings",
                &EmbeddingRequest {
                    model: EMBEDDING_MODEL,
                    input: text,
                },
            )
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .ok_or_else(|| ProviderError::malformed("Provider response contained no embedding"))
    }

    async fn generate_image(
        &self,
        prompt: &str,
        n: Option<u32>,
        size: Option<&str>,
    ) -> Result<Vec<String>, ProviderError> {
        let n = n.unwrap_or(DEFAULT_IMAGE_COUNT);
        let size = size.unwrap_or(DEFAULT_IMAGE_SIZE);
        tracing::debug!(n, size = %size, "Sending image generation");

        let response: ImageResponse = self
            .call(
                "images/generations",
                &ImageRequest {
                    model: IMAGE_MODEL,
                    prompt,
                    n,
                    size,
                },
            )
            .await?;

        response
            .data
            .into_iter()
            .map(|image| {
                image
                    .url
                    .ok_or_else(|| ProviderError::malformed("Generated image has no URL"))
            })
            .collect()
    }

    async fn chat_stream(
        &self,
        messages: &[Message],
        model: Option<&str>,
    ) -> Result<ByteStream, ProviderError> {
        let model = resolve_chat_model(model);
        tracing::debug!(model = %model, messages = messages.len(), "Sending streaming chat completion");

        let response = self
            .send(
                "chat/completions",
                &ChatCompletionRequest {
                    model,
                    messages,
                    stream: true,
                },
            )
            .await?;

        let stream = response.bytes_stream().map(|chunk| {
            if let Err(ref e) = chunk {
                tracing::error!(error = %e, "Error streaming from provider");
            }
            chunk.map_err(std::io::Error::other)
        });

        Ok(stream.boxed())
    }
}
