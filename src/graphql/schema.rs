//! Schema roots and resolvers.
//!
//! Provider failures never leave a resolver as a GraphQL error: they are
//! logged and returned as `success: false` envelopes. Input that breaks a
//! schema rule (unknown role, empty prompt, non-positive `n`) is returned as
//! a GraphQL error instead.

use std::sync::Arc;

use async_graphql::{Context, EmptySubscription, Object, Schema};

use super::types::{
    ChatData, ChatInput, ChatResponse, CompletionData, CompletionResponse, Envelope, HealthStatus,
    ImageData, ImageGenerationInput, ImageGenerationResponse, UsageReport, WelcomeMessage,
};
use crate::provider::{resolve_chat_model, Provider};
use crate::usage;

/// Provider handle stored in the schema data.
pub type SharedProvider = Arc<dyn Provider>;

/// Compiled gateway schema.
pub type GatewaySchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

/// Build the schema around an injected provider.
///
/// The schema holds no other state, so building it once and reusing it is
/// indistinguishable from building it per request.
pub fn build_schema(provider: SharedProvider) -> GatewaySchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(provider)
        .finish()
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    /// Health check.
    async fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "OK".to_string(),
            timestamp: crate::timestamp(),
        }
    }

    /// Welcome message.
    async fn welcome(&self) -> WelcomeMessage {
        WelcomeMessage {
            message: crate::GRAPHQL_WELCOME.to_string(),
            version: crate::VERSION.to_string(),
        }
    }

    /// Estimate prompt tokens and cost for a conversation without calling the provider.
    async fn estimate_usage(&self, input: ChatInput) -> async_graphql::Result<UsageReport> {
        let messages = input.to_messages()?;
        let model = resolve_chat_model(input.model.as_deref()).to_string();
        let tokens = usage::estimate_messages(&messages);

        Ok(UsageReport {
            tokens,
            cost: usage::estimate_cost(tokens, &model).into(),
            model,
        })
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Send chat messages to the provider.
    async fn chat(
        &self,
        ctx: &Context<'_>,
        input: ChatInput,
    ) -> async_graphql::Result<ChatResponse> {
        let messages = input.to_messages()?;
        let provider = ctx.data::<SharedProvider>()?;
        let model = resolve_chat_model(input.model.as_deref());

        match provider.chat(&messages, input.model.as_deref()).await {
            Ok(reply) => Ok(Envelope::ok(
                "Chat succeeded",
                ChatData {
                    reply,
                    model: model.to_string(),
                    timestamp: crate::timestamp(),
                },
            )),
            Err(e) => {
                tracing::error!(kind = e.kind.as_str(), error = %e, "Chat failed");
                Ok(Envelope::failure(e.to_string()))
            }
        }
    }

    /// Generate a text completion.
    async fn completion(
        &self,
        ctx: &Context<'_>,
        prompt: String,
    ) -> async_graphql::Result<CompletionResponse> {
        let provider = ctx.data::<SharedProvider>()?;

        match provider.completion(&prompt, None).await {
            Ok(text) => Ok(Envelope::ok(
                "Completion succeeded",
                CompletionData {
                    text,
                    timestamp: crate::timestamp(),
                },
            )),
            Err(e) => {
                tracing::error!(kind = e.kind.as_str(), error = %e, "Completion failed");
                Ok(Envelope::failure(e.to_string()))
            }
        }
    }

    /// Generate images from a prompt.
    async fn generate_image(
        &self,
        ctx: &Context<'_>,
        input: ImageGenerationInput,
    ) -> async_graphql::Result<ImageGenerationResponse> {
        if input.prompt.trim().is_empty() {
            return Err("prompt must not be empty".into());
        }
        let n = match input.n {
            Some(n) if n < 1 => return Err("n must be at least 1".into()),
            Some(n) => Some(n as u32),
            None => None,
        };

        let provider = ctx.data::<SharedProvider>()?;

        match provider
            .generate_image(&input.prompt, n, input.size.as_deref())
            .await
        {
            Ok(urls) => Ok(Envelope::ok(
                "Image generated",
                ImageData {
                    urls,
                    timestamp: crate::timestamp(),
                },
            )),
            Err(e) => {
                tracing::error!(kind = e.kind.as_str(), error = %e, "Image generation failed");
                Ok(Envelope::failure(e.to_string()))
            }
        }
    }
}
