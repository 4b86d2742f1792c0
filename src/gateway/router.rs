//! Protocol router: dispatch of canonical requests by method and exact path.

use http::{Method, StatusCode};
use serde::Deserialize;

use super::context::{RequestContext, ResponseContext};
use super::cors::CorsPolicy;
use crate::config::ApiKey;
use crate::error::{Error, Result};
use crate::graphql::{self, GatewaySchema, SharedProvider};
use crate::provider::{resolve_chat_model, Message};
use crate::usage;

/// Per-deployment settings the router needs besides the credential.
#[derive(Debug, Clone)]
pub struct GatewaySettings {
    /// Name reported when the credential is missing, e.g. `OPENAI_API_KEY`.
    pub credential_name: String,
    /// Value for `Access-Control-Allow-Origin`.
    pub allowed_origin: String,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            credential_name: crate::config::DEFAULT_CREDENTIAL_ENV.to_string(),
            allowed_origin: "*".to_string(),
        }
    }
}

/// Provider-backed half of the gateway; only exists when a credential does.
struct Backend {
    provider: SharedProvider,
    schema: GatewaySchema,
}

/// Body of `POST /api/chat`.
#[derive(Debug, Deserialize)]
struct ChatRequestBody {
    #[serde(default)]
    messages: Vec<Message>,
    model: Option<String>,
    #[serde(default)]
    stream: bool,
}

/// Host-independent request pipeline.
///
/// Immutable after construction: it can be shared behind an `Arc` across
/// concurrent requests or built fresh for a single request.
pub struct Gateway {
    credential_name: String,
    cors: CorsPolicy,
    backend: Option<Backend>,
}

impl Gateway {
    /// Build a gateway. `connect` turns the credential into a provider and is
    /// only called when a credential is present.
    pub fn new<F>(settings: GatewaySettings, credential: Option<ApiKey>, connect: F) -> Result<Self>
    where
        F: FnOnce(ApiKey) -> Result<SharedProvider>,
    {
        let backend = match credential.filter(|key| !key.expose_secret().is_empty()) {
            Some(key) => {
                let provider = connect(key)?;
                let schema = graphql::build_schema(provider.clone());
                Some(Backend { provider, schema })
            }
            None => None,
        };

        Ok(Self {
            credential_name: settings.credential_name,
            cors: CorsPolicy::new(&settings.allowed_origin),
            backend,
        })
    }

    /// Whether provider-backed endpoints can be served.
    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// CORS policy applied to every response.
    pub fn cors(&self) -> &CorsPolicy {
        &self.cors
    }

    /// Route one request and attach CORS headers to whatever comes back.
    pub async fn dispatch(&self, ctx: RequestContext) -> ResponseContext {
        let mut response = self.route(&ctx).await;
        self.cors.apply(&mut response.headers);
        response
    }

    async fn route(&self, ctx: &RequestContext) -> ResponseContext {
        if ctx.method == Method::OPTIONS {
            return ResponseContext::empty(StatusCode::NO_CONTENT);
        }

        match (&ctx.method, ctx.path.as_str()) {
            (&Method::GET, "/health") => health(),
            (&Method::GET, "/") => welcome(),
            (&Method::GET, "/graphql") | (&Method::POST, "/graphql") => match self.backend() {
                Ok(backend) => graphql::execute_http(&backend.schema, ctx).await,
                Err(e) => e.to_response(),
            },
            (&Method::POST, "/api/chat") => match self.backend() {
                Ok(backend) => chat(backend.provider.clone(), ctx).await,
                Err(e) => e.to_response(),
            },
            _ => not_found(&ctx.path),
        }
    }

    /// The provider-backed half, or the missing-credential error.
    fn backend(&self) -> Result<&Backend> {
        self.backend.as_ref().ok_or_else(|| {
            tracing::warn!(credential = %self.credential_name, "Provider endpoint hit without credential");
            Error::MissingCredential {
                name: self.credential_name.clone(),
            }
        })
    }
}

fn health() -> ResponseContext {
    ResponseContext::json(
        StatusCode::OK,
        &serde_json::json!({
            "status": "OK",
            "timestamp": crate::timestamp(),
        }),
    )
}

fn welcome() -> ResponseContext {
    ResponseContext::json(
        StatusCode::OK,
        &serde_json::json!({
            "message": crate::WELCOME,
            "version": crate::VERSION,
            "endpoints": {
                "graphql": "/graphql",
                "health": "/health",
                "chat": "/api/chat",
            },
        }),
    )
}

fn not_found(path: &str) -> ResponseContext {
    ResponseContext::json(
        StatusCode::NOT_FOUND,
        &serde_json::json!({
            "error": "Not Found",
            "path": path,
        }),
    )
}

fn chat_failure(status: StatusCode, message: &str) -> ResponseContext {
    ResponseContext::json(
        status,
        &serde_json::json!({
            "success": false,
            "error": message,
        }),
    )
}

/// Handle `POST /api/chat`.
async fn chat(provider: SharedProvider, ctx: &RequestContext) -> ResponseContext {
    let body: ChatRequestBody = match ctx.json() {
        Ok(body) => body,
        Err(e) => {
            return chat_failure(
                StatusCode::BAD_REQUEST,
                &format!("Invalid chat request: {}", e),
            )
        }
    };

    let model = resolve_chat_model(body.model.as_deref());
    let tokens = usage::estimate_messages(&body.messages);
    tracing::debug!(
        model = %model,
        messages = body.messages.len(),
        estimated_tokens = tokens,
        estimated_cost = usage::estimate_cost(tokens, model).total,
        stream = body.stream,
        "Received chat request"
    );

    if body.stream {
        return match provider
            .chat_stream(&body.messages, body.model.as_deref())
            .await
        {
            Ok(stream) => ResponseContext::stream(StatusCode::OK, "text/event-stream", stream),
            Err(e) => {
                tracing::error!(kind = e.kind.as_str(), error = %e, "Streaming chat failed");
                chat_failure(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
            }
        };
    }

    match provider.chat(&body.messages, body.model.as_deref()).await {
        Ok(reply) => ResponseContext::json(
            StatusCode::OK,
            &serde_json::json!({
                "success": true,
                "data": {
                    "reply": reply,
                    "timestamp": crate::timestamp(),
                },
            }),
        ),
        Err(e) => {
            tracing::error!(kind = e.kind.as_str(), error = %e, "Chat failed");
            chat_failure(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string())
        }
    }
}

