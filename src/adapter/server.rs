//! Long-lived HTTP server adapter.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::response::Response;
use axum::Router;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode, Uri};
use tower_http::trace::TraceLayer;

use super::{boundary, log_completion, MAX_BODY_BYTES};
use crate::config::Config;
use crate::error::Error;
use crate::gateway::{Gateway, RequestContext};
use crate::graphql::SharedProvider;
use crate::provider::OpenAiClient;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Built once at startup and shared read-only by every request.
    pub gateway: Arc<Gateway>,
}

/// Create the axum router. Every path goes through the gateway's own dispatch.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .fallback(handle)
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
}

/// Normalize an axum request, dispatch it, and denormalize the response.
async fn handle(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4();
    let path = uri.path().to_string();

    let response = boundary::guard(state.gateway.cors(), async {
        let bytes = match body {
            Ok(bytes) => bytes,
            Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                let mut response = Error::PayloadTooLarge {
                    limit: MAX_BODY_BYTES,
                }
                .to_response();
                state.gateway.cors().apply(&mut response.headers);
                return Ok(response);
            }
            Err(rejection) => {
                return Err(Error::BadRequest(format!(
                    "Failed to read request body: {}",
                    rejection.body_text()
                )))
            }
        };
        let ctx = RequestContext::from_components(method.clone(), &uri, headers, bytes)?;
        Ok(state.gateway.dispatch(ctx).await)
    })
    .await;

    log_completion("server", &request_id, &method, &path, &response, start);
    response.into_http()
}

/// Build the process-wide gateway from configuration.
pub fn build_gateway(config: &Config) -> crate::Result<Gateway> {
    let provider_settings = config.provider.settings();
    Gateway::new(
        config.gateway_settings(),
        config.provider.api_key.clone(),
        |key| {
            let client = OpenAiClient::new(&provider_settings, key)?;
            Ok(Arc::new(client) as SharedProvider)
        },
    )
}

/// Run the HTTP server until ctrl-c.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let listen_addr = config.server.listen.clone();

    let gateway = build_gateway(&config)?;
    if !gateway.is_configured() {
        tracing::warn!(
            credential = %config.provider.credential_env,
            "Provider credential missing - /graphql and /api/chat will answer 500"
        );
    }

    let state = AppState {
        gateway: Arc::new(gateway),
    };
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, "Starting aigate server");
    tracing::info!(address = %listen_addr, "GraphQL endpoint at /graphql");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
