//! Per-invocation edge adapter.
//!
//! Every call to [`EdgeHandler::fetch`] builds a fresh [`Gateway`] (and with
//! it a fresh provider client and schema) from that invocation's bindings.
//! Nothing is shared between invocations.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use bytes::Bytes;
use http::{Method, StatusCode};

use super::{boundary, log_completion};
use crate::config::ApiKey;
use crate::gateway::{CorsPolicy, Gateway, GatewaySettings, RequestContext, ResponseContext};
use crate::graphql::SharedProvider;
use crate::provider::{OpenAiClient, ProviderSettings};

/// Binding holding the provider credential.
pub const CREDENTIAL_BINDING: &str = "OPENAI_API_KEY";
/// Binding overriding the provider base URL.
pub const BASE_URL_BINDING: &str = "OPENAI_BASE_URL";
/// Binding overriding the allowed CORS origin.
pub const ORIGIN_BINDING: &str = "CORS_ORIGIN";
/// Binding setting a provider timeout in seconds.
pub const TIMEOUT_BINDING: &str = "OPENAI_TIMEOUT_SECS";

/// Key/value bindings the host passes to a single invocation.
#[derive(Debug, Clone, Default)]
pub struct EdgeBindings(HashMap<String, String>);

impl EdgeBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// Collect the known bindings from the process environment.
    pub fn from_env() -> Self {
        [
            CREDENTIAL_BINDING,
            BASE_URL_BINDING,
            ORIGIN_BINDING,
            TIMEOUT_BINDING,
        ]
        .into_iter()
        .filter_map(|key| std::env::var(key).ok().map(|value| (key, value)))
        .fold(Self::new(), |bindings, (key, value)| bindings.with(key, value))
    }

    fn provider_settings(&self) -> ProviderSettings {
        let mut settings = ProviderSettings::default();
        if let Some(base_url) = self.get(BASE_URL_BINDING) {
            settings.base_url = base_url.to_string();
        }
        settings.timeout = self
            .get(TIMEOUT_BINDING)
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        settings
    }

    fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            credential_name: CREDENTIAL_BINDING.to_string(),
            allowed_origin: self.get(ORIGIN_BINDING).unwrap_or("*").to_string(),
        }
    }
}

/// Builds the provider for one invocation from its settings and credential.
pub type Connector =
    Arc<dyn Fn(&ProviderSettings, ApiKey) -> crate::Result<SharedProvider> + Send + Sync>;

/// Stateless per-invocation request handler.
#[derive(Clone)]
pub struct EdgeHandler {
    connect: Connector,
}

impl Default for EdgeHandler {
    fn default() -> Self {
        Self::with_connector(Arc::new(
            |settings: &ProviderSettings, key: ApiKey| -> crate::Result<SharedProvider> {
                let client = OpenAiClient::new(settings, key)?;
                Ok(Arc::new(client))
            },
        ))
    }
}

impl EdgeHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom provider constructor instead of [`OpenAiClient`].
    pub fn with_connector(connect: Connector) -> Self {
        Self { connect }
    }

    /// Handle one invocation. The returned body may still be streaming.
    pub async fn fetch(
        &self,
        request: http::Request<Bytes>,
        bindings: &EdgeBindings,
    ) -> http::Response<Body> {
        let start = Instant::now();
        let request_id = uuid::Uuid::new_v4();
        let method = request.method().clone();
        let path = request.uri().path().to_string();
        let cors = CorsPolicy::new(bindings.get(ORIGIN_BINDING).unwrap_or("*"));

        // Preflights need neither the body nor a provider
        if method == Method::OPTIONS {
            let mut response = ResponseContext::empty(StatusCode::NO_CONTENT);
            cors.apply(&mut response.headers);
            log_completion("edge", &request_id, &method, &path, &response, start);
            return response.into_http();
        }

        let response = boundary::guard(&cors, async {
            let provider_settings = bindings.provider_settings();
            let credential = bindings.get(CREDENTIAL_BINDING).map(ApiKey::from);
            let gateway = Gateway::new(bindings.gateway_settings(), credential, |key| {
                (self.connect)(&provider_settings, key)
            })?;

            let (parts, body) = request.into_parts();
            let ctx = RequestContext::from_parts(&parts, body)?;
            Ok(gateway.dispatch(ctx).await)
        })
        .await;

        log_completion("edge", &request_id, &method, &path, &response, start);
        response.into_http()
    }
}
