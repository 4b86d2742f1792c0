//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;

use aigate::adapter::{create_router, AppState};
use aigate::config::ApiKey;
use aigate::gateway::{Gateway, GatewaySettings};
use aigate::graphql::SharedProvider;
use aigate::provider::{ByteStream, Message, Provider, ProviderError};

/// In-memory provider that counts calls and records what it was asked.
#[derive(Default)]
pub struct StubProvider {
    pub calls: AtomicUsize,
    pub failure: Option<String>,
    pub stream_chunks: Vec<&'static str>,
    pub last_model: Mutex<Option<String>>,
    pub last_messages: Mutex<Vec<Message>>,
    pub last_image: Mutex<Option<(String, Option<u32>, Option<String>)>>,
}

impl StubProvider {
    pub fn replying() -> Self {
        Self::default()
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn streaming(chunks: Vec<&'static str>) -> Self {
        Self {
            stream_chunks: chunks,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record(&self) -> Result<(), ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.failure {
            Some(message) => Err(ProviderError::rejected(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Provider for StubProvider {
    async fn chat(&self, messages: &[Message], model: Option<&str>) -> Result<String, ProviderError> {
        self.record()?;
        *self.last_model.lock().unwrap() = model.map(str::to_string);
        *self.last_messages.lock().unwrap() = messages.to_vec();
        Ok("stub-reply".to_string())
    }

    async fn completion(&self, prompt: &str, _model: Option<&str>) -> Result<String, ProviderError> {
        self.record()?;
        Ok(format!("completed: {}", prompt))
    }

    async fn create_embedding(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        self.record()?;
        Ok(vec![0.1, 0.2, 0.3])
    }

    async fn generate_image(
        &self,
        prompt: &str,
        n: Option<u32>,
        size: Option<&str>,
    ) -> Result<Vec<String>, ProviderError> {
        self.record()?;
        *self.last_image.lock().unwrap() =
            Some((prompt.to_string(), n, size.map(str::to_string)));
        let count = n.unwrap_or(1) as usize;
        Ok((0..count)
            .map(|i| format!("https://images.test/{}.png", i))
            .collect())
    }

    async fn chat_stream(
        &self,
        _messages: &[Message],
        _model: Option<&str>,
    ) -> Result<ByteStream, ProviderError> {
        self.record()?;
        let chunks: Vec<Result<Bytes, std::io::Error>> = self
            .stream_chunks
            .iter()
            .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
            .collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}

/// Gateway over `stub`, configured with a dummy credential.
pub fn gateway_with(stub: Arc<StubProvider>) -> Gateway {
    Gateway::new(
        GatewaySettings::default(),
        Some(ApiKey::from("sk-test")),
        move |_key| Ok(stub as SharedProvider),
    )
    .expect("gateway")
}

/// Router over `stub`, as the server adapter would build it.
pub fn app_with(stub: Arc<StubProvider>) -> axum::Router {
    create_router(AppState {
        gateway: Arc::new(gateway_with(stub)),
    })
}

/// Router whose gateway has no credential; `stub` must never be reached.
pub fn unconfigured_app(stub: Arc<StubProvider>) -> axum::Router {
    let gateway = Gateway::new(GatewaySettings::default(), None, move |_key| {
        Ok(stub as SharedProvider)
    })
    .expect("gateway");
    create_router(AppState {
        gateway: Arc::new(gateway),
    })
}

/// Parse the response body as JSON and return (status_code, json_value).
pub async fn parse_body(response: axum::response::Response) -> (http::StatusCode, serde_json::Value) {
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), 1_048_576)
        .await
        .expect("read body");
    let json: serde_json::Value = serde_json::from_slice(&body_bytes).unwrap_or_default();
    (status, json)
}

/// JSON POST request.
pub fn post_json(path: &str, body: serde_json::Value) -> http::Request<axum::body::Body> {
    http::Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body.to_string()))
        .unwrap()
}

pub fn get(path: &str) -> http::Request<axum::body::Body> {
    http::Request::builder()
        .method("GET")
        .uri(path)
        .body(axum::body::Body::empty())
        .unwrap()
}
