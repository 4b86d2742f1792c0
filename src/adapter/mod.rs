//! Environment adapters.
//!
//! This module converts each hosting model's native request/response types
//! to and from the canonical gateway context:
//! - `server`: long-lived axum process sharing one gateway
//! - `edge`: per-invocation handler building a fresh gateway per request

pub mod boundary;
pub mod edge;
pub mod server;

pub use edge::{EdgeBindings, EdgeHandler};
pub use server::{create_router, run_server, AppState};

use std::time::Instant;

use http::Method;

use crate::gateway::ResponseContext;

/// Maximum accepted inbound body size.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Emit the per-request completion line shared by both adapters.
fn log_completion(
    host: &'static str,
    request_id: &uuid::Uuid,
    method: &Method,
    path: &str,
    response: &ResponseContext,
    start: Instant,
) {
    tracing::info!(
        host,
        request_id = %request_id,
        method = %method,
        path = %path,
        status = response.status.as_u16(),
        streaming = response.is_streaming(),
        latency_ms = start.elapsed().as_millis() as u64,
        "Request completed"
    );
}
