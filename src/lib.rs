//! aigate - REST and GraphQL gateway for generative-AI providers
//!
//! This library provides the request pipeline shared by the long-lived server
//! and the per-invocation edge handler: configuration, the provider client,
//! the GraphQL engine, routing, and usage estimation.

pub mod adapter;
pub mod config;
pub mod error;
pub mod gateway;
pub mod graphql;
pub mod provider;
pub mod usage;

pub use config::Config;
pub use error::{Error, Result};

/// Crate version reported by the welcome endpoints.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Welcome text for `GET /`.
pub const WELCOME: &str = "Welcome to the aigate API";

/// Welcome text for the GraphQL `welcome` query.
pub const GRAPHQL_WELCOME: &str = "Welcome to the aigate GraphQL API";

/// Current instant as an ISO-8601 / RFC 3339 UTC timestamp with microseconds.
pub(crate) fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
