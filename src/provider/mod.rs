//! Provider client module.
//!
//! This module wraps the external generative-AI API behind the [`Provider`]
//! trait and normalizes its failures into [`ProviderError`].

mod client;
pub mod error;
pub mod types;

use bytes::Bytes;
use futures::stream::BoxStream;

pub use client::{
    resolve_chat_model, OpenAiClient, Provider, ProviderSettings, COMPLETION_MAX_TOKENS,
    DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_COMPLETION_MODEL, DEFAULT_IMAGE_COUNT,
    DEFAULT_IMAGE_SIZE, EMBEDDING_MODEL, IMAGE_MODEL,
};
pub use error::{ProviderError, ProviderErrorKind, FALLBACK_ERROR_MESSAGE};
pub use types::{InvalidRole, Message, Role};

/// Incrementally produced response body bytes.
pub type ByteStream = BoxStream<'static, Result<Bytes, std::io::Error>>;
