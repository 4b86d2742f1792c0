//! Provider error taxonomy and decoding of the provider's error envelope.

use serde::Deserialize;

/// Message used when a failed response carries no readable error message.
pub const FALLBACK_ERROR_MESSAGE: &str = "OpenAI API request failed";

/// Placeholder substituted for credential material in error messages.
const REDACTED: &str = "[REDACTED]";

/// What went wrong with an outbound provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// No response at all (connect failure, reset, body read failure).
    Transport,
    /// The provider answered with a non-success status.
    ProviderRejected,
    /// The provider answered successfully but the body was not usable.
    MalformedResponse,
}

impl ProviderErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderErrorKind::Transport => "transport",
            ProviderErrorKind::ProviderRejected => "provider_rejected",
            ProviderErrorKind::MalformedResponse => "malformed_response",
        }
    }
}

/// A failed provider call. `Display` yields only the message, so it can be
/// handed to clients verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Transport, message)
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::ProviderRejected, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::MalformedResponse, message)
    }

    /// Replace every occurrence of `secret` in the message.
    pub fn redacted(mut self, secret: &str) -> Self {
        self.message = redact(&self.message, secret);
        self
    }
}

/// Replace every occurrence of `secret` in `text` with a placeholder.
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        return text.to_string();
    }
    text.replace(secret, REDACTED)
}

/// The provider's documented error shape: `{"error": {"message": "..."}}`.
#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// Decode a non-success response body into exactly one [`ProviderError`].
///
/// Uses the nested `error.message` when present and non-empty, otherwise
/// [`FALLBACK_ERROR_MESSAGE`].
pub fn decode_error_body(body: &[u8]) -> ProviderError {
    let message = serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string());

    ProviderError::rejected(message)
}
