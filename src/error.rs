//! Error types for aigate.

use http::StatusCode;

use crate::gateway::ResponseContext;
use crate::provider::ProviderError;

/// Result type alias for aigate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for aigate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{name} not configured")]
    MissingCredential { name: String },

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::MissingCredential { .. } | Error::Provider(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Canonical `{error: message}` response for this error.
    pub fn to_response(&self) -> ResponseContext {
        ResponseContext::json(
            self.status(),
            &serde_json::json!({ "error": self.to_string() }),
        )
    }
}
