//! Top-level boundary around request adaptation.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use http::StatusCode;

use crate::error::Result;
use crate::gateway::{CorsPolicy, ResponseContext};

/// Run one request's adaptation and dispatch, turning any error or panic into
/// a well-formed 500 response.
pub async fn guard<F>(cors: &CorsPolicy, adapt: F) -> ResponseContext
where
    F: Future<Output = Result<ResponseContext>>,
{
    match AssertUnwindSafe(adapt).catch_unwind().await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Request failed before a response was produced");
            internal_error(cors, &e.to_string())
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(panic = %message, "Request handler panicked");
            internal_error(cors, &message)
        }
    }
}

fn internal_error(cors: &CorsPolicy, message: &str) -> ResponseContext {
    let mut response = ResponseContext::json(
        StatusCode::INTERNAL_SERVER_ERROR,
        &serde_json::json!({
            "error": "Internal Server Error",
            "message": message,
        }),
    );
    cors.apply(&mut response.headers);
    response
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unexpected panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::gateway::ResponseBody;

    fn body_json(response: &ResponseContext) -> serde_json::Value {
        match &response.body {
            ResponseBody::Full(bytes) => serde_json::from_slice(bytes).unwrap(),
            ResponseBody::Stream(_) => panic!("expected full body"),
        }
    }

    #[tokio::test]
    async fn test_guard_passes_response_through() {
        let response = guard(&CorsPolicy::permissive(), async {
            Ok(ResponseContext::empty(StatusCode::NO_CONTENT))
        })
        .await;
        assert_eq!(response.status, StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_guard_converts_error_to_500() {
        let response = guard(&CorsPolicy::permissive(), async {
            Err(Error::BadRequest("Invalid JSON body: eof".to_string()))
        })
        .await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(&response);
        assert_eq!(json["error"], "Internal Server Error");
        assert_eq!(json["message"], "Invalid request: Invalid JSON body: eof");
        assert_eq!(
            response.headers.get("access-control-allow-origin").unwrap(),
            "*"
        );
    }

    #[tokio::test]
    async fn test_guard_converts_panic_to_500() {
        let response = guard(&CorsPolicy::permissive(), async {
            if true {
                panic!("boom");
            }
            Ok(ResponseContext::empty(StatusCode::OK))
        })
        .await;

        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(&response)["message"], "boom");
    }
}
