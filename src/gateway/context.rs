//! Host-independent request and response representations.

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::Query;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::provider::ByteStream;

/// Inbound body after normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    /// Body whose content type named JSON, already parsed.
    Json(serde_json::Value),
    /// Any other body, untouched.
    Raw(Bytes),
}

/// Canonical inbound request consumed by the gateway.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub query: HashMap<String, String>,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl RequestContext {
    /// Build a request with no query, headers, or body.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn with_json(mut self, value: serde_json::Value) -> Self {
        self.body = RequestBody::Json(value);
        self
    }

    /// Normalize `http` request parts and a fully read body.
    ///
    /// A JSON content type with an unparseable body is an adaptation error.
    pub fn from_parts(parts: &http::request::Parts, body: Bytes) -> Result<Self> {
        Self::from_components(parts.method.clone(), &parts.uri, parts.headers.clone(), body)
    }

    /// Normalize an already split request.
    pub fn from_components(
        method: Method,
        uri: &Uri,
        headers: HeaderMap,
        body: Bytes,
    ) -> Result<Self> {
        let query = match uri.query() {
            Some(_) => {
                Query::<HashMap<String, String>>::try_from_uri(uri)
                    .map_err(|e| Error::BadRequest(format!("Invalid query string: {}", e)))?
                    .0
            }
            None => HashMap::new(),
        };

        let is_json = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);

        let body = if body.is_empty() {
            RequestBody::Empty
        } else if is_json {
            let value = serde_json::from_slice(&body)
                .map_err(|e| Error::BadRequest(format!("Invalid JSON body: {}", e)))?;
            RequestBody::Json(value)
        } else {
            RequestBody::Raw(body)
        };

        Ok(Self {
            method,
            path: uri.path().to_string(),
            query,
            headers,
            body,
        })
    }

    /// Decode the body as `T`. An empty body decodes as `{}`.
    pub fn json<T: DeserializeOwned>(&self) -> std::result::Result<T, serde_json::Error> {
        match &self.body {
            RequestBody::Empty => serde_json::from_value(serde_json::json!({})),
            RequestBody::Json(value) => T::deserialize(value),
            RequestBody::Raw(bytes) => serde_json::from_slice(bytes),
        }
    }
}

/// Outbound body: either complete or produced incrementally.
pub enum ResponseBody {
    Full(Bytes),
    Stream(ByteStream),
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseBody::Full(bytes) => f.debug_tuple("Full").field(bytes).finish(),
            ResponseBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Canonical outbound response produced by the gateway.
#[derive(Debug)]
pub struct ResponseContext {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: ResponseBody,
}

impl ResponseContext {
    /// JSON response with the given status.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(bytes) => {
                let mut headers = HeaderMap::new();
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                Self {
                    status,
                    headers,
                    body: ResponseBody::Full(Bytes::from(bytes)),
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize response body");
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    headers: HeaderMap::new(),
                    body: ResponseBody::Full(Bytes::from_static(
                        br#"{"error":"Failed to serialize response"}"#,
                    )),
                }
            }
        }
    }

    /// Response with no body.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: ResponseBody::Full(Bytes::new()),
        }
    }

    /// Streamed response; bytes are forwarded as the stream yields them.
    pub fn stream(status: StatusCode, content_type: &'static str, stream: ByteStream) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        Self {
            status,
            headers,
            body: ResponseBody::Stream(stream),
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.body, ResponseBody::Stream(_))
    }

    /// Denormalize into an `http` response. Streamed bodies are not buffered.
    pub fn into_http(self) -> http::Response<Body> {
        let body = match self.body {
            ResponseBody::Full(bytes) => Body::from(bytes),
            ResponseBody::Stream(stream) => Body::from_stream(stream),
        };

        let mut response = http::Response::new(body);
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    fn parts(method: &str, uri: &str, content_type: Option<&str>) -> http::request::Parts {
        let mut builder = http::Request::builder().method(method).uri(uri);
        if let Some(ct) = content_type {
            builder = builder.header(header::CONTENT_TYPE, ct);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_from_parts_parses_json_body_and_query() {
        let parts = parts("POST", "/graphql?a=1&b=two", Some("application/json"));
        let ctx = RequestContext::from_parts(&parts, Bytes::from_static(br#"{"x":1}"#)).unwrap();

        assert_eq!(ctx.method, Method::POST);
        assert_eq!(ctx.path, "/graphql");
        assert_eq!(ctx.query.get("a").map(String::as_str), Some("1"));
        assert_eq!(ctx.query.get("b").map(String::as_str), Some("two"));
        assert_eq!(ctx.body, RequestBody::Json(serde_json::json!({"x": 1})));
    }

    #[test]
    fn test_from_parts_keeps_non_json_raw() {
        let parts = parts("POST", "/api/chat", Some("text/plain"));
        let ctx = RequestContext::from_parts(&parts, Bytes::from_static(b"hello")).unwrap();
        assert_eq!(ctx.body, RequestBody::Raw(Bytes::from_static(b"hello")));
    }

    #[test]
    fn test_from_parts_empty_body() {
        let parts = parts("GET", "/health", None);
        let ctx = RequestContext::from_parts(&parts, Bytes::new()).unwrap();
        assert_eq!(ctx.body, RequestBody::Empty);
        assert!(ctx.query.is_empty());
    }

    #[test]
    fn test_from_parts_rejects_malformed_json() {
        let parts = parts("POST", "/api/chat", Some("application/json; charset=utf-8"));
        let result = RequestContext::from_parts(&parts, Bytes::from_static(b"{not json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_json_decodes_raw_and_empty_bodies() {
        #[derive(serde::Deserialize)]
        struct Probe {
            #[serde(default)]
            value: u32,
        }

        let mut ctx = RequestContext::new(Method::POST, "/");
        assert_eq!(ctx.json::<Probe>().unwrap().value, 0);

        ctx.body = RequestBody::Raw(Bytes::from_static(br#"{"value":7}"#));
        assert_eq!(ctx.json::<Probe>().unwrap().value, 7);
    }

    #[tokio::test]
    async fn test_into_http_streams_chunks_in_order() {
        let chunks = vec![
            Ok(Bytes::from_static(b"data: one\n\n")),
            Ok(Bytes::from_static(b"data: two\n\n")),
        ];
        let response = ResponseContext::stream(
            StatusCode::OK,
            "text/event-stream",
            futures::stream::iter(chunks).boxed(),
        );
        assert!(response.is_streaming());

        let http_response = response.into_http();
        assert_eq!(
            http_response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
        let body = axum::body::to_bytes(http_response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"data: one\n\ndata: two\n\n");
    }
}
