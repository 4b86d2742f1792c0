//! Cross-origin response headers.

use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, VARY,
};
use http::{HeaderMap, HeaderValue};

const ALLOW_METHODS: &str = "GET, POST, OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type, Authorization";

/// CORS headers applied to every gateway response.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origin: HeaderValue,
    credentials: bool,
}

impl CorsPolicy {
    /// Build a policy for the configured origin. `*` is fully permissive; a
    /// specific origin also allows credentials. An origin that is not a valid
    /// header value falls back to `*`.
    pub fn new(allowed_origin: &str) -> Self {
        match HeaderValue::from_str(allowed_origin.trim()) {
            Ok(origin) if origin != "*" => Self {
                origin,
                credentials: true,
            },
            Ok(_) => Self::permissive(),
            Err(_) => {
                tracing::warn!(origin = %allowed_origin, "Invalid CORS origin, allowing any origin");
                Self::permissive()
            }
        }
    }

    pub fn permissive() -> Self {
        Self {
            origin: HeaderValue::from_static("*"),
            credentials: false,
        }
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, self.origin.clone());
        headers.insert(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        if self.credentials {
            headers.insert(
                ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            headers.append(VARY, HeaderValue::from_static("Origin"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissive_policy() {
        let mut headers = HeaderMap::new();
        CorsPolicy::new("*").apply(&mut headers);
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        assert_eq!(
            headers.get(ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
            "GET, POST, OPTIONS"
        );
        assert!(headers.get(ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
    }

    #[test]
    fn test_specific_origin_allows_credentials() {
        let mut headers = HeaderMap::new();
        CorsPolicy::new("https://app.example.com").apply(&mut headers);
        assert_eq!(
            headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://app.example.com"
        );
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(), "true");
        assert_eq!(headers.get(VARY).unwrap(), "Origin");
    }

    #[test]
    fn test_invalid_origin_falls_back_to_any() {
        let mut headers = HeaderMap::new();
        CorsPolicy::new("bad\norigin").apply(&mut headers);
        assert_eq!(headers.get(ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    }
}
