//! Configuration parsing and validation for aigate.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;
use std::time::Duration;

use crate::gateway::GatewaySettings;
use crate::provider::{ProviderSettings, DEFAULT_BASE_URL};

/// Convention environment variable holding the provider credential.
pub const DEFAULT_CREDENTIAL_ENV: &str = "OPENAI_API_KEY";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:3000")
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

/// API key wrapper that redacts in Debug/Display/Serialize and zeroizes on drop.
///
/// The inner `SecretString` ensures the key value is:
/// - Zeroized in memory when dropped
/// - Never exposed via Debug or Display
/// - Only accessible via `.expose_secret()` (grep-auditable)
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    /// Access the raw key value. Every call site is auditable via `grep expose_secret`.
    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl std::fmt::Display for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> serde::Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| ApiKey(SecretString::from(s)))
    }
}

impl From<String> for ApiKey {
    fn from(s: String) -> Self {
        ApiKey(SecretString::from(s))
    }
}

impl From<&str> for ApiKey {
    fn from(s: &str) -> Self {
        ApiKey(SecretString::from(s))
    }
}

/// How the provider credential was resolved.
#[derive(Debug, Clone, PartialEq)]
pub enum KeySource {
    /// Key was a literal string in config (no ${} references)
    Literal,
    /// Key contained ${VAR} references expanded from environment
    EnvExpanded,
    /// Key was discovered from the convention env var (holds var name)
    Convention(String),
    /// No key available
    None,
}

impl std::fmt::Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Literal => write!(f, "config-literal"),
            KeySource::EnvExpanded => write!(f, "env-expanded"),
            KeySource::Convention(var) => write!(f, "convention ({})", var),
            KeySource::None => write!(f, "none"),
        }
    }
}

/// Upstream provider configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of the OpenAI-compatible API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Provider credential
    pub api_key: Option<ApiKey>,
    /// Env var consulted when `api_key` is absent; also names the credential in errors
    #[serde(default = "default_credential_env")]
    pub credential_env: String,
    /// Per-request timeout in seconds. Absent means no timeout.
    pub timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_credential_env() -> String {
    DEFAULT_CREDENTIAL_ENV.to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            credential_env: default_credential_env(),
            timeout_secs: None,
        }
    }
}

impl ProviderConfig {
    /// Connection settings handed to the provider client.
    pub fn settings(&self) -> ProviderSettings {
        ProviderSettings {
            base_url: self.base_url.clone(),
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Cross-origin configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    /// Value of `Access-Control-Allow-Origin`
    #[serde(default = "default_allowed_origin")]
    pub allowed_origin: String,
}

fn default_allowed_origin() -> String {
    "*".to_string()
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origin: default_allowed_origin(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        Self::parse_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider.base_url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "provider.base_url must not be empty".to_string(),
            ));
        }

        if self.provider.credential_env.trim().is_empty() {
            return Err(ConfigError::Validation(
                "provider.credential_env must not be empty".to_string(),
            ));
        }

        if self.provider.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "provider.timeout_secs must be greater than zero".to_string(),
            ));
        }

        if self.cors.allowed_origin.trim().is_empty() {
            return Err(ConfigError::Validation(
                "cors.allowed_origin must not be empty".to_string(),
            ));
        }

        if self.provider.api_key.is_none() {
            tracing::warn!(
                credential = %self.provider.credential_env,
                "No provider credential configured - provider endpoints will answer 500"
            );
        }

        Ok(())
    }

    /// Settings shared by every request the gateway serves.
    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            credential_name: self.provider.credential_env.clone(),
            allowed_origin: self.cors.allowed_origin.clone(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Configuration validation error: {0}")]
    Validation(String),

    #[error("Environment variable '{var}' not set: {message}")]
    EnvVar { var: String, message: String },
}

/// Raw provider config deserialized directly from TOML.
/// api_key is `Option<String>` so it may contain `${VAR}` references not yet expanded.
#[derive(Deserialize)]
pub struct RawProviderConfig {
    #[serde(default = "default_base_url")]
    base_url: String,
    api_key: Option<String>,
    #[serde(default = "default_credential_env")]
    credential_env: String,
    timeout_secs: Option<u64>,
}

impl Default for RawProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            credential_env: default_credential_env(),
            timeout_secs: None,
        }
    }
}

/// Raw configuration deserialized directly from TOML.
/// The provider api_key may contain `${VAR}` references not yet expanded.
#[derive(Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    provider: RawProviderConfig,
    #[serde(default)]
    cors: CorsConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

/// Expand all `${VAR}` references in a string using a custom lookup function.
///
/// Supports multiple `${VAR}` in one string (e.g., `${SCHEME}://${HOST}/v1`).
/// Fails on first missing variable, unclosed `${`, or empty variable name.
fn expand_env_vars_with<F>(input: &str, lookup: F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains("${") {
        return Ok(input.to_string());
    }

    let mut result = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let end = after.find('}').ok_or_else(|| ConfigError::EnvVar {
            var: "<unclosed>".to_string(),
            message: format!("Unclosed '${{' in config value: {}", input),
        })?;

        let var_name = &after[..end];
        if var_name.is_empty() {
            return Err(ConfigError::EnvVar {
                var: "".to_string(),
                message: "Empty variable name in '${}' reference".to_string(),
            });
        }

        let value = lookup(var_name).ok_or_else(|| ConfigError::EnvVar {
            var: var_name.to_string(),
            message: format!(
                "Environment variable '{}' is not set (referenced in provider config)",
                var_name
            ),
        })?;

        result.push_str(&value);
        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Ok(result)
}

/// Resolve the provider credential from its raw config value, using `lookup`
/// for both `${VAR}` expansion and the convention variable.
fn resolve_api_key_with<F>(
    raw_key: Option<&str>,
    credential_env: &str,
    lookup: F,
) -> Result<(Option<ApiKey>, KeySource), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match raw_key {
        Some(raw) if raw.contains("${") => {
            let expanded = expand_env_vars_with(raw, &lookup)?;
            Ok((Some(ApiKey::from(expanded)), KeySource::EnvExpanded))
        }
        Some(raw) => Ok((Some(ApiKey::from(raw)), KeySource::Literal)),
        None => match lookup(credential_env).filter(|v| !v.is_empty()) {
            Some(value) => Ok((
                Some(ApiKey::from(value)),
                KeySource::Convention(credential_env.to_string()),
            )),
            None => Ok((None, KeySource::None)),
        },
    }
}

impl Config {
    /// Convert raw (deserialized) config to final config, resolving the credential
    /// through `lookup`.
    ///
    /// - `api_key` containing `${VAR}`: expanded, source = `EnvExpanded`
    /// - `api_key` literal: wrapped directly, source = `Literal`
    /// - `api_key` absent: convention lookup of `credential_env`,
    ///   source = `Convention(var_name)` or `KeySource::None`
    pub fn from_raw_with<F>(raw: RawConfig, lookup: F) -> Result<(Self, KeySource), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (api_key, source) = resolve_api_key_with(
            raw.provider.api_key.as_deref(),
            &raw.provider.credential_env,
            lookup,
        )?;

        let config = Config {
            server: raw.server,
            provider: ProviderConfig {
                base_url: raw.provider.base_url,
                api_key,
                credential_env: raw.provider.credential_env,
                timeout_secs: raw.provider.timeout_secs,
            },
            cors: raw.cors,
            logging: raw.logging,
        };

        Ok((config, source))
    }

    /// Convert raw config to final config using real environment variables.
    pub fn from_raw(raw: RawConfig) -> Result<(Self, KeySource), ConfigError> {
        let (config, source) = Self::from_raw_with(raw, |name| std::env::var(name).ok())?;
        config.validate()?;
        Ok((config, source))
    }

    /// Load configuration from a TOML file with environment variable expansion.
    ///
    /// This is the env-var-aware entry point. It:
    /// 1. Reads the file
    /// 2. Parses as `RawConfig` (api_key as plain String)
    /// 3. Expands `${VAR}` references and applies convention lookup
    /// 4. Validates the resulting config
    pub fn from_file_with_env(path: impl AsRef<Path>) -> Result<(Self, KeySource), ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            source: e,
        })?;

        let raw: RawConfig = toml::from_str(&content).map_err(ConfigError::Parse)?;
        Self::from_raw(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = Config::parse_str("").unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:3000");
        assert_eq!(config.provider.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.provider.credential_env, "OPENAI_API_KEY");
        assert!(config.provider.timeout_secs.is_none());
        assert_eq!(config.cors.allowed_origin, "*");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            [server]
            listen = "0.0.0.0:8080"

            [provider]
            base_url = "https://proxy.example.com/v1"
            api_key = "sk-test"
            credential_env = "UPSTREAM_KEY"
            timeout_secs = 30

            [cors]
            allowed_origin = "https://app.example.com"

            [logging]
            level = "debug"
        "#;

        let config = Config::parse_str(toml).unwrap();
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.provider.base_url, "https://proxy.example.com/v1");
        assert_eq!(
            config.provider.api_key.as_ref().unwrap().expose_secret(),
            "sk-test"
        );
        assert_eq!(
            config.provider.settings().timeout,
            Some(Duration::from_secs(30))
        );
        assert_eq!(config.cors.allowed_origin, "https://app.example.com");

        let settings = config.gateway_settings();
        assert_eq!(settings.credential_name, "UPSTREAM_KEY");
        assert_eq!(settings.allowed_origin, "https://app.example.com");
    }

    #[test]
    fn test_validation_rejects_empty_base_url() {
        let toml = r#"
            [provider]
            base_url = ""
        "#;
        let err = Config::parse_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_validation_rejects_zero_timeout() {
        let toml = r#"
            [provider]
            timeout_secs = 0
        "#;
        assert!(Config::parse_str(toml).is_err());
    }

    #[test]
    fn test_api_key_debug_redaction() {
        let key = ApiKey::from("super-secret-token");
        let debug_output = format!("{:?}", key);
        assert_eq!(debug_output, "[REDACTED]");
        assert!(!debug_output.contains("super-secret"));
    }

    #[test]
    fn test_api_key_display_redaction() {
        let key = ApiKey::from("super-secret-token");
        assert_eq!(format!("{}", key), "[REDACTED]");
    }

    #[test]
    fn test_api_key_serialize_redaction() {
        let key = ApiKey::from("real-secret-value");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"[REDACTED]\"");
    }

    #[test]
    fn test_provider_config_debug_redaction() {
        let config = ProviderConfig {
            api_key: Some(ApiKey::from("sk-live-abcdef")),
            ..ProviderConfig::default()
        };
        let debug_output = format!("{:?}", config);
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk-live-abcdef"));
    }

    // ── Expansion tests (using expand_env_vars_with, no global env state) ──

    #[test]
    fn test_expand_single_var() {
        let lookup = |name: &str| match name {
            "MY_KEY" => Some("sk-abc".to_string()),
            _ => None,
        };
        assert_eq!(expand_env_vars_with("${MY_KEY}", lookup).unwrap(), "sk-abc");
    }

    #[test]
    fn test_expand_multiple_vars() {
        let lookup = |name: &str| match name {
            "SCHEME" => Some("https".to_string()),
            "HOST" => Some("example.com".to_string()),
            _ => None,
        };
        let result = expand_env_vars_with("${SCHEME}://${HOST}/v1", lookup).unwrap();
        assert_eq!(result, "https://example.com/v1");
    }

    #[test]
    fn test_expand_no_vars_passthrough() {
        let lookup = |_: &str| -> Option<String> { panic!("should not be called") };
        assert_eq!(
            expand_env_vars_with("literal-value", lookup).unwrap(),
            "literal-value"
        );
    }

    #[test]
    fn test_expand_missing_var_fails() {
        let err = expand_env_vars_with("${MISSING}", no_env)
            .unwrap_err()
            .to_string();
        assert!(err.contains("MISSING"), "Error should name the variable");
    }

    #[test]
    fn test_expand_unclosed_brace_fails() {
        let err = expand_env_vars_with("${UNCLOSED", no_env)
            .unwrap_err()
            .to_string()
            .to_lowercase();
        assert!(err.contains("unclosed"));
    }

    #[test]
    fn test_expand_empty_var_name_fails() {
        let err = expand_env_vars_with("${}", no_env)
            .unwrap_err()
            .to_string()
            .to_lowercase();
        assert!(err.contains("empty"));
    }

    // ── Credential resolution ──

    fn raw_with_key(api_key: Option<&str>) -> RawConfig {
        RawConfig {
            provider: RawProviderConfig {
                api_key: api_key.map(str::to_string),
                ..RawProviderConfig::default()
            },
            ..RawConfig::default()
        }
    }

    #[test]
    fn test_from_raw_literal_key() {
        let (config, source) = Config::from_raw_with(raw_with_key(Some("sk-literal")), no_env).unwrap();
        assert_eq!(source, KeySource::Literal);
        assert_eq!(
            config.provider.api_key.unwrap().expose_secret(),
            "sk-literal"
        );
    }

    #[test]
    fn test_from_raw_env_expanded_key() {
        let lookup = |name: &str| (name == "UPSTREAM").then(|| "sk-expanded".to_string());
        let (config, source) =
            Config::from_raw_with(raw_with_key(Some("${UPSTREAM}")), lookup).unwrap();
        assert_eq!(source, KeySource::EnvExpanded);
        assert_eq!(
            config.provider.api_key.unwrap().expose_secret(),
            "sk-expanded"
        );
    }

    #[test]
    fn test_from_raw_convention_key() {
        let lookup = |name: &str| (name == "OPENAI_API_KEY").then(|| "sk-conv".to_string());
        let (config, source) = Config::from_raw_with(raw_with_key(None), lookup).unwrap();
        assert_eq!(source, KeySource::Convention("OPENAI_API_KEY".to_string()));
        assert_eq!(config.provider.api_key.unwrap().expose_secret(), "sk-conv");
    }

    #[test]
    fn test_from_raw_empty_convention_value_is_no_key() {
        let lookup = |_: &str| Some(String::new());
        let (config, source) = Config::from_raw_with(raw_with_key(None), lookup).unwrap();
        assert_eq!(source, KeySource::None);
        assert!(config.provider.api_key.is_none());
    }

    #[test]
    fn test_from_raw_no_key() {
        let (config, source) = Config::from_raw_with(raw_with_key(None), no_env).unwrap();
        assert_eq!(source, KeySource::None);
        assert!(config.provider.api_key.is_none());
    }

    #[test]
    fn test_from_raw_missing_env_var_fails() {
        let err = Config::from_raw_with(raw_with_key(Some("${NOPE_NOT_SET}")), no_env)
            .unwrap_err()
            .to_string();
        assert!(err.contains("NOPE_NOT_SET"), "{}", err);
    }

    #[test]
    fn test_from_file_with_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aigate.toml");
        std::fs::write(
            &path,
            r#"
                [server]
                listen = "127.0.0.1:9100"

                [provider]
                api_key = "sk-from-file"
            "#,
        )
        .unwrap();

        let (config, source) = Config::from_file_with_env(&path).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:9100");
        assert_eq!(source, KeySource::Literal);
    }

    #[test]
    fn test_from_file_missing_reports_path() {
        let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
