//! Error types for shopify-sync
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Errors are classified by scope: transport errors are retried once at the
//! page level, HTTP status errors can be isolated to a single fan-out parent,
//! and malformed responses are always fatal.

use thiserror::Error;

/// The main error type for shopify-sync
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Invalid shop URL '{url}': {message}")]
    InvalidShopUrl { url: String, message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Extraction Errors
    // ============================================================================
    #[error("Malformed response: {message}")]
    MalformedResponse { message: String },

    #[error("Unknown resource: {name}")]
    UnknownResource { name: String },

    #[error("Resource '{resource}' failed: {message}")]
    ResourceFailed { resource: String, message: String },

    // ============================================================================
    // Sink Errors
    // ============================================================================
    #[error("Sink error: {message}")]
    Sink { message: String },

    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an invalid shop URL error
    pub fn invalid_shop_url(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidShopUrl {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a malformed response error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Create an unknown resource error
    pub fn unknown_resource(name: impl Into<String>) -> Self {
        Self::UnknownResource { name: name.into() }
    }

    /// Create a resource failure error
    pub fn resource_failed(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ResourceFailed {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// Create a sink error
    pub fn sink(message: impl Into<String>) -> Self {
        Self::Sink {
            message: message.into(),
        }
    }

    /// Connection failures and deadlines, as opposed to HTTP status errors
    pub fn is_transport(&self) -> bool {
        match self {
            Error::Timeout { .. } => true,
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            _ => false,
        }
    }

    /// Check if this error is retryable at the page level
    pub fn is_retryable(&self) -> bool {
        self.is_transport()
    }

    /// Check if this error may be isolated to a single fan-out parent
    pub fn is_isolable(&self) -> bool {
        self.is_transport() || matches!(self, Error::HttpStatus { .. })
    }

    /// Check if this error means required configuration is absent
    pub fn is_missing_config(&self) -> bool {
        matches!(self, Error::MissingConfigField { .. })
    }
}

/// Result type alias for shopify-sync
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("shop_url");
        assert_eq!(err.to_string(), "Missing required config field: shop_url");

        let err = Error::http_status(404, "Not found");
        assert_eq!(err.to_string(), "HTTP 404: Not found");

        let err = Error::malformed("missing pageInfo");
        assert_eq!(err.to_string(), "Malformed response: missing pageInfo");
    }

    #[test]
    fn test_classification() {
        assert!(Error::Timeout { timeout_ms: 1000 }.is_transport());
        assert!(Error::Timeout { timeout_ms: 1000 }.is_retryable());
        assert!(Error::Timeout { timeout_ms: 1000 }.is_isolable());

        assert!(!Error::http_status(500, "").is_retryable());
        assert!(Error::http_status(500, "").is_isolable());
        assert!(Error::http_status(404, "").is_isolable());

        assert!(!Error::malformed("x").is_retryable());
        assert!(!Error::malformed("x").is_isolable());
        assert!(!Error::config("x").is_isolable());

        assert!(Error::missing_field("access_token").is_missing_config());
        assert!(!Error::config("x").is_missing_config());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
