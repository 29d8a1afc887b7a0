//! Error types for the Nefino SDK.

use nefino_core::ValidationError;
use serde::{Deserialize, Serialize};

/// Result type for SDK operations.
pub type NefinoResult<T> = Result<T, NefinoError>;

/// Error types that can occur when querying the Nefino API.
#[derive(Debug, thiserror::Error)]
pub enum NefinoError {
    /// Query arguments were rejected before any request was made.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Credential invalid, expired, or could not be acquired.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Rate limited by the provider.
    #[error("Rate limited{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    /// Provider returned an unexpected status.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// Provider returned a body that does not match the expected shape.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// HTTP request failed before a response was received.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request or credential refresh timed out.
    #[error("Request timed out")]
    Timeout,

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    match retry_after_secs {
        Some(secs) => format!(", retry after {} seconds", secs),
        None => String::new(),
    }
}

/// Coarse error classes reported to tool callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    AuthError,
    RateLimitError,
    NotFoundError,
    UpstreamError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::AuthError => "auth_error",
            ErrorKind::RateLimitError => "rate_limit_error",
            ErrorKind::NotFoundError => "not_found_error",
            ErrorKind::UpstreamError => "upstream_error",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl NefinoError {
    /// Classify this error for callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Authentication(_) => ErrorKind::AuthError,
            Self::NotFound(_) => ErrorKind::NotFoundError,
            Self::RateLimited { .. } => ErrorKind::RateLimitError,
            Self::Api { .. }
            | Self::MalformedResponse(_)
            | Self::Http(_)
            | Self::Timeout
            | Self::Config(_)
            | Self::InvalidUrl(_) => ErrorKind::UpstreamError,
        }
    }

    /// Create an error from a non-success status code and response body.
    pub fn from_response(status: u16, body: &str, retry_after_secs: Option<u64>) -> Self {
        let message = match serde_json::from_str::<ErrorResponse>(body) {
            Ok(error_response) => error_response.into_message(),
            Err(_) if body.trim().is_empty() => format!("status {}", status),
            Err(_) => truncate(body.trim(), 512),
        };

        match status {
            401 | 403 => Self::Authentication(message),
            404 => Self::NotFound(message),
            429 => Self::RateLimited { retry_after_secs },
            _ => Self::Api { status, message },
        }
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

/// Error body the provider may send with a failure status.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default, alias = "message")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    fn into_message(self) -> String {
        match (self.error, self.details) {
            (Some(error), Some(details)) => format!("{} ({})", error, details),
            (Some(error), None) => error,
            (None, Some(details)) => details,
            (None, None) => "no error message".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(NefinoError::from_response(401, "", None).kind(), ErrorKind::AuthError);
        assert_eq!(NefinoError::from_response(403, "", None).kind(), ErrorKind::AuthError);
        assert_eq!(NefinoError::from_response(404, "", None).kind(), ErrorKind::NotFoundError);
        assert_eq!(
            NefinoError::from_response(429, "", Some(10)).kind(),
            ErrorKind::RateLimitError
        );
        assert_eq!(NefinoError::from_response(500, "", None).kind(), ErrorKind::UpstreamError);
        assert_eq!(NefinoError::from_response(418, "", None).kind(), ErrorKind::UpstreamError);
    }

    #[test]
    fn test_error_body_parsed() {
        let err = NefinoError::from_response(
            404,
            r#"{"error": "place not found", "details": "id 42"}"#,
            None,
        );
        assert_eq!(err.to_string(), "Resource not found: place not found (id 42)");

        let err = NefinoError::from_response(502, r#"{"message": "bad gateway"}"#, None);
        assert_eq!(err.to_string(), "API error (status 502): bad gateway");

        let err = NefinoError::from_response(500, "<html>oops</html>", None);
        assert_eq!(err.to_string(), "API error (status 500): <html>oops</html>");
    }

    #[test]
    fn test_rate_limit_message() {
        let err = NefinoError::RateLimited {
            retry_after_secs: Some(30),
        };
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");
        let err = NefinoError::RateLimited {
            retry_after_secs: None,
        };
        assert_eq!(err.to_string(), "Rate limited");
    }

    #[test]
    fn test_validation_kind() {
        let err: NefinoError = ValidationError::missing("place_id").into();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.kind().to_string(), "validation_error");
    }

    #[test]
    fn test_long_bodies_truncated() {
        let body = "x".repeat(2000);
        let err = NefinoError::from_response(500, &body, None);
        assert!(err.to_string().len() < 600);
    }
}
