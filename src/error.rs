//! Error types for the TMDB client.

use serde_json::{json, Value};
use thiserror::Error;

/// Result type for TMDB operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the TMDB client.
///
/// Variants produced from an HTTP response carry the decoded upstream body;
/// use [`Error::body`] to inspect it and [`Error::status`] for the HTTP
/// status code when one exists.
#[derive(Error, Debug)]
pub enum Error {
    /// Authentication failed (HTTP 401).
    #[error("TMDB API authentication failed. Check your API key or access token")]
    Authentication {
        /// Decoded error body returned by the API.
        body: Value,
    },

    /// Resource not found (HTTP 404).
    #[error("{resource} not found")]
    NotFound {
        /// Name of the resource that was not found.
        resource: String,
        /// Decoded error body returned by the API.
        body: Value,
    },

    /// Request validation failed (HTTP 422).
    #[error("Validation error: {message}")]
    Validation {
        /// Validation message reported by the API.
        message: String,
        /// Decoded error body returned by the API.
        body: Value,
    },

    /// Rate limit exceeded (HTTP 429).
    #[error("TMDB API rate limit exceeded. Wait before making more requests")]
    RateLimit {
        /// Decoded error body returned by the API.
        body: Value,
    },

    /// The API failed on its side (HTTP 5xx).
    #[error("TMDB API server error ({status})")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Decoded error body returned by the API.
        body: Value,
    },

    /// Any other non-success response.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message.
        message: String,
        /// Decoded error body returned by the API.
        body: Value,
    },

    /// The request never completed (connection failure, timeout, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A successful response carried a body that is not valid JSON.
    #[error("JSON error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Client construction failed.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// The decoded upstream response body, when the error came from one.
    pub fn body(&self) -> Option<&Value> {
        match self {
            Error::Authentication { body }
            | Error::NotFound { body, .. }
            | Error::Validation { body, .. }
            | Error::RateLimit { body }
            | Error::Server { body, .. }
            | Error::Api { body, .. } => Some(body),
            _ => None,
        }
    }

    /// The HTTP status code, when the error came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Authentication { .. } => Some(401),
            Error::NotFound { .. } => Some(404),
            Error::Validation { .. } => Some(422),
            Error::RateLimit { .. } => Some(429),
            Error::Server { status, .. } | Error::Api { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Create an API error from a non-success response.
    ///
    /// The failure body is decoded leniently: an absent, unreadable or
    /// non-JSON body becomes an empty object and never masks the HTTP
    /// error itself.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status();
        let body = match response.bytes().await {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|_| json!({})),
            Err(_) => json!({}),
        };
        classify(status, body)
    }
}

/// Shape of a TMDB error body.
#[derive(Debug, Default, serde::Deserialize)]
struct ErrorBody {
    status_message: Option<String>,
}

fn status_message(body: &Value) -> Option<String> {
    serde_json::from_value::<ErrorBody>(body.clone())
        .unwrap_or_default()
        .status_message
}

/// Map a non-success status and decoded body to an [`Error`].
pub(crate) fn classify(status: reqwest::StatusCode, body: Value) -> Error {
    match status.as_u16() {
        401 => Error::Authentication { body },
        404 => Error::NotFound {
            resource: "Resource".into(),
            body,
        },
        422 => {
            let message =
                status_message(&body).unwrap_or_else(|| "Validation failed".to_string());
            Error::Validation { message, body }
        }
        429 => Error::RateLimit { body },
        s if s >= 500 => Error::Server { status: s, body },
        s => {
            let message = status_message(&body)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {s}"));
            Error::Api {
                status: s,
                message,
                body,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use serde_json::json;

    #[test]
    fn test_classify_401() {
        let body = json!({"status_message": "Invalid API key"});
        let err = classify(StatusCode::UNAUTHORIZED, body.clone());
        assert!(matches!(err, Error::Authentication { .. }));
        assert_eq!(err.body(), Some(&body));
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_classify_404() {
        let err = classify(StatusCode::NOT_FOUND, json!({}));
        match err {
            Error::NotFound { resource, body } => {
                assert_eq!(resource, "Resource");
                assert_eq!(body, json!({}));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_422_uses_status_message() {
        let body = json!({"status_message": "Invalid page"});
        let err = classify(StatusCode::UNPROCESSABLE_ENTITY, body);
        match err {
            Error::Validation { message, .. } => assert_eq!(message, "Invalid page"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_422_falls_back_without_status_message() {
        let err = classify(StatusCode::UNPROCESSABLE_ENTITY, json!({}));
        match err {
            Error::Validation { message, .. } => assert_eq!(message, "Validation failed"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_429() {
        let err = classify(StatusCode::TOO_MANY_REQUESTS, json!({}));
        assert!(matches!(err, Error::RateLimit { .. }));
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn test_classify_5xx() {
        for code in [500u16, 502, 503] {
            let status = StatusCode::from_u16(code).unwrap();
            let err = classify(status, json!({}));
            match err {
                Error::Server { status, .. } => assert_eq!(status, code),
                other => panic!("expected Server for {code}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_classify_unmapped_status() {
        let err = classify(StatusCode::IM_A_TEAPOT, json!({}));
        match err {
            Error::Api { status, message, .. } => {
                assert_eq!(status, 418);
                assert!(!message.is_empty());
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn test_classify_unmapped_status_prefers_status_message() {
        let body = json!({"status_message": "Back off"});
        let err = classify(StatusCode::IM_A_TEAPOT, body);
        match err {
            Error::Api { message, .. } => assert_eq!(message, "Back off"),
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn test_non_object_body_has_no_status_message() {
        assert_eq!(status_message(&json!("plain text")), None);
        assert_eq!(status_message(&json!({"status_code": 6})), None);
    }
}
