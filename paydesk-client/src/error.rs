//! Error types for the payments client

use reqwest::StatusCode;
use serde::Serialize;
use thiserror::Error;

/// Fallback when a failed response carries no usable message
const GENERIC_MESSAGE: &str = "Error processing request";

/// Fallback when nothing at all can be said about a failure
const UNKNOWN_MESSAGE: &str = "Unknown error";

/// HTTP client error
#[derive(Debug, Error)]
pub enum ApiError {
    /// No response was received (connection refused, DNS, timeout)
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Server answered with a non-success status
    #[error("{message}")]
    Status {
        status: StatusCode,
        message: String,
        body: Option<serde_json::Value>,
    },

    /// Response body could not be decoded (or request body encoded)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A header name or value is not valid HTTP
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// Request URL could not be assembled
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// Build a status error from a raw response body.
    ///
    /// The message comes from the body's `message` field, then `detail`,
    /// then the transport's own wording.
    pub fn from_status(status: StatusCode, raw: &[u8]) -> Self {
        let body = if raw.is_empty() {
            None
        } else {
            serde_json::from_slice::<serde_json::Value>(raw).ok()
        };

        let message = body
            .as_ref()
            .and_then(|b| extract_message(b))
            .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));

        ApiError::Status {
            status,
            message,
            body,
        }
    }

    /// HTTP status, when a response was received
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::Network(e) => e.status(),
            _ => None,
        }
    }

    /// Decoded response body, when the server sent JSON
    pub fn body(&self) -> Option<&serde_json::Value> {
        match self {
            ApiError::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(StatusCode::UNAUTHORIZED)
    }

    pub fn is_network(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        ApiError::Network(e)
    }
}

fn extract_message(body: &serde_json::Value) -> Option<String> {
    ["message", "detail"].iter().find_map(|field| {
        body.get(field)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Display-ready view of any failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorReport {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ErrorReport {
    /// Normalize an arbitrary error.
    ///
    /// `ApiError`s keep their status and body; anything else keeps only its
    /// message.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        if let Some(api) = error.downcast_ref::<ApiError>() {
            return Self::from(api);
        }

        let message = error.to_string();
        Self {
            message: if message.is_empty() {
                UNKNOWN_MESSAGE.to_string()
            } else {
                message
            },
            status: None,
            data: None,
        }
    }

    pub fn unknown() -> Self {
        Self {
            message: UNKNOWN_MESSAGE.to_string(),
            status: None,
            data: None,
        }
    }
}

impl From<&ApiError> for ErrorReport {
    fn from(error: &ApiError) -> Self {
        let message = match error {
            ApiError::Network(_) => "Network Error".to_string(),
            other => {
                let m = other.to_string();
                if m.is_empty() {
                    GENERIC_MESSAGE.to_string()
                } else {
                    m
                }
            }
        };

        Self {
            message,
            status: error.status().map(|s| s.as_u16()),
            data: error.body().cloned(),
        }
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_preferred_over_detail() {
        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            br#"{"message": "amount is required", "detail": "ignored"}"#,
        );
        assert_eq!(err.to_string(), "amount is required");
        assert_eq!(err.status(), Some(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_detail_used_when_no_message() {
        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            br#"{"detail": "Given token not valid for any token type"}"#,
        );
        assert_eq!(err.to_string(), "Given token not valid for any token type");
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_fallback_to_transport_message() {
        let err = ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, b"<html>oops</html>");
        assert_eq!(err.to_string(), "Request failed with status code 500");
        assert!(err.body().is_none());

        let err = ApiError::from_status(StatusCode::BAD_REQUEST, br#"{"name": ["required"]}"#);
        assert_eq!(err.to_string(), "Request failed with status code 400");
        assert_eq!(err.body().unwrap()["name"][0], "required");
    }

    #[test]
    fn test_report_keeps_status_and_body() {
        let err = ApiError::from_status(StatusCode::NOT_FOUND, br#"{"detail": "Not found."}"#);
        let report = ErrorReport::from_error(&err);
        assert_eq!(report.message, "Not found.");
        assert_eq!(report.status, Some(404));
        assert_eq!(report.data.unwrap()["detail"], "Not found.");
    }

    #[test]
    fn test_report_for_foreign_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk on fire");
        let report = ErrorReport::from_error(&io);
        assert_eq!(report.message, "disk on fire");
        assert_eq!(report.status, None);
        assert_eq!(ErrorReport::unknown().message, "Unknown error");
    }
}
