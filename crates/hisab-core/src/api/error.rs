use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// A 401 that was not recovered by a token refresh.
    #[error("Unauthorized - token may be expired")]
    Unauthorized { server_message: Option<String> },

    /// The refresh token was missing or rejected; the session has been cleared.
    #[error("Session expired - please log in again")]
    ReauthRequired,

    #[error("Access denied: {detail}")]
    AccessDenied {
        detail: String,
        server_message: Option<String>,
    },

    #[error("Resource not found: {detail}")]
    NotFound { detail: String },

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Request rejected ({status}): {detail}")]
    Rejected {
        status: u16,
        detail: String,
        server_message: Option<String>,
    },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid invoice id: {0}")]
    InvalidId(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull a human-readable message out of an error body.
    ///
    /// Looks at `error`, `detail` and `message` in that order, then falls
    /// back to the first entry of a `{field: [messages]}` validation map.
    pub(crate) fn extract_message(body: &str) -> Option<String> {
        let value: Value = serde_json::from_str(body).ok()?;
        let object = value.as_object()?;

        for key in ["error", "detail", "message"] {
            if let Some(message) = object.get(key).and_then(Value::as_str) {
                if !message.is_empty() {
                    return Some(message.to_string());
                }
            }
        }

        object.iter().find_map(|(field, value)| {
            let first = match value {
                Value::Array(messages) => messages.first()?.as_str()?,
                Value::String(message) => message.as_str(),
                _ => return None,
            };
            if field == "non_field_errors" {
                Some(first.to_string())
            } else {
                Some(format!("{}: {}", field, first))
            }
        })
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let server_message = Self::extract_message(body);
        let detail = server_message
            .clone()
            .unwrap_or_else(|| Self::truncate_body(body));
        match status.as_u16() {
            401 => ApiError::Unauthorized { server_message },
            403 => ApiError::AccessDenied {
                detail,
                server_message,
            },
            404 => ApiError::NotFound { detail },
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(detail),
            code => ApiError::Rejected {
                status: code,
                detail,
                server_message,
            },
        }
    }

    /// The message the server put in its error payload, if it sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Unauthorized { server_message }
            | ApiError::AccessDenied { server_message, .. }
            | ApiError::Rejected { server_message, .. } => server_message.as_deref(),
            _ => None,
        }
    }

    /// Server message when present, otherwise `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        self.server_message().unwrap_or(fallback).to_string()
    }

    /// True when the caller has to log in again before retrying.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, ApiError::ReauthRequired)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::NetworkError(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_key_is_preferred() {
        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"error": "Invalid credentials"}"#,
        );
        assert!(matches!(err, ApiError::Unauthorized { .. }));
        assert_eq!(err.server_message(), Some("Invalid credentials"));
        assert_eq!(err.user_message("Login failed"), "Invalid credentials");
    }

    #[test]
    fn test_detail_key_from_framework_errors() {
        let err = ApiError::from_status(
            StatusCode::NOT_FOUND,
            r#"{"detail": "Not found."}"#,
        );
        assert_eq!(err.to_string(), "Resource not found: Not found.");
    }

    #[test]
    fn test_field_errors_are_flattened() {
        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"username": ["A user with that username already exists."]}"#,
        );
        assert_eq!(
            err.server_message(),
            Some("username: A user with that username already exists.")
        );

        let err = ApiError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"non_field_errors": ["Dates are out of order."]}"#,
        );
        assert_eq!(err.server_message(), Some("Dates are out of order."));
    }

    #[test]
    fn test_plain_body_falls_back_to_generic_message() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>");
        assert!(matches!(err, ApiError::ServerError(_)));
        assert_eq!(err.server_message(), None);
        assert_eq!(err.user_message("Request failed"), "Request failed");
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 20);
        let err = ApiError::from_status(StatusCode::IM_A_TEAPOT, &body);
        match err {
            ApiError::Rejected { status, detail, .. } => {
                assert_eq!(status, 418);
                assert!(detail.contains("truncated"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
