//! Shared error type across vigil crates.

use serde::Serialize;
use thiserror::Error;

/// Client-facing error codes (stable API).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCode {
    /// Input failed field-level validation.
    ValidationFailed,
    /// Malformed request (bad JSON, bad query value).
    BadRequest,
    /// Admin token missing or wrong.
    Unauthorized,
    /// No route matched.
    NotFound,
    /// Route exists, method does not.
    MethodNotAllowed,
    /// Rate limited.
    RateLimited,
    /// Internal server error.
    Internal,
}

impl ClientCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ClientCode::ValidationFailed => "VALIDATION_FAILED",
            ClientCode::BadRequest => "BAD_REQUEST",
            ClientCode::Unauthorized => "UNAUTHORIZED",
            ClientCode::NotFound => "NOT_FOUND",
            ClientCode::MethodNotAllowed => "METHOD_NOT_ALLOWED",
            ClientCode::RateLimited => "RATE_LIMITED",
            ClientCode::Internal => "INTERNAL",
        }
    }
}

/// One rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl FieldError {
    pub fn new(field: &'static str, message: &'static str) -> Self {
        Self { field, message }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, VigilError>;

/// Unified error type used by core and server.
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Not Found")]
    NotFound { path: String },
    #[error("Method Not Allowed")]
    MethodNotAllowed { method: String, path: String },
    #[error("Too Many Requests")]
    RateLimited { retry_after_secs: u64 },
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Internal(String),
}

impl VigilError {
    /// Map internal error to a stable client-facing code.
    pub fn client_code(&self) -> ClientCode {
        match self {
            VigilError::Validation(_) => ClientCode::ValidationFailed,
            VigilError::BadRequest(_) => ClientCode::BadRequest,
            VigilError::Unauthorized => ClientCode::Unauthorized,
            VigilError::NotFound { .. } => ClientCode::NotFound,
            VigilError::MethodNotAllowed { .. } => ClientCode::MethodNotAllowed,
            VigilError::RateLimited { .. } => ClientCode::RateLimited,
            VigilError::InvalidConfig(_) | VigilError::Internal(_) => ClientCode::Internal,
        }
    }

    /// Numeric HTTP status for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            VigilError::Validation(_) | VigilError::BadRequest(_) => 400,
            VigilError::Unauthorized => 401,
            VigilError::NotFound { .. } => 404,
            VigilError::MethodNotAllowed { .. } => 405,
            VigilError::RateLimited { .. } => 429,
            VigilError::InvalidConfig(_) | VigilError::Internal(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_and_code_mapping() {
        let cases = [
            (VigilError::Validation(vec![]), 400, "VALIDATION_FAILED"),
            (VigilError::BadRequest("x".into()), 400, "BAD_REQUEST"),
            (VigilError::Unauthorized, 401, "UNAUTHORIZED"),
            (VigilError::NotFound { path: "/x".into() }, 404, "NOT_FOUND"),
            (
                VigilError::MethodNotAllowed { method: "DELETE".into(), path: "/x".into() },
                405,
                "METHOD_NOT_ALLOWED",
            ),
            (VigilError::RateLimited { retry_after_secs: 3 }, 429, "RATE_LIMITED"),
            (VigilError::Internal("boom".into()), 500, "INTERNAL"),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_code(), status, "{err}");
            assert_eq!(err.client_code().as_str(), code);
        }
    }

    #[test]
    fn internal_message_passes_through() {
        assert_eq!(VigilError::Internal("db gone".into()).to_string(), "db gone");
    }
}
