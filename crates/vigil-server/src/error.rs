//! HTTP rendering of `VigilError`.
//!
//! Every error leaves the server as `{"error": <message>, "code": <CODE>, ...}`
//! with optional context keys (`details`, `path`, `method`, `retry_after`).

use std::any::Any;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use vigil_core::error::VigilError;

/// Response-side wrapper so handlers can `?` on core results.
#[derive(Debug)]
pub struct ApiError(pub VigilError);

impl From<VigilError> for ApiError {
    fn from(err: VigilError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut body = json!({
            "error": err.to_string(),
            "code": err.client_code().as_str(),
        });
        match &err {
            VigilError::Validation(fields) => body["details"] = json!(fields),
            VigilError::NotFound { path } => body["path"] = json!(path),
            VigilError::MethodNotAllowed { method, path } => {
                body["method"] = json!(method);
                body["path"] = json!(path);
            }
            VigilError::RateLimited { retry_after_secs } => {
                body["retry_after"] = json!(retry_after_secs)
            }
            VigilError::InvalidConfig(msg) | VigilError::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
            }
            VigilError::BadRequest(_) | VigilError::Unauthorized => {}
        }

        let mut res = (status, Json(body)).into_response();
        if let VigilError::RateLimited { retry_after_secs } = err {
            res.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        res
    }
}

/// Terminal handler for panics escaping route code.
pub fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let msg = if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Internal Server Error".to_string()
    };
    ApiError(VigilError::Internal(msg)).into_response()
}
