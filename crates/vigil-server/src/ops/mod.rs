//! Operational HTTP endpoints.
//!
//! - `/health`, `/live` : liveness, always `200 {"status":"ok"}`
//! - `/ready`           : readiness (`READY` or 503 `NOT_READY`)
//! - `/admin/ready`     : token-gated readiness switch
//! - `/metrics`         : Prometheus text format

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use vigil_core::error::VigilError;

use crate::app_state::AppState;
use crate::error::ApiError;

pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    if state.readiness().probe().await.is_up() {
        (StatusCode::OK, "READY")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT_READY")
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminReadyQuery {
    pub state: Option<String>,
}

/// Token is checked before the query string is looked at, so an
/// unauthenticated caller always gets 401 whatever the query holds.
pub async fn set_readiness(
    State(state): State<AppState>,
    headers: HeaderMap,
    query: Result<Query<AdminReadyQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let token = headers.get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok());
    let readiness = state.readiness();

    let requested = match query {
        Ok(Query(q)) => q.state,
        Err(rej) => {
            readiness.authorize(token)?;
            return Err(VigilError::BadRequest(rej.body_text()).into());
        }
    };
    let now = readiness.transition(requested.as_deref(), token)?;
    Ok(Json(json!({ "ready": now.is_up() })))
}

pub async fn metrics(State(state): State<AppState>) -> Response {
    let extra = state.metrics_extra();
    let body = state.metrics().render(&extra);

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, METRICS_CONTENT_TYPE)],
        body,
    )
        .into_response()
}
