//! Axum router wiring.
//!
//! Routes and the fallbacks are registered first, then the stage stack from
//! [`crate::middleware`] is layered over all of them. Each route answers an
//! unsupported method with the JSON 405 envelope instead of axum's empty one.

use axum::{
    extract::{DefaultBodyLimit, OriginalUri},
    http::{Method, Uri},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, MethodRouter},
    Router,
};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

use vigil_core::error::VigilError;

use crate::app_state::AppState;
use crate::error::{panic_response, ApiError};
use crate::middleware::{access_log, rate_limit, request_id, security, timing};
use crate::{ops, routes};

pub fn build_router(state: AppState) -> Router {
    build_router_with(state, Router::new())
}

/// Same stage stack as [`build_router`], with `extra` routes mounted beside
/// the built-in ones. Paths in `extra` must not overlap the built-in routes.
pub fn build_router_with(state: AppState, extra: Router<AppState>) -> Router {
    let body_limit = state.cfg().body_limit_bytes;

    // ServiceBuilder: first layer listed is outermost.
    let stages = ServiceBuilder::new()
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(from_fn(request_id::assign_request_id))
        .layer(access_log::layer())
        .layer(from_fn_with_state(state.clone(), rate_limit::enforce_rate_limit))
        .layer(from_fn_with_state(state.clone(), timing::track_requests))
        .layer(security::cors())
        .layer(CatchPanicLayer::custom(panic_response));

    let users = get(routes::users::list_users).post(routes::users::create_user);

    let mut router = Router::new()
        .route("/health", json_405(get(ops::liveness)))
        .route("/live", json_405(get(ops::liveness)))
        .route("/ready", json_405(get(ops::readiness)))
        .route("/admin/ready", json_405(post(ops::set_readiness)))
        .route("/metrics", json_405(get(ops::metrics)))
        .route("/users", json_405(users))
        .merge(extra)
        .fallback(not_found)
        .layer(stages);

    for headers in security::header_layers() {
        router = router.layer(headers);
    }

    router.with_state(state)
}

fn json_405(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.fallback(method_not_allowed)
}

fn original_path(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_owned())
        .unwrap_or_else(|| uri.path().to_owned())
}

async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError(VigilError::NotFound { path: original_path(&uri) })
}

async fn method_not_allowed(method: Method, OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError(VigilError::MethodNotAllowed {
        method: method.to_string(),
        path: original_path(&uri),
    })
}
