//! Request timing.
//!
//! [`RequestTimer`] starts on a monotonic clock and records exactly one
//! observation when dropped. Normal completion sets the final status first;
//! if the downstream future is dropped before a response exists (client gone),
//! the drop still fires and records status `499`.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};

use crate::app_state::AppState;
use crate::obs::HttpMetrics;

/// Status recorded when no response was produced.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

pub struct RequestTimer {
    metrics: Arc<HttpMetrics>,
    method: String,
    route: String,
    started: Instant,
    status: Option<u16>,
}

impl RequestTimer {
    pub fn start(
        metrics: Arc<HttpMetrics>,
        method: impl Into<String>,
        route: impl Into<String>,
    ) -> Self {
        let method = method.into();
        metrics.requests_in_flight.inc(&[("method", &method)]);
        Self {
            metrics,
            method,
            route: route.into(),
            started: Instant::now(),
            status: None,
        }
    }

    /// Record `status` and end the measurement.
    pub fn finish(mut self, status: u16) {
        self.status = Some(status);
    }
}

impl Drop for RequestTimer {
    fn drop(&mut self) {
        let status = self.status.unwrap_or(CLIENT_CLOSED_REQUEST);
        self.metrics
            .observe(&self.method, &self.route, status, self.started.elapsed());
        self.metrics.requests_in_flight.dec(&[("method", &self.method)]);
    }
}

/// Matched route template when the router found one, raw path otherwise.
pub fn route_label(req: &Request) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned())
}

pub async fn track_requests(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let timer = RequestTimer::start(state.metrics(), req.method().as_str(), route_label(&req));
    let res = next.run(req).await;
    timer.finish(res.status().as_u16());
    res
}
