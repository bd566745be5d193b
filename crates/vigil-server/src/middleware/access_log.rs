//! Access logging via `tower-http`'s `TraceLayer`.
//!
//! Each request gets an `http` span carrying the request id, method, and URI;
//! the response event adds status and latency.

use axum::http::Request;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultOnResponse, MakeSpan, TraceLayer};
use tower_http::LatencyUnit;
use tracing::{Level, Span};

use crate::middleware::request_id::RequestId;

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, req: &Request<B>) -> Span {
        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map(RequestId::as_str)
            .unwrap_or("-");
        tracing::info_span!(
            "http",
            request_id = %request_id,
            method = %req.method(),
            uri = %req.uri(),
        )
    }
}

pub type AccessLogLayer = TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan>;

pub fn layer() -> AccessLogLayer {
    TraceLayer::new_for_http()
        .make_span_with(RequestSpan)
        .on_response(DefaultOnResponse::new().level(Level::INFO).latency_unit(LatencyUnit::Millis))
}
