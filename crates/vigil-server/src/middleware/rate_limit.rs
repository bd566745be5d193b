//! Fixed-window rate limiter.
//!
//! One counter per client key, shared across the process. A window opens on
//! the first hit from a key and lasts `window`; hits beyond `max` inside it
//! are rejected with 429 and a `Retry-After` hint. Expired windows are pruned
//! lazily once the map grows past `MAX_TRACKED_CLIENTS`.
//!
//! Rejections still go through [`RequestTimer`] so every request is observed
//! exactly once, whether or not it reached a route.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use vigil_core::error::VigilError;

use crate::app_state::AppState;
use crate::config::RateLimitConfig;
use crate::error::ApiError;
use crate::middleware::timing::{route_label, RequestTimer};

const MAX_TRACKED_CLIENTS: usize = 10_000;
const UNKNOWN_CLIENT: &str = "unknown";

pub const LIMIT_HEADER: &str = "ratelimit-limit";
pub const REMAINING_HEADER: &str = "ratelimit-remaining";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    hits: u32,
}

#[derive(Debug)]
pub struct FixedWindowLimiter {
    window: Duration,
    max: u32,
    clients: DashMap<String, Window>,
}

impl FixedWindowLimiter {
    pub fn new(cfg: RateLimitConfig) -> Self {
        Self {
            window: Duration::from_millis(cfg.window_ms.max(1)),
            max: cfg.max.max(1),
            clients: DashMap::new(),
        }
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    pub fn tracked_clients(&self) -> usize {
        self.clients.len()
    }

    pub fn check(&self, key: &str) -> RateDecision {
        self.check_at(key, Instant::now())
    }

    pub fn check_at(&self, key: &str, now: Instant) -> RateDecision {
        let decision = {
            let mut w = self
                .clients
                .entry(key.to_string())
                .or_insert(Window { started: now, hits: 0 });

            if now.duration_since(w.started) >= self.window {
                *w = Window { started: now, hits: 0 };
            }

            if w.hits >= self.max {
                let reset_in = self.window.saturating_sub(now.duration_since(w.started));
                RateDecision::Limited {
                    retry_after_secs: ceil_secs(reset_in).max(1),
                }
            } else {
                w.hits += 1;
                RateDecision::Allowed { remaining: self.max - w.hits }
            }
        };

        if self.clients.len() > MAX_TRACKED_CLIENTS {
            self.prune_expired(now);
        }
        decision
    }

    /// Drop windows that have fully elapsed. Returns how many were removed.
    pub fn prune_expired(&self, now: Instant) -> usize {
        let before = self.clients.len();
        self.clients
            .retain(|_, w| now.duration_since(w.started) < self.window);
        let removed = before.saturating_sub(self.clients.len());
        if removed > 0 {
            tracing::debug!(removed, remaining = self.clients.len(), "rate limiter windows pruned");
        }
        removed
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let secs = d.as_secs();
    if d.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

/// Peer address when the server was started with connect info, else the first
/// `x-forwarded-for` hop, else a shared bucket.
pub fn client_key(req: &Request) -> String {
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

pub async fn enforce_rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let limiter = state.limiter();
    let key = client_key(&req);

    match limiter.check(&key) {
        RateDecision::Allowed { remaining } => {
            let mut res = next.run(req).await;
            let headers = res.headers_mut();
            headers.insert(LIMIT_HEADER, HeaderValue::from(limiter.max()));
            headers.insert(REMAINING_HEADER, HeaderValue::from(remaining));
            res
        }
        RateDecision::Limited { retry_after_secs } => {
            tracing::debug!(client = %key, retry_after_secs, "rate limited");
            let metrics = state.metrics();
            metrics.rate_limited.inc(&[]);
            let timer = RequestTimer::start(metrics, req.method().as_str(), route_label(&req));

            let mut res = ApiError(VigilError::RateLimited { retry_after_secs }).into_response();
            let headers = res.headers_mut();
            headers.insert(LIMIT_HEADER, HeaderValue::from(limiter.max()));
            headers.insert(REMAINING_HEADER, HeaderValue::from(0u32));
            timer.finish(res.status().as_u16());
            res
        }
    }
}
