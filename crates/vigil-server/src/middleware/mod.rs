//! Request pipeline stages.
//!
//! Composed once in [`crate::router::build_router`], outermost first:
//!
//! ```text
//! security headers -> body limit -> request id -> access log -> rate limit
//!   -> request timing -> CORS -> panic catcher -> route / fallback
//! ```
//!
//! Identity runs before access logging so every log line carries the id.
//! Timing wraps everything from dispatch inward so handler latency counts.
//! CORS sits inside timing so preflights it answers still get a request id
//! and a histogram observation.

pub mod access_log;
pub mod rate_limit;
pub mod request_id;
pub mod security;
pub mod timing;

pub use rate_limit::{FixedWindowLimiter, RateDecision};
pub use request_id::{RequestId, REQUEST_ID_HEADER};
pub use timing::RequestTimer;
