//! Observability: in-process Prometheus-compatible metrics.
//!
//! Metrics are stored as atomics behind `DashMap` label maps and rendered on
//! pull by the `/metrics` handler.

pub mod metrics;

pub use metrics::{ExtraGauge, HttpMetrics, REQUEST_DURATION_METRIC};
