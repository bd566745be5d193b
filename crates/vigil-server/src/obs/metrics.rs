//! Metrics registry for the HTTP server.
//!
//! Provides counter/gauge/histogram families with dynamic labels backed by
//! `DashMap`. Labels are flattened into sorted key vectors to keep
//! deterministic ordering. All mutation is additive on atomics, so `observe`
//! never fails and never waits on a render in progress beyond a shard lock.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Name of the request latency histogram.
pub const REQUEST_DURATION_METRIC: &str = "http_request_duration_seconds";

const BUCKET_COUNT: usize = 11;

/// Upper bounds in seconds, ascending. `+Inf` is implicit.
pub const DURATION_BUCKETS: [f64; BUCKET_COUNT] = [
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

type LabelKey = Vec<(String, String)>;

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn label_pairs(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

/// `{a="b"}` or nothing at all when there are no labels.
fn label_block(key: &LabelKey) -> String {
    if key.is_empty() {
        String::new()
    } else {
        format!("{{{}}}", label_pairs(key))
    }
}

fn write_header(out: &mut String, name: &str, help: &str, kind: &str) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} {}", name, kind);
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let key = label_key(labels);
        if let Some(counter) = self.map.get(&key) {
            counter.fetch_add(v, Ordering::Relaxed);
            return;
        }
        let counter = self.map.entry(key).or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, help: &str, out: &mut String) {
        write_header(out, name, help, "counter");
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{}{} {}", name, label_block(r.key()), val);
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) { self.add(labels, 1); }
    /// Decrement by 1.
    pub fn dec(&self, labels: &[(&str, &str)]) { self.add(labels, -1); }

    /// Add an arbitrary signed delta.
    pub fn add(&self, labels: &[(&str, &str)], v: i64) {
        let key = label_key(labels);
        if let Some(gauge) = self.map.get(&key) {
            gauge.fetch_add(v, Ordering::Relaxed);
            return;
        }
        let gauge = self.map.entry(key).or_insert_with(|| AtomicI64::new(0));
        gauge.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, help: &str, out: &mut String) {
        write_header(out, name, help, "gauge");
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{}{} {}", name, label_block(r.key()), val);
        }
    }
}

struct AtomicHistogram {
    count: AtomicU64,
    sum_nanos: AtomicU64,
    buckets: [AtomicU64; BUCKET_COUNT],
}

impl Default for AtomicHistogram {
    fn default() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum_nanos: AtomicU64::new(0),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }
}

impl AtomicHistogram {
    fn record(&self, duration: Duration) {
        let secs = duration.as_secs_f64();
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);

        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_nanos.fetch_add(nanos, Ordering::Relaxed);

        // Cumulative buckets: increment every bucket whose bound covers the value.
        for (i, &le) in DURATION_BUCKETS.iter().enumerate() {
            if secs <= le {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    /// Observe a duration and increment cumulative buckets (seconds scale).
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let key = label_key(labels);
        if let Some(hist) = self.map.get(&key) {
            hist.record(duration);
            return;
        }
        self.map.entry(key).or_default().record(duration);
    }

    /// Number of samples recorded for an exact label set.
    pub fn sample_count(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|h| h.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Number of samples across every label set.
    pub fn total_count(&self) -> u64 {
        self.map.iter().map(|h| h.count.load(Ordering::Relaxed)).sum()
    }

    /// Render in Prometheus text exposition format (unit: seconds).
    fn render(&self, name: &str, help: &str, out: &mut String) {
        write_header(out, name, help, "histogram");
        for r in self.map.iter() {
            let hist = r.value();
            let label_str = label_pairs(r.key());
            let prefix = if label_str.is_empty() {
                String::new()
            } else {
                format!("{},", label_str)
            };

            for (i, &le) in DURATION_BUCKETS.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, count);
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);

            let sum = hist.sum_nanos.load(Ordering::Relaxed) as f64 / 1e9;
            let block = label_block(r.key());
            let _ = writeln!(out, "{}_sum{} {}", name, block, sum);
            let _ = writeln!(out, "{}_count{} {}", name, block, count);
        }
    }
}

/// A gauge whose value lives outside the registry (e.g. readiness).
#[derive(Debug, Clone, Copy)]
pub struct ExtraGauge {
    pub name: &'static str,
    pub help: &'static str,
    pub value: f64,
}

pub struct HttpMetrics {
    pub request_duration: HistogramVec,
    pub requests_in_flight: GaugeVec,
    pub rate_limited: CounterVec,
    started: Instant,
    start_time_unix: f64,
}

impl Default for HttpMetrics {
    fn default() -> Self {
        let start_time_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        Self {
            request_duration: HistogramVec::default(),
            requests_in_flight: GaugeVec::default(),
            rate_limited: CounterVec::default(),
            started: Instant::now(),
            start_time_unix,
        }
    }
}

impl HttpMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed request.
    pub fn observe(&self, method: &str, route: &str, status_code: u16, duration: Duration) {
        let status = status_code.to_string();
        self.request_duration.observe(
            &[("method", method), ("route", route), ("status_code", &status)],
            duration,
        );
    }

    /// Render all registered metrics plus any extra gauges provided by callers.
    pub fn render(&self, extra: &[ExtraGauge]) -> String {
        let mut out = String::new();
        self.request_duration.render(
            REQUEST_DURATION_METRIC,
            "Duration of HTTP requests in seconds",
            &mut out,
        );
        self.requests_in_flight.render(
            "http_requests_in_flight",
            "HTTP requests currently being served",
            &mut out,
        );
        self.rate_limited.render(
            "http_requests_rate_limited_total",
            "HTTP requests rejected by the rate limiter",
            &mut out,
        );
        for g in extra {
            write_header(&mut out, g.name, g.help, "gauge");
            let _ = writeln!(out, "{} {}", g.name, g.value);
        }
        self.render_process(&mut out);
        out
    }

    fn render_process(&self, out: &mut String) {
        write_header(
            out,
            "process_start_time_seconds",
            "Start time of the process since unix epoch in seconds",
            "gauge",
        );
        let _ = writeln!(out, "process_start_time_seconds {}", self.start_time_unix);

        write_header(
            out,
            "process_uptime_seconds",
            "Seconds since the metrics registry was created",
            "gauge",
        );
        let _ = writeln!(out, "process_uptime_seconds {}", self.started.elapsed().as_secs_f64());

        if let Some(rss) = procfs::resident_memory_bytes() {
            let help = "Resident memory size in bytes";
            write_header(out, "process_resident_memory_bytes", help, "gauge");
            let _ = writeln!(out, "process_resident_memory_bytes {}", rss);
        }
        if let Some(fds) = procfs::open_fds() {
            write_header(out, "process_open_fds", "Number of open file descriptors", "gauge");
            let _ = writeln!(out, "process_open_fds {}", fds);
        }
    }
}

/// Best-effort process stats. Absent outside Linux.
mod procfs {
    #[cfg(target_os = "linux")]
    pub fn resident_memory_bytes() -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
        let kib: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
        Some(kib * 1024)
    }

    #[cfg(target_os = "linux")]
    pub fn open_fds() -> Option<usize> {
        Some(std::fs::read_dir("/proc/self/fd").ok()?.count())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn resident_memory_bytes() -> Option<u64> {
        None
    }

    #[cfg(not(target_os = "linux"))]
    pub fn open_fds() -> Option<usize> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_buckets_are_cumulative() {
        let m = HttpMetrics::new();
        m.observe("GET", "/users", 200, Duration::from_millis(3));
        m.observe("GET", "/users", 200, Duration::from_millis(300));
        m.observe("GET", "/users", 200, Duration::from_secs(30));

        let out = m.render(&[]);
        let labels = r#"method="GET",route="/users",status_code="200""#;
        let prefix = format!("http_request_duration_seconds_bucket{{{labels},");
        assert!(out.contains(&format!("{prefix}le=\"0.005\"}} 1")), "{out}");
        assert!(out.contains(&format!("{prefix}le=\"0.5\"}} 2")), "{out}");
        assert!(out.contains(&format!("{prefix}le=\"10\"}} 2")), "{out}");
        assert!(out.contains(&format!("{prefix}le=\"+Inf\"}} 3")), "{out}");
        assert!(out.contains(&format!("http_request_duration_seconds_count{{{labels}}} 3")));
    }

    #[test]
    fn render_has_help_and_type_metadata() {
        let m = HttpMetrics::new();
        let out = m.render(&[ExtraGauge { name: "vigil_ready", help: "ready", value: 1.0 }]);
        assert!(out.contains(
            "# HELP http_request_duration_seconds Duration of HTTP requests in seconds"
        ));
        assert!(out.contains("# TYPE http_request_duration_seconds histogram"));
        assert!(out.contains("# TYPE vigil_ready gauge\nvigil_ready 1\n"));
        assert!(out.contains("# TYPE process_start_time_seconds gauge"));
    }

    #[test]
    fn label_sets_are_independent() {
        let m = HttpMetrics::new();
        m.observe("GET", "/users", 200, Duration::from_millis(1));
        m.observe("POST", "/users", 400, Duration::from_millis(1));
        let h = &m.request_duration;
        let ok = [("method", "GET"), ("route", "/users"), ("status_code", "200")];
        let reordered = [("status_code", "400"), ("route", "/users"), ("method", "POST")];
        assert_eq!(h.sample_count(&ok), 1);
        assert_eq!(h.sample_count(&reordered), 1);
        assert_eq!(h.total_count(), 2);
    }

    #[test]
    fn label_values_are_escaped() {
        let c = CounterVec::default();
        c.inc(&[("path", "a\"b\\c\nd")]);
        let mut out = String::new();
        c.render("x_total", "x", &mut out);
        assert!(out.contains(r#"x_total{path="a\"b\\c\nd"} 1"#), "{out}");
    }

    #[test]
    fn unlabelled_gauge_renders_without_braces() {
        let g = GaugeVec::default();
        g.inc(&[]);
        g.inc(&[]);
        g.dec(&[]);
        let mut out = String::new();
        g.render("in_flight", "x", &mut out);
        assert!(out.ends_with("in_flight 1\n"), "{out}");
    }

    #[test]
    fn concurrent_observations_are_not_lost() {
        let m = std::sync::Arc::new(HttpMetrics::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = std::sync::Arc::clone(&m);
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        m.observe("GET", "/x", 200, Duration::from_micros(10));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(m.request_duration.total_count(), 4000);
    }
}
