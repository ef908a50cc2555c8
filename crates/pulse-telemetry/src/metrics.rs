//! Prometheus metrics for pulse feeds.
//!
//! Connection counters live in each `ConnectionManager`; they are copied
//! into gauges here by [`Metrics::export_stats`] on every summary tick.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means
//! duplicate metric names, a programming error that should crash at
//! startup. These panics only occur during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_gauge_vec, register_int_counter_vec, register_int_gauge_vec, Encoder, GaugeVec,
    IntCounterVec, IntGaugeVec, TextEncoder,
};
use pulse_ws::ConnectionStats;

/// Connection state per feed (1 = open).
pub static WS_CONNECTED: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pulse_ws_connected",
        "WebSocket connection state (1=open)",
        &["feed"]
    )
    .unwrap()
});

/// Connect attempts per feed.
pub static WS_CONNECT_ATTEMPTS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pulse_ws_connect_attempts",
        "Total WebSocket connect attempts",
        &["feed"]
    )
    .unwrap()
});

/// Reconnects per feed.
pub static WS_RECONNECTS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pulse_ws_reconnects",
        "Total WebSocket reconnects after the reconnect delay",
        &["feed"]
    )
    .unwrap()
});

/// Frames received per feed.
pub static WS_FRAMES_RECEIVED: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pulse_ws_frames_received",
        "Total frames received",
        &["feed"]
    )
    .unwrap()
});

/// Heartbeats per feed.
pub static WS_HEARTBEATS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pulse_ws_heartbeats",
        "Total heartbeats received",
        &["feed"]
    )
    .unwrap()
});

/// Malformed frames dropped per feed.
pub static WS_PARSE_ERRORS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pulse_ws_parse_errors",
        "Total malformed frames dropped",
        &["feed"]
    )
    .unwrap()
});

/// Watchdog-forced closes per feed.
pub static WS_LIVENESS_TIMEOUTS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pulse_ws_liveness_timeouts",
        "Total connections force-closed by the liveness watchdog",
        &["feed"]
    )
    .unwrap()
});

/// Mirror revision per feed.
pub static MIRROR_REVISION: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "pulse_mirror_revision",
        "Number of visible state changes applied to the local mirror",
        &["feed"]
    )
    .unwrap()
});

/// Cumulative liquidation volume (USD).
/// Labels: side (long/short/total)
pub static LIQUIDATION_VOLUME: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "pulse_liquidation_volume_usd",
        "Cumulative liquidation volume in USD",
        &["side"]
    )
    .unwrap()
});

/// REST calls answered with a fallback value.
pub static REST_FALLBACK_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "pulse_rest_fallback_total",
        "REST requests that failed and were answered with a fallback value",
        &["endpoint"]
    )
    .unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    /// Copy one connection's counters into the gauges.
    pub fn export_stats(feed: &str, stats: &ConnectionStats, connected: bool) {
        WS_CONNECTED
            .with_label_values(&[feed])
            .set(i64::from(connected));
        WS_CONNECT_ATTEMPTS
            .with_label_values(&[feed])
            .set(stats.connect_attempts as i64);
        WS_RECONNECTS
            .with_label_values(&[feed])
            .set(stats.reconnects as i64);
        WS_FRAMES_RECEIVED
            .with_label_values(&[feed])
            .set(stats.frames_received as i64);
        WS_HEARTBEATS
            .with_label_values(&[feed])
            .set(stats.heartbeats as i64);
        WS_PARSE_ERRORS
            .with_label_values(&[feed])
            .set(stats.parse_errors as i64);
        WS_LIVENESS_TIMEOUTS
            .with_label_values(&[feed])
            .set(stats.liveness_timeouts as i64);
    }

    /// Record the mirror revision of a feed.
    pub fn mirror_revision(feed: &str, revision: u64) {
        MIRROR_REVISION
            .with_label_values(&[feed])
            .set(revision as i64);
    }

    /// Record cumulative liquidation volumes.
    pub fn liquidation_volume(long: f64, short: f64, total: f64) {
        LIQUIDATION_VOLUME.with_label_values(&["long"]).set(long);
        LIQUIDATION_VOLUME.with_label_values(&["short"]).set(short);
        LIQUIDATION_VOLUME.with_label_values(&["total"]).set(total);
    }

    /// Record a REST fallback.
    pub fn rest_fallback(endpoint: &str) {
        REST_FALLBACK_TOTAL.with_label_values(&[endpoint]).inc();
    }

    /// Render all registered metrics in the Prometheus text format.
    pub fn render() -> crate::TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| crate::TelemetryError::Metrics(e.to_string()))
    }
}
