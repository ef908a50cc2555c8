//! Prometheus metrics and structured logging for pulse feeds.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Prometheus gauges/counters for connection health and mirror activity

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, DEFAULT_LOG_FILTER};
pub use metrics::Metrics;
