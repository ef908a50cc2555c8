//! Liveness watchdog.
//!
//! Detects sockets that died silently without ever delivering a close
//! event. After the connection opens, the owner checks periodically
//! whether the last heartbeat is older than the threshold and, if so,
//! force-closes the socket with [`LIVENESS_CLOSE_CODE`].

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Close code sent when the watchdog force-closes a connection.
/// Lies in the 4000-4999 range reserved for applications.
pub const LIVENESS_CLOSE_CODE: u16 = 4000;

/// Close reason sent alongside [`LIVENESS_CLOSE_CODE`].
pub const LIVENESS_CLOSE_REASON: &str = "liveness timeout";

/// Watchdog timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LivenessConfig {
    /// How often the heartbeat age is checked.
    pub check_interval_ms: u64,
    /// Maximum heartbeat age before the connection is considered dead.
    /// Must exceed the server ping interval (30s).
    pub timeout_ms: u64,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 10_000,
            timeout_ms: 45_000,
        }
    }
}

/// Tracks the last heartbeat of one connection.
pub struct LivenessWatchdog {
    config: LivenessConfig,
    /// Monotonic time of the last heartbeat (or of the last reset).
    last_heartbeat: RwLock<Instant>,
    /// Wall-clock time of the last heartbeat actually received.
    last_heartbeat_at: RwLock<Option<DateTime<Utc>>>,
}

impl LivenessWatchdog {
    pub fn new(config: LivenessConfig) -> Self {
        Self {
            config,
            last_heartbeat: RwLock::new(Instant::now()),
            last_heartbeat_at: RwLock::new(None),
        }
    }

    /// Restart the window (called when a connection opens).
    pub fn reset(&self) {
        *self.last_heartbeat.write() = Instant::now();
        *self.last_heartbeat_at.write() = None;
    }

    /// Record that a heartbeat was received.
    pub fn record_heartbeat(&self) {
        let elapsed = self.elapsed();
        *self.last_heartbeat.write() = Instant::now();
        *self.last_heartbeat_at.write() = Some(Utc::now());
        debug!(gap_ms = elapsed.as_millis() as u64, "Heartbeat recorded");
    }

    /// Time since the last heartbeat.
    pub fn elapsed(&self) -> Duration {
        self.last_heartbeat.read().elapsed()
    }

    /// Whether the heartbeat gap exceeds the threshold.
    pub fn is_expired(&self) -> bool {
        self.elapsed() > Duration::from_millis(self.config.timeout_ms)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.config.check_interval_ms)
    }

    pub fn config(&self) -> LivenessConfig {
        self.config
    }

    pub fn stats(&self) -> WatchdogStats {
        WatchdogStats {
            last_heartbeat_at: *self.last_heartbeat_at.read(),
            heartbeat_age_ms: self.elapsed().as_millis() as u64,
            expired: self.is_expired(),
        }
    }
}

/// Watchdog statistics.
#[derive(Debug, Clone)]
pub struct WatchdogStats {
    pub last_heartbeat_at: Option<DateTime<Utc>>,
    pub heartbeat_age_ms: u64,
    pub expired: bool,
}
