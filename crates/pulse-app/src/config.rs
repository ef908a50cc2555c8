//! Application configuration.

use crate::error::{AppError, AppResult};
use pulse_feed::DEFAULT_FEED_CAPACITY;
use pulse_ws::{
    ConnectionConfig, EndpointConfig, LivenessConfig, ReconnectPolicy, DEFAULT_RECONNECT_DELAY_MS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub websocket: WsConfig,
    #[serde(default)]
    pub feeds: FeedsConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub rest: RestConfig,
}

/// Server addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the dashboard server. `http(s)://` is mapped to `ws(s)://`
    /// for socket endpoints.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Base URL for REST calls. Defaults to `base_url`.
    #[serde(default)]
    pub rest_base_url: Option<String>,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            rest_base_url: None,
        }
    }
}

impl ServerConfig {
    pub fn rest_base_url(&self) -> &str {
        self.rest_base_url.as_deref().unwrap_or(&self.base_url)
    }

    /// Socket endpoint resolver for the configured base URL.
    pub fn endpoints(&self) -> AppResult<EndpointConfig> {
        Ok(EndpointConfig::new(&self.base_url)?)
    }
}

/// Bounded exponential backoff, used instead of the fixed delay when set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_backoff_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_backoff_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Maximum reconnect attempts (0 = infinite).
    #[serde(default)]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_jitter_ms")]
    pub jitter_ms: u64,
}

fn default_backoff_base_delay_ms() -> u64 {
    1_000
}

fn default_backoff_max_delay_ms() -> u64 {
    60_000
}

fn default_backoff_jitter_ms() -> u64 {
    500
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_backoff_base_delay_ms(),
            max_delay_ms: default_backoff_max_delay_ms(),
            max_attempts: 0,
            jitter_ms: default_backoff_jitter_ms(),
        }
    }
}

/// WebSocket configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WsConfig {
    /// Fixed delay between reconnect attempts (ms).
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Optional bounded backoff. Overrides the fixed delay.
    #[serde(default)]
    pub backoff: Option<BackoffConfig>,
    /// Handshake timeout (ms).
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Liveness check period (ms).
    #[serde(default = "default_liveness_check_interval_ms")]
    pub liveness_check_interval_ms: u64,
    /// Heartbeat age that forces a reconnect (ms). Not negotiated with the server.
    #[serde(default = "default_liveness_timeout_ms")]
    pub liveness_timeout_ms: u64,
}

fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

fn default_liveness_check_interval_ms() -> u64 {
    10_000
}

fn default_liveness_timeout_ms() -> u64 {
    45_000
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            reconnect_delay_ms: default_reconnect_delay_ms(),
            backoff: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            liveness_check_interval_ms: default_liveness_check_interval_ms(),
            liveness_timeout_ms: default_liveness_timeout_ms(),
        }
    }
}

impl WsConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        match &self.backoff {
            Some(backoff) => ReconnectPolicy::ExponentialBackoff {
                base_delay_ms: backoff.base_delay_ms,
                max_delay_ms: backoff.max_delay_ms,
                max_attempts: backoff.max_attempts,
                jitter_ms: backoff.jitter_ms,
            },
            None => ReconnectPolicy::Fixed {
                delay_ms: self.reconnect_delay_ms,
            },
        }
    }

    pub fn liveness(&self) -> LivenessConfig {
        LivenessConfig {
            check_interval_ms: self.liveness_check_interval_ms,
            timeout_ms: self.liveness_timeout_ms,
        }
    }

    /// Connection config for one feed URL.
    pub fn connection_config(&self, url: String, watch_liveness: bool) -> ConnectionConfig {
        let mut config = ConnectionConfig::new(url).with_reconnect(self.reconnect_policy());
        config.connect_timeout_ms = self.connect_timeout_ms;
        if watch_liveness {
            config = config.with_liveness(self.liveness());
        }
        config
    }
}

/// Which feeds to run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    /// Bots to mirror; one connection each.
    #[serde(default)]
    pub bot_ids: Vec<String>,
    #[serde(default = "default_true")]
    pub liquidation: bool,
    /// Symbol whose cumulative delta series is tracked.
    #[serde(default)]
    pub active_symbol: Option<String>,
    /// Capacity of the recent liquidation list.
    #[serde(default = "default_feed_capacity")]
    pub feed_capacity: usize,
    #[serde(default)]
    pub backtest: bool,
    #[serde(default)]
    pub correlation: bool,
    /// Also run the liveness watchdog on non-bot feeds.
    #[serde(default)]
    pub watch_all_liveness: bool,
}

fn default_true() -> bool {
    true
}

fn default_feed_capacity() -> usize {
    DEFAULT_FEED_CAPACITY
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            bot_ids: Vec::new(),
            liquidation: true,
            active_symbol: None,
            feed_capacity: default_feed_capacity(),
            backtest: false,
            correlation: false,
            watch_all_liveness: false,
        }
    }
}

/// Logging and summary output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default)]
    pub log_filter: Option<String>,
    /// Period of the state summary log (seconds).
    #[serde(default = "default_summary_interval_secs")]
    pub summary_interval_secs: u64,
}

fn default_summary_interval_secs() -> u64 {
    30
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: None,
            summary_interval_secs: default_summary_interval_secs(),
        }
    }
}

/// REST collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_rest_timeout_ms")]
    pub timeout_ms: u64,
    /// Symbols whose sentiment is logged with each summary.
    #[serde(default)]
    pub sentiment_symbols: Vec<String>,
}

fn default_rest_timeout_ms() -> u64 {
    5_000
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_rest_timeout_ms(),
            sentiment_symbols: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;

        Self::from_toml(&content)
    }

    /// Parse and validate TOML content.
    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.server.endpoints()?;
        if self.feeds.feed_capacity == 0 {
            return Err(AppError::Config(
                "feeds.feed_capacity must be at least 1".to_string(),
            ));
        }
        if self.websocket.backoff.is_none() && self.websocket.reconnect_delay_ms == 0 {
            return Err(AppError::Config(
                "websocket.reconnect_delay_ms must be positive".to_string(),
            ));
        }
        if self
            .websocket
            .backoff
            .as_ref()
            .is_some_and(|b| b.base_delay_ms == 0)
        {
            return Err(AppError::Config(
                "websocket.backoff.base_delay_ms must be positive".to_string(),
            ));
        }
        if self.websocket.connect_timeout_ms == 0 {
            return Err(AppError::Config(
                "websocket.connect_timeout_ms must be positive".to_string(),
            ));
        }
        if self.websocket.liveness_check_interval_ms == 0 {
            return Err(AppError::Config(
                "websocket.liveness_check_interval_ms must be positive".to_string(),
            ));
        }
        if self.websocket.liveness_timeout_ms <= self.websocket.liveness_check_interval_ms {
            return Err(AppError::Config(
                "websocket.liveness_timeout_ms must exceed the check interval".to_string(),
            ));
        }
        if self.telemetry.summary_interval_secs == 0 {
            return Err(AppError::Config(
                "telemetry.summary_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = AppConfig::from_toml("").unwrap();

        assert_eq!(config.server.base_url, "http://localhost:8000");
        assert_eq!(config.server.rest_base_url(), "http://localhost:8000");
        assert_eq!(config.websocket.reconnect_delay_ms, 3000);
        assert_eq!(config.websocket.liveness_timeout_ms, 45_000);
        assert!(config.feeds.liquidation);
        assert!(!config.feeds.backtest);
        assert_eq!(config.feeds.feed_capacity, 50);
        assert_eq!(
            config.websocket.reconnect_policy(),
            ReconnectPolicy::Fixed { delay_ms: 3000 }
        );
    }

    #[test]
    fn test_backoff_section_selects_exponential_policy() {
        let config = AppConfig::from_toml(
            r#"
            [websocket.backoff]
            base_delay_ms = 500
            max_attempts = 8
            "#,
        )
        .unwrap();

        assert_eq!(
            config.websocket.reconnect_policy(),
            ReconnectPolicy::ExponentialBackoff {
                base_delay_ms: 500,
                max_delay_ms: 60_000,
                max_attempts: 8,
                jitter_ms: 500,
            }
        );
    }

    #[test]
    fn test_connection_config_liveness_is_opt_in() {
        let ws = WsConfig::default();

        let plain = ws.connection_config("ws://host/a".to_string(), false);
        assert!(plain.liveness.is_none());
        assert_eq!(plain.url, "ws://host/a");

        let watched = ws.connection_config("ws://host/b".to_string(), true);
        assert_eq!(watched.liveness, Some(LivenessConfig::default()));
    }

    #[test]
    fn test_full_config() {
        let config = AppConfig::from_toml(
            r#"
            [server]
            base_url = "https://dash.example.com"
            rest_base_url = "https://api.example.com"

            [feeds]
            bot_ids = ["7", "12"]
            active_symbol = "ETHUSDT"
            correlation = true

            [rest]
            sentiment_symbols = ["BTC"]
            "#,
        )
        .unwrap();

        assert_eq!(config.server.rest_base_url(), "https://api.example.com");
        assert_eq!(
            config.server.endpoints().unwrap().base_url(),
            "wss://dash.example.com"
        );
        assert_eq!(config.feeds.bot_ids, vec!["7", "12"]);
        assert_eq!(config.feeds.active_symbol.as_deref(), Some("ETHUSDT"));
        assert!(config.feeds.correlation);
        assert_eq!(config.rest.sentiment_symbols, vec!["BTC"]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AppConfig::from_toml("[server]\nbase_url = \"ftp://x\"").is_err());
        assert!(AppConfig::from_toml("[feeds]\nfeed_capacity = 0").is_err());
        assert!(AppConfig::from_toml(
            "[websocket]\nliveness_check_interval_ms = 10000\nliveness_timeout_ms = 5000"
        )
        .is_err());
        assert!(AppConfig::from_toml("not = [valid").is_err());
    }

    #[test]
    fn test_zero_reconnect_timing_rejected() {
        for content in [
            "[websocket]\nreconnect_delay_ms = 0",
            "[websocket]\nconnect_timeout_ms = 0",
            "[websocket.backoff]\nbase_delay_ms = 0",
        ] {
            assert!(
                matches!(AppConfig::from_toml(content), Err(AppError::Config(_))),
                "accepted: {content}"
            );
        }

        // The fixed delay is unused when backoff is configured.
        let config =
            AppConfig::from_toml("[websocket]\nreconnect_delay_ms = 0\n[websocket.backoff]")
                .unwrap();
        assert!(config.websocket.backoff.is_some());
    }

    #[test]
    fn test_missing_file() {
        let err = AppConfig::from_file("/nonexistent/pulse.toml").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
