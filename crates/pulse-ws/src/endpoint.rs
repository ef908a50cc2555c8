//! Socket endpoint addressing.
//!
//! The server base URL is explicit configuration handed to each feed at
//! construction time; nothing is read from process-wide tables.

use crate::error::{WsError, WsResult};
use std::fmt;

/// Logical feed exposed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Backtest progress stream.
    Backtest,
    /// Status stream of a single bot.
    BotStatus { bot_id: String },
    /// Market-wide liquidation stream.
    LiquidationStream,
    /// Cross-asset correlation updates.
    Correlation,
}

impl Endpoint {
    /// Path of the endpoint relative to the server base URL.
    pub fn path(&self) -> String {
        match self {
            Self::Backtest => "/ws/backtest".to_string(),
            Self::BotStatus { bot_id } => format!("/api/v1/bots/{bot_id}/ws/status"),
            Self::LiquidationStream => "/api/v1/liquidation/ws/stream".to_string(),
            Self::Correlation => "/api/v1/analytics/ws/correlation".to_string(),
        }
    }

    /// Short name used as a log field and metric label.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Backtest => "backtest",
            Self::BotStatus { .. } => "bot_status",
            Self::LiquidationStream => "liquidation",
            Self::Correlation => "correlation",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BotStatus { bot_id } => write!(f, "bot_status:{bot_id}"),
            other => f.write_str(other.name()),
        }
    }
}

/// Base address of the feed server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    base_url: String,
}

impl EndpointConfig {
    /// Create from a base URL.
    ///
    /// `http://` and `https://` bases are mapped to `ws://` and `wss://`.
    pub fn new(base_url: &str) -> WsResult<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');

        let base_url = if let Some(rest) = trimmed.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = trimmed.strip_prefix("http://") {
            format!("ws://{rest}")
        } else if trimmed.starts_with("wss://") || trimmed.starts_with("ws://") {
            trimmed.to_string()
        } else {
            return Err(WsError::InvalidUrl(base_url.to_string()));
        };

        let host = base_url.split("://").nth(1).unwrap_or_default();
        if host.is_empty() {
            return Err(WsError::InvalidUrl(base_url));
        }

        Ok(Self { base_url })
    }

    /// Base URL with a WebSocket scheme.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of an endpoint.
    pub fn url_for(&self, endpoint: &Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}
