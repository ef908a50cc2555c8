//! WebSocket connection manager.
//!
//! Owns one socket per logical feed. The message loop is the transport
//! connector; the outer loop is the reconnect supervisor. Lifecycle events
//! and domain messages are surfaced to the owner through an mpsc channel,
//! strictly in arrival order.

use crate::error::{WsError, WsResult, ABNORMAL_CLOSE_CODE};
use crate::message::{FeedMessage, Update};
use crate::reconnect::ReconnectPolicy;
use crate::watchdog::{
    LivenessConfig, LivenessWatchdog, LIVENESS_CLOSE_CODE, LIVENESS_CLOSE_REASON,
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval};
use tokio_tungstenite::connect_async_tls_with_config;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Close code reported when the owner tears the connection down.
const TEARDOWN_CLOSE_CODE: u16 = 1000;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// WebSocket URL.
    pub url: String,
    /// Reconnect scheduling.
    pub reconnect: ReconnectPolicy,
    /// Liveness watchdog timing (None = disabled).
    pub liveness: Option<LivenessConfig>,
    /// Maximum time to wait for the opening handshake.
    pub connect_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            reconnect: ReconnectPolicy::default(),
            liveness: None,
            connect_timeout_ms: 10_000,
        }
    }
}

impl ConnectionConfig {
    /// Default configuration for a URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    pub fn with_liveness(mut self, liveness: LivenessConfig) -> Self {
        self.liveness = Some(liveness);
        self
    }
}

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        }
    }
}

/// Lifecycle signal or domain message surfaced to the owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Handshake completed.
    Opened,
    /// Domain message. Heartbeats are consumed by the watchdog and never sent.
    Message(Update),
    /// Session ended (one per connect attempt).
    Closed { code: u16, reason: String },
}

/// Counters exposed for observability.
#[derive(Debug, Clone)]
pub struct ConnectionStats {
    pub state: ConnectionState,
    pub connect_attempts: u64,
    pub reconnects: u64,
    pub frames_received: u64,
    pub heartbeats: u64,
    pub parse_errors: u64,
    pub liveness_timeouts: u64,
    pub last_activity: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Counters {
    connect_attempts: AtomicU64,
    reconnects: AtomicU64,
    frames_received: AtomicU64,
    heartbeats: AtomicU64,
    parse_errors: AtomicU64,
    liveness_timeouts: AtomicU64,
}

/// WebSocket connection manager.
pub struct ConnectionManager {
    config: ConnectionConfig,
    state: RwLock<ConnectionState>,
    last_activity: RwLock<Option<DateTime<Utc>>>,
    watchdog: Option<LivenessWatchdog>,
    event_tx: mpsc::Sender<ConnectionEvent>,
    /// Consecutive reconnect attempts since the last successful open.
    reconnect_count: RwLock<u32>,
    counters: Counters,
    /// Cancellation token for teardown.
    shutdown_token: CancellationToken,
}

impl ConnectionManager {
    /// Create a new connection manager.
    pub fn new(config: ConnectionConfig, event_tx: mpsc::Sender<ConnectionEvent>) -> Self {
        let watchdog = config.liveness.map(LivenessWatchdog::new);
        Self {
            config,
            state: RwLock::new(ConnectionState::Closed),
            last_activity: RwLock::new(None),
            watchdog,
            event_tx,
            reconnect_count: RwLock::new(0),
            counters: Counters::default(),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    /// Get current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Time of the last frame of any kind.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        *self.last_activity.read()
    }

    pub fn watchdog(&self) -> Option<&LivenessWatchdog> {
        self.watchdog.as_ref()
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            state: self.state(),
            connect_attempts: self.counters.connect_attempts.load(Ordering::Relaxed),
            reconnects: self.counters.reconnects.load(Ordering::Relaxed),
            frames_received: self.counters.frames_received.load(Ordering::Relaxed),
            heartbeats: self.counters.heartbeats.load(Ordering::Relaxed),
            parse_errors: self.counters.parse_errors.load(Ordering::Relaxed),
            liveness_timeouts: self.counters.liveness_timeouts.load(Ordering::Relaxed),
            last_activity: self.last_activity(),
        }
    }

    /// Tear the connection down.
    ///
    /// Closes the active socket and cancels any pending reconnect timer.
    pub fn shutdown(&self) {
        if !self.shutdown_token.is_cancelled() {
            info!(url = %self.config.url, "Connection teardown requested");
        }
        self.shutdown_token.cancel();
    }

    /// Check if teardown has been requested.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    /// Connect and keep reconnecting until teardown.
    ///
    /// Returns `Ok(())` on teardown, or an error when a bounded reconnect
    /// policy gives up.
    pub async fn run(&self) -> WsResult<()> {
        loop {
            if self.is_shutdown() {
                info!("Teardown requested, exiting connect loop");
                self.set_state(ConnectionState::Closed);
                return Ok(());
            }

            self.set_state(ConnectionState::Connecting);
            self.counters.connect_attempts.fetch_add(1, Ordering::Relaxed);

            match self.try_connect().await {
                Ok(()) => {
                    info!(url = %self.config.url, "WebSocket closed by teardown");
                    self.set_state(ConnectionState::Closed);
                    let _ = self.event_tx.try_send(ConnectionEvent::Closed {
                        code: TEARDOWN_CLOSE_CODE,
                        reason: "teardown".to_string(),
                    });
                    return Ok(());
                }
                Err(e) => {
                    let (code, reason) = e.close_info();
                    self.set_state(ConnectionState::Closed);
                    warn!(url = %self.config.url, code, %reason, "WebSocket session ended");
                    self.emit(ConnectionEvent::Closed { code, reason }).await;
                }
            }

            if self.is_shutdown() {
                info!("Teardown requested after disconnect, not reconnecting");
                return Ok(());
            }

            let attempt = {
                let mut count = self.reconnect_count.write();
                *count += 1;
                *count
            };

            let Some(delay) = self.config.reconnect.next_delay(attempt) else {
                error!(url = %self.config.url, attempt, "Reconnect attempts exhausted");
                return Err(WsError::ReconnectExhausted {
                    attempts: attempt - 1,
                });
            };

            warn!(
                url = %self.config.url,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "Reconnecting"
            );

            // Wait for delay OR teardown (no reconnect may fire after unmount)
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = self.shutdown_token.cancelled() => {
                    info!("Teardown requested during reconnect delay, exiting");
                    return Ok(());
                }
            }

            self.counters.reconnects.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// One session: handshake, then the message loop until the socket ends.
    ///
    /// `Ok(())` means the session ended because of teardown.
    async fn try_connect(&self) -> WsResult<()> {
        info!(url = %self.config.url, "Connecting to WebSocket");

        let timeout = Duration::from_millis(self.config.connect_timeout_ms);
        let connect = tokio::time::timeout(
            timeout,
            connect_async_tls_with_config(self.config.url.as_str(), None, true, None),
        );

        let (ws_stream, _response) = tokio::select! {
            result = connect => match result {
                Ok(handshake) => handshake?,
                Err(_) => {
                    return Err(WsError::ConnectionFailed(format!(
                        "handshake timed out after {}ms",
                        self.config.connect_timeout_ms
                    )));
                }
            },
            () = self.shutdown_token.cancelled() => return Ok(()),
        };
        let (mut write, mut read) = ws_stream.split();

        self.set_state(ConnectionState::Open);
        *self.reconnect_count.write() = 0;
        self.touch();
        info!(url = %self.config.url, "WebSocket connected");

        if let Some(watchdog) = &self.watchdog {
            watchdog.reset();
        }
        let mut liveness_check = self.watchdog.as_ref().map(|watchdog| {
            let period = watchdog.check_interval();
            tokio::time::interval_at(Instant::now() + period, period)
        });

        self.emit(ConnectionEvent::Opened).await;

        loop {
            tokio::select! {
                biased;

                // Teardown signal - highest priority
                () = self.shutdown_token.cancelled() => {
                    info!("Teardown signal received in message loop");
                    if let Err(e) = write.send(Message::Close(None)).await {
                        warn!(?e, "Failed to send Close frame during teardown");
                    }
                    return Ok(());
                }

                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text_message(&text).await;
                        }
                        Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                            Ok(text) => self.handle_text_message(text).await,
                            Err(e) => {
                                self.counters.frames_received.fetch_add(1, Ordering::Relaxed);
                                self.counters.parse_errors.fetch_add(1, Ordering::Relaxed);
                                warn!(error = %e, len = bytes.len(), "Dropping non-UTF-8 binary frame");
                            }
                        },
                        Some(Ok(Message::Ping(data))) => {
                            debug!("Received ping, sending pong");
                            self.touch();
                            self.record_heartbeat();
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            debug!("Received pong");
                            self.touch();
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let (code, reason) = frame
                                .map(|f| (u16::from(f.code), f.reason.to_string()))
                                .unwrap_or((1000, "Normal close".to_string()));
                            warn!(code, %reason, "WebSocket closed by server");
                            return Err(WsError::ConnectionClosed { code, reason });
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            error!(?e, "WebSocket read error");
                            return Err(e.into());
                        }
                        None => {
                            warn!("WebSocket stream ended");
                            return Err(WsError::ConnectionClosed {
                                code: ABNORMAL_CLOSE_CODE,
                                reason: "stream ended".to_string(),
                            });
                        }
                    }
                }

                () = next_liveness_check(&mut liveness_check) => {
                    if let Some(watchdog) = &self.watchdog {
                        if watchdog.is_expired() {
                            let elapsed_ms = watchdog.elapsed().as_millis() as u64;
                            warn!(
                                elapsed_ms,
                                timeout_ms = watchdog.config().timeout_ms,
                                "No heartbeat within liveness window, forcing close"
                            );
                            self.counters.liveness_timeouts.fetch_add(1, Ordering::Relaxed);

                            let frame = CloseFrame {
                                code: CloseCode::from(LIVENESS_CLOSE_CODE),
                                reason: LIVENESS_CLOSE_REASON.into(),
                            };
                            if let Err(e) = write.send(Message::Close(Some(frame))).await {
                                warn!(?e, "Failed to send liveness Close frame");
                            }
                            return Err(WsError::LivenessTimeout { elapsed_ms });
                        }
                    }
                }
            }
        }
    }

    /// Normalize one text frame and route it.
    ///
    /// Malformed frames are logged and dropped; they never end the session.
    async fn handle_text_message(&self, text: &str) {
        self.touch();
        self.counters.frames_received.fetch_add(1, Ordering::Relaxed);

        let msg = match FeedMessage::parse(text) {
            Ok(msg) => msg,
            Err(e) => {
                self.counters.parse_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, len = text.len(), "Dropping malformed frame");
                return;
            }
        };

        match msg {
            FeedMessage::Heartbeat => {
                debug!("Received heartbeat");
                self.record_heartbeat();
            }
            FeedMessage::Update(update) => {
                self.emit(ConnectionEvent::Message(update)).await;
            }
        }
    }

    fn record_heartbeat(&self) {
        self.counters.heartbeats.fetch_add(1, Ordering::Relaxed);
        if let Some(watchdog) = &self.watchdog {
            watchdog.record_heartbeat();
        }
    }

    async fn emit(&self, event: ConnectionEvent) {
        if self.event_tx.send(event).await.is_err() {
            debug!("Event receiver dropped");
        }
    }

    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    fn touch(&self) {
        *self.last_activity.write() = Some(Utc::now());
    }
}

/// Resolve at the next liveness check, or never when the watchdog is off.
async fn next_liveness_check(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager() -> (ConnectionManager, mpsc::Receiver<ConnectionEvent>) {
        let (tx, rx) = mpsc::channel(16);
        let config = ConnectionConfig::new("ws://127.0.0.1:1")
            .with_liveness(LivenessConfig::default());
        (ConnectionManager::new(config, tx), rx)
    }

    /// Address nobody listens on.
    async fn dead_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("ws://{addr}")
    }

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert_eq!(
            config.reconnect,
            ReconnectPolicy::Fixed { delay_ms: 3000 }
        );
        assert!(config.liveness.is_none());
        assert_eq!(config.connect_timeout_ms, 10_000);
    }

    #[test]
    fn test_initial_state_is_closed() {
        let (manager, _rx) = manager();
        assert_eq!(manager.state(), ConnectionState::Closed);
        assert!(manager.last_activity().is_none());
        assert_eq!(manager.stats().connect_attempts, 0);
    }

    #[tokio::test]
    async fn test_heartbeat_is_not_forwarded() {
        let (manager, mut rx) = manager();

        manager.handle_text_message(r#"{"type":"ping"}"#).await;

        assert!(rx.try_recv().is_err());
        let stats = manager.stats();
        assert_eq!(stats.heartbeats, 1);
        assert_eq!(stats.frames_received, 1);
        assert!(manager.watchdog().unwrap().stats().last_heartbeat_at.is_some());
    }

    #[tokio::test]
    async fn test_domain_message_is_forwarded() {
        let (manager, mut rx) = manager();

        let frame = json!({"type": "status", "status": "active", "pnl": 120.5}).to_string();
        manager.handle_text_message(&frame).await;

        match rx.try_recv().unwrap() {
            ConnectionEvent::Message(update) => {
                assert_eq!(update.kind, "status");
                assert_eq!(update.status(), Some("active"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(manager.last_activity().is_some());
    }

    #[tokio::test]
    async fn test_malformed_frame_is_dropped() {
        let (manager, mut rx) = manager();

        manager.handle_text_message("{not json").await;
        manager.handle_text_message(r#"{"no_type": true}"#).await;

        assert!(rx.try_recv().is_err());
        assert_eq!(manager.stats().parse_errors, 2);
        assert_eq!(manager.stats().heartbeats, 0);
    }

    #[tokio::test]
    async fn test_bounded_policy_gives_up() {
        let (tx, mut rx) = mpsc::channel(16);
        let config = ConnectionConfig::new(dead_url().await).with_reconnect(
            ReconnectPolicy::ExponentialBackoff {
                base_delay_ms: 10,
                max_delay_ms: 10,
                max_attempts: 2,
                jitter_ms: 0,
            },
        );
        let manager = ConnectionManager::new(config, tx);

        let result = tokio::time::timeout(Duration::from_secs(5), manager.run())
            .await
            .expect("bounded policy must terminate");

        assert!(matches!(
            result,
            Err(WsError::ReconnectExhausted { attempts: 2 })
        ));
        let stats = manager.stats();
        assert_eq!(stats.connect_attempts, 3);
        assert_eq!(stats.reconnects, 2);
        assert_eq!(manager.state(), ConnectionState::Closed);

        let mut closed = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, ConnectionEvent::Closed { .. }));
            closed += 1;
        }
        assert_eq!(closed, 3);
    }

    #[tokio::test]
    async fn test_shutdown_before_run_never_connects() {
        let (tx, _rx) = mpsc::channel(16);
        let manager = ConnectionManager::new(ConnectionConfig::new(dead_url().await), tx);

        manager.shutdown();
        manager.run().await.unwrap();

        assert!(manager.is_shutdown());
        assert_eq!(manager.stats().connect_attempts, 0);
    }
}
