//! WebSocket error types.

use thiserror::Error;

use crate::watchdog::{LIVENESS_CLOSE_CODE, LIVENESS_CLOSE_REASON};

/// Close code reported when the socket went away without a close frame.
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;

#[derive(Debug, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection closed: code={code}, reason={reason}")]
    ConnectionClosed { code: u16, reason: String },

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(String),

    #[error("Liveness timeout: no heartbeat for {elapsed_ms}ms")]
    LivenessTimeout { elapsed_ms: u64 },

    #[error("Reconnect attempts exhausted after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("Connection task failed: {0}")]
    TaskJoin(String),

    #[error("Tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WsError {
    /// Close code and reason reported to the owner when a session ends with this error.
    pub fn close_info(&self) -> (u16, String) {
        match self {
            Self::ConnectionClosed { code, reason } => (*code, reason.clone()),
            Self::LivenessTimeout { .. } => {
                (LIVENESS_CLOSE_CODE, LIVENESS_CLOSE_REASON.to_string())
            }
            other => (ABNORMAL_CLOSE_CODE, other.to_string()),
        }
    }
}

pub type WsResult<T> = Result<T, WsError>;
