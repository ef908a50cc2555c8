//! WebSocket transport for live dashboard feeds.
//!
//! Keeps a local mirror of server-pushed state fed over a socket that
//! reconnects on its own:
//! - Transport connector surfacing opened / message / closed events
//! - Reconnect supervisor (fixed 3s delay by default, optional bounded backoff)
//! - Liveness watchdog forcing a reconnect when heartbeats stop
//! - Boundary normalization of `payload` / `data` message shapes

pub mod connection;
pub mod endpoint;
pub mod error;
pub mod handle;
pub mod message;
pub mod reconnect;
pub mod watchdog;

pub use connection::{
    ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState, ConnectionStats,
};
pub use endpoint::{Endpoint, EndpointConfig};
pub use error::{WsError, WsResult};
pub use handle::FeedHandle;
pub use message::{FeedMessage, RawFrame, Update, HEARTBEAT_TYPE};
pub use reconnect::{ReconnectPolicy, DEFAULT_RECONNECT_DELAY_MS};
pub use watchdog::{
    LivenessConfig, LivenessWatchdog, WatchdogStats, LIVENESS_CLOSE_CODE, LIVENESS_CLOSE_REASON,
};
