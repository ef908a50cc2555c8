//! Local mirrors of server-pushed dashboard state.
//!
//! Folds normalized feed updates into client-side state:
//! - `LiveMirror`: last-write-wins field map
//! - `EventFeed`: bounded newest-first event list
//! - Per-feed projections (bot status, liquidations, backtest, correlation)
//! - `LiveResource`: binds one connection to one projector

pub mod backtest;
pub mod bot_status;
pub mod correlation;
pub mod error;
pub mod event_feed;
pub mod live;
pub mod liquidation;
pub mod mirror;
pub mod projector;

pub use backtest::{BacktestPhase, BacktestProgress};
pub use bot_status::BotStatusProjector;
pub use correlation::{CorrelationMatrix, CorrelationProjector};
pub use error::{FeedError, FeedResult};
pub use event_feed::{EventFeed, DEFAULT_FEED_CAPACITY};
pub use live::LiveResource;
pub use liquidation::{
    DeltaPoint, LiquidationEvent, LiquidationProjector, LiquidationSide, LiquidationTotals,
};
pub use mirror::LiveMirror;
pub use projector::Projector;
