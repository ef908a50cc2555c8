//! Headless live-state client.
//!
//! Runs the dashboard's live feeds against a configured server:
//! - Bot status mirrors (one connection per bot, with liveness watchdog)
//! - Liquidation stream with aggregates and per-symbol delta series
//! - Backtest progress and correlation matrix mirrors
//! - Sentiment REST lookups with a neutral fallback

pub mod app;
pub mod config;
pub mod error;
pub mod feeds;
pub mod rest;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use feeds::FeedSet;
pub use rest::{Sentiment, SentimentClient};
