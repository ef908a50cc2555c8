//! The set of live feeds run by the client.
//!
//! Each feed is one `LiveResource`, so each owns its own connection. Bot
//! status feeds always run the liveness watchdog; the others only when
//! `feeds.watch_all_liveness` is set.

use crate::config::{FeedsConfig, WsConfig};
use crate::error::{AppError, AppResult};
use pulse_feed::{
    BacktestProgress, BotStatusProjector, CorrelationProjector, LiquidationProjector,
    LiveResource, Projector,
};
use pulse_telemetry::Metrics;
use pulse_ws::{Endpoint, EndpointConfig, WsResult};
use rust_decimal::prelude::ToPrimitive;
use tracing::{info, warn};

/// Running live resources.
pub struct FeedSet {
    endpoints: EndpointConfig,
    ws: WsConfig,
    watch_all_liveness: bool,
    bots: Vec<LiveResource<BotStatusProjector>>,
    liquidation: Option<LiveResource<LiquidationProjector>>,
    backtest: Option<LiveResource<BacktestProgress>>,
    correlation: Option<LiveResource<CorrelationProjector>>,
}

impl FeedSet {
    /// Open every configured feed.
    pub fn start(endpoints: EndpointConfig, ws: WsConfig, feeds: &FeedsConfig) -> Self {
        let mut set = Self {
            endpoints,
            ws,
            watch_all_liveness: feeds.watch_all_liveness,
            bots: Vec::new(),
            liquidation: None,
            backtest: None,
            correlation: None,
        };

        for bot_id in &feeds.bot_ids {
            let bot = set.spawn_bot(bot_id);
            set.bots.push(bot);
        }

        if feeds.liquidation {
            let mut projector = LiquidationProjector::new(feeds.feed_capacity);
            if let Some(symbol) = &feeds.active_symbol {
                projector = projector.with_active_symbol(symbol);
            }
            set.liquidation = Some(set.spawn(Endpoint::LiquidationStream, projector));
        }
        if feeds.backtest {
            set.backtest = Some(set.spawn(Endpoint::Backtest, BacktestProgress::new()));
        }
        if feeds.correlation {
            set.correlation = Some(set.spawn(Endpoint::Correlation, CorrelationProjector::new()));
        }

        info!(feeds = set.len(), "Live feeds started");
        set
    }

    fn spawn<P: Projector>(&self, endpoint: Endpoint, projector: P) -> LiveResource<P> {
        let config = self
            .ws
            .connection_config(self.endpoints.url_for(&endpoint), self.watch_all_liveness);
        LiveResource::spawn(endpoint.name(), config, projector)
    }

    fn spawn_bot(&self, bot_id: &str) -> LiveResource<BotStatusProjector> {
        let endpoint = Endpoint::BotStatus {
            bot_id: bot_id.to_string(),
        };
        let config = self
            .ws
            .connection_config(self.endpoints.url_for(&endpoint), true);
        LiveResource::spawn(endpoint.to_string(), config, BotStatusProjector::new(bot_id))
    }

    /// Number of running feeds.
    pub fn len(&self) -> usize {
        self.bots.len()
            + usize::from(self.liquidation.is_some())
            + usize::from(self.backtest.is_some())
            + usize::from(self.correlation.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bots(&self) -> &[LiveResource<BotStatusProjector>] {
        &self.bots
    }

    pub fn bot(&self, bot_id: &str) -> Option<&LiveResource<BotStatusProjector>> {
        self.bots
            .iter()
            .find(|bot| bot.read(|p| p.bot_id() == bot_id))
    }

    /// Switch a bot feed to another bot id.
    ///
    /// The new connection is opened first, then the old one is torn down.
    /// The new mirror starts from the inactive seed.
    pub async fn replace_bot(&mut self, old_id: &str, new_id: &str) -> AppResult<()> {
        let index = self
            .bots
            .iter()
            .position(|bot| bot.read(|p| p.bot_id() == old_id))
            .ok_or_else(|| AppError::UnknownBot(old_id.to_string()))?;

        let replacement = self.spawn_bot(new_id);
        let old = std::mem::replace(&mut self.bots[index], replacement);
        info!(from = old_id, to = new_id, "Bot feed switched");
        log_shutdown(old.name().to_string(), old.shutdown().await);
        Ok(())
    }

    pub fn liquidation(&self) -> Option<&LiveResource<LiquidationProjector>> {
        self.liquidation.as_ref()
    }

    /// Change the symbol whose delta series is tracked.
    ///
    /// Returns `false` when the liquidation feed is off or the symbol is
    /// already active.
    pub fn set_active_symbol(&self, symbol: &str) -> bool {
        self.liquidation
            .as_ref()
            .is_some_and(|feed| feed.modify(|p| p.set_active_symbol(symbol)))
    }

    pub fn backtest(&self) -> Option<&LiveResource<BacktestProgress>> {
        self.backtest.as_ref()
    }

    pub fn correlation(&self) -> Option<&LiveResource<CorrelationProjector>> {
        self.correlation.as_ref()
    }

    /// Log one line per feed and refresh the metrics.
    pub fn log_summary(&self) {
        for bot in &self.bots {
            let (bot_id, status, pnl) =
                bot.read(|p| (p.bot_id().to_string(), p.status().to_string(), p.pnl()));
            info!(
                bot_id = %bot_id,
                status = %status,
                pnl = ?pnl,
                connected = bot.is_connected(),
                revision = bot.revision(),
                "Bot status"
            );
            export(bot);
        }

        if let Some(feed) = &self.liquidation {
            let (totals, recent, symbol, points, delta) = feed.read(|p| {
                (
                    p.totals(),
                    p.events().len(),
                    p.active_symbol().map(str::to_string),
                    p.series_len(),
                    p.series().last().map(|point| point.cumulative_delta),
                )
            });
            info!(
                long_volume = %totals.long_volume,
                short_volume = %totals.short_volume,
                total_volume = %totals.total_volume,
                events = totals.event_count,
                recent,
                active_symbol = ?symbol,
                series_points = points,
                cumulative_delta = ?delta,
                connected = feed.is_connected(),
                "Liquidations"
            );
            Metrics::liquidation_volume(
                totals.long_volume.to_f64().unwrap_or_default(),
                totals.short_volume.to_f64().unwrap_or_default(),
                totals.total_volume.to_f64().unwrap_or_default(),
            );
            export(feed);
        }

        if let Some(feed) = &self.backtest {
            let (phase, progress, error) = feed.read(|p| {
                (
                    p.phase(),
                    p.progress(),
                    p.error().map(str::to_string),
                )
            });
            info!(
                phase = ?phase,
                progress,
                error = ?error,
                connected = feed.is_connected(),
                "Backtest"
            );
            export(feed);
        }

        if let Some(feed) = &self.correlation {
            let (symbols, updated_at) =
                feed.read(|p| (p.latest().map_or(0, |m| m.len()), p.updated_at()));
            info!(
                symbols,
                updated_at = ?updated_at,
                connected = feed.is_connected(),
                "Correlation"
            );
            export(feed);
        }
    }

    /// Tear down every feed.
    pub async fn shutdown(self) {
        for bot in self.bots {
            log_shutdown(bot.name().to_string(), bot.shutdown().await);
        }
        if let Some(feed) = self.liquidation {
            log_shutdown(feed.name().to_string(), feed.shutdown().await);
        }
        if let Some(feed) = self.backtest {
            log_shutdown(feed.name().to_string(), feed.shutdown().await);
        }
        if let Some(feed) = self.correlation {
            log_shutdown(feed.name().to_string(), feed.shutdown().await);
        }
    }
}

fn export<P: Projector>(feed: &LiveResource<P>) {
    Metrics::export_stats(feed.name(), &feed.connection().stats(), feed.is_connected());
    Metrics::mirror_revision(feed.name(), feed.revision());
}

fn log_shutdown(name: String, result: WsResult<()>) {
    if let Err(e) = result {
        warn!(feed = %name, error = %e, "Feed stopped with error");
    }
}
