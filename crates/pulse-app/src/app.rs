//! Main application orchestrator.

use crate::config::AppConfig;
use crate::error::AppResult;
use crate::feeds::FeedSet;
use crate::rest::SentimentClient;
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Headless client application.
pub struct Application {
    config: AppConfig,
    sentiment: SentimentClient,
}

impl Application {
    /// Create a new application instance.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        let sentiment = SentimentClient::new(
            config.server.rest_base_url(),
            Duration::from_millis(config.rest.timeout_ms),
        )?;

        Ok(Self { config, sentiment })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Run until Ctrl-C.
    pub async fn run(self) -> AppResult<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(?e, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Shutdown signal received");
        })
        .await
    }

    /// Run until `shutdown` resolves, then tear every feed down.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> AppResult<()> {
        let endpoints = self.config.server.endpoints()?;
        info!(
            base_url = %endpoints.base_url(),
            bots = self.config.feeds.bot_ids.len(),
            liquidation = self.config.feeds.liquidation,
            backtest = self.config.feeds.backtest,
            correlation = self.config.feeds.correlation,
            "Starting live feeds"
        );

        let feeds = FeedSet::start(endpoints, self.config.websocket.clone(), &self.config.feeds);

        let period = Duration::from_secs(self.config.telemetry.summary_interval_secs);
        let mut summary_interval =
            tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        tokio::pin!(shutdown);

        info!("Entering main event loop");
        loop {
            tokio::select! {
                _ = summary_interval.tick() => {
                    feeds.log_summary();
                    self.log_sentiment().await;
                }

                () = &mut shutdown => break,
            }
        }

        info!("Final state summary:");
        feeds.log_summary();
        feeds.shutdown().await;
        info!("Shutdown complete");

        Ok(())
    }

    async fn log_sentiment(&self) {
        for symbol in &self.config.rest.sentiment_symbols {
            let sentiment = self.sentiment.fetch(symbol).await;
            info!(
                symbol = %sentiment.symbol,
                score = sentiment.score,
                label = %sentiment.label,
                fallback = sentiment.fallback,
                "Sentiment"
            );
        }
    }
}
