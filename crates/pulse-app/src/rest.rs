//! REST collaborators.
//!
//! REST responses are treated as opaque JSON. Failures never propagate to
//! the caller: each lookup degrades to a neutral fallback value.

use crate::error::{AppError, AppResult};
use pulse_telemetry::Metrics;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Label used when no sentiment could be fetched.
pub const NEUTRAL_LABEL: &str = "neutral";

/// Score band treated as neutral when the server omits a label.
const NEUTRAL_BAND: f64 = 0.2;

/// Sentiment of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sentiment {
    pub symbol: String,
    /// Score in [-1, 1]; 0 is neutral.
    pub score: f64,
    pub label: String,
    /// `true` when this is the fallback rather than a server answer.
    pub fallback: bool,
}

impl Sentiment {
    pub fn neutral(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            score: 0.0,
            label: NEUTRAL_LABEL.to_string(),
            fallback: true,
        }
    }

    /// Label implied by a score.
    pub fn label_for(score: f64) -> &'static str {
        if score > NEUTRAL_BAND {
            "bullish"
        } else if score < -NEUTRAL_BAND {
            "bearish"
        } else {
            NEUTRAL_LABEL
        }
    }
}

#[derive(Debug, Deserialize)]
struct SentimentResponse {
    #[serde(alias = "sentiment_score", alias = "overall_score")]
    score: f64,
    #[serde(default, alias = "sentiment")]
    label: Option<String>,
}

/// Client for `GET /api/v1/sentiment/{symbol}`.
pub struct SentimentClient {
    client: Client,
    base_url: String,
}

impl SentimentClient {
    pub fn new(base_url: &str, timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Sentiment for `symbol`, or the neutral fallback on any failure.
    pub async fn fetch(&self, symbol: &str) -> Sentiment {
        match self.try_fetch(symbol).await {
            Ok(sentiment) => sentiment,
            Err(e) => {
                warn!(symbol, error = %e, "Sentiment lookup failed, using neutral fallback");
                Metrics::rest_fallback("sentiment");
                Sentiment::neutral(symbol)
            }
        }
    }

    async fn try_fetch(&self, symbol: &str) -> AppResult<Sentiment> {
        let url = format!("{}/api/v1/sentiment/{}", self.base_url, symbol);
        debug!(url = %url, "Fetching sentiment");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::HttpStatus {
                status: response.status().as_u16(),
                url,
            });
        }

        let body: SentimentResponse = response.json().await?;
        if !body.score.is_finite() {
            return Err(AppError::InvalidResponse(format!(
                "non-finite sentiment score for {symbol}"
            )));
        }
        let score = body.score.clamp(-1.0, 1.0);
        let label = body
            .label
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| Sentiment::label_for(score).to_string());

        Ok(Sentiment {
            symbol: symbol.to_string(),
            score,
            label,
            fallback: false,
        })
    }
}
