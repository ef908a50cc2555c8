//! Liquidation stream projection.
//!
//! Each domain message is one liquidation. It is prepended to a bounded
//! event list and added to cumulative volume counters. The counters never
//! reset for the life of the process. The cumulative delta series covers
//! the active symbol only and restarts empty whenever that symbol changes.

use crate::error::{FeedError, FeedResult};
use crate::event_feed::{EventFeed, DEFAULT_FEED_CAPACITY};
use crate::projector::Projector;
use chrono::{DateTime, Utc};
use pulse_ws::Update;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Maximum points kept in the active symbol's delta series.
pub const DEFAULT_SERIES_CAPACITY: usize = 1_000;

/// Which side of the book was liquidated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiquidationSide {
    Long,
    Short,
}

impl LiquidationSide {
    /// Parse a side label.
    ///
    /// Accepts `long`/`short` and the forced order side: a `SELL` closes a
    /// long position, a `BUY` closes a short one.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "long" | "sell" => Some(Self::Long),
            "short" | "buy" => Some(Self::Short),
            _ => None,
        }
    }
}

impl fmt::Display for LiquidationSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// One liquidation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidationEvent {
    /// Upper-cased symbol (e.g. "BTCUSDT").
    pub symbol: String,
    pub side: LiquidationSide,
    pub price: Decimal,
    pub quantity: Decimal,
    /// USD notional. Defaults to price * quantity.
    pub value: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl LiquidationEvent {
    /// Derive an event from a normalized update.
    pub fn from_update(update: &Update) -> FeedResult<Self> {
        let symbol = update
            .str_field("symbol")
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| FeedError::MissingField("symbol".to_string()))?;

        let side_label = update
            .str_field("side")
            .ok_or_else(|| FeedError::MissingField("side".to_string()))?;
        let side = LiquidationSide::parse(side_label)
            .ok_or_else(|| FeedError::InvalidData(format!("unknown side: {side_label}")))?;

        let price = decimal_field(update, &["price"])?
            .ok_or_else(|| FeedError::MissingField("price".to_string()))?;
        let quantity = decimal_field(update, &["quantity", "qty", "size"])?
            .ok_or_else(|| FeedError::MissingField("quantity".to_string()))?;
        let value = match decimal_field(update, &["value", "usd_value"])? {
            Some(value) => value,
            None => price.checked_mul(quantity).ok_or_else(|| {
                FeedError::InvalidData(format!(
                    "notional overflows: price={price} quantity={quantity}"
                ))
            })?,
        };

        if price.is_sign_negative() || quantity.is_sign_negative() || value.is_sign_negative() {
            return Err(FeedError::InvalidData(format!(
                "negative liquidation amount: price={price} quantity={quantity} value={value}"
            )));
        }

        let timestamp = timestamp_field(update)?.unwrap_or_else(Utc::now);

        Ok(Self {
            symbol,
            side,
            price,
            quantity,
            value,
            timestamp,
        })
    }

    /// Contribution to the delta series: long volume positive, short negative.
    pub fn signed_value(&self) -> Decimal {
        match self.side {
            LiquidationSide::Long => self.value,
            LiquidationSide::Short => -self.value,
        }
    }
}

/// Read the first present decimal field among `keys`. Strings and numbers
/// are both accepted.
fn decimal_field(update: &Update, keys: &[&str]) -> FeedResult<Option<Decimal>> {
    for key in keys {
        let text = match update.get(key) {
            None | Some(Value::Null) => continue,
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.trim().to_string(),
            Some(other) => {
                return Err(FeedError::InvalidData(format!(
                    "{key} is not numeric: {other}"
                )));
            }
        };
        let value = Decimal::from_str(&text).or_else(|_| Decimal::from_scientific(&text))?;
        return Ok(Some(value));
    }
    Ok(None)
}

/// Event time: epoch milliseconds or RFC 3339.
fn timestamp_field(update: &Update) -> FeedResult<Option<DateTime<Utc>>> {
    match update.get("timestamp") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(Some)
            .ok_or_else(|| FeedError::InvalidData(format!("bad timestamp: {n}"))),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|t| Some(t.with_timezone(&Utc)))
            .map_err(|e| FeedError::InvalidData(format!("bad timestamp {s}: {e}"))),
        Some(other) => Err(FeedError::InvalidData(format!(
            "bad timestamp: {other}"
        ))),
    }
}

/// Cumulative volume counters. Monotonically non-decreasing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LiquidationTotals {
    pub long_volume: Decimal,
    pub short_volume: Decimal,
    pub total_volume: Decimal,
    pub event_count: u64,
}

/// One point of the active symbol's cumulative delta series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeltaPoint {
    pub timestamp: DateTime<Utc>,
    /// Running sum of long minus short liquidation value.
    pub cumulative_delta: Decimal,
}

/// Projection of the liquidation stream.
#[derive(Debug, Clone)]
pub struct LiquidationProjector {
    events: EventFeed<LiquidationEvent>,
    totals: LiquidationTotals,
    active_symbol: Option<String>,
    series: VecDeque<DeltaPoint>,
    series_capacity: usize,
    /// Messages that could not be turned into events.
    rejected: u64,
}

impl LiquidationProjector {
    pub fn new(feed_capacity: usize) -> Self {
        Self {
            events: EventFeed::new(feed_capacity),
            totals: LiquidationTotals::default(),
            active_symbol: None,
            series: VecDeque::new(),
            series_capacity: DEFAULT_SERIES_CAPACITY,
            rejected: 0,
        }
    }

    pub fn with_active_symbol(mut self, symbol: &str) -> Self {
        self.set_active_symbol(symbol);
        self
    }

    /// Switch the active symbol.
    ///
    /// Clears the delta series when the symbol actually changes. Totals are
    /// left as they are. Returns `true` on change.
    pub fn set_active_symbol(&mut self, symbol: &str) -> bool {
        let symbol = symbol.trim().to_ascii_uppercase();
        if self.active_symbol.as_deref() == Some(symbol.as_str()) {
            return false;
        }

        debug!(
            from = ?self.active_symbol,
            to = %symbol,
            dropped_points = self.series.len(),
            "Active symbol changed"
        );
        self.series.clear();
        self.active_symbol = Some(symbol);
        true
    }

    /// Fold one event into the projection.
    ///
    /// Rejects the event and leaves every counter untouched when a sum
    /// would overflow.
    pub fn record(&mut self, event: LiquidationEvent) -> FeedResult<()> {
        let overflow =
            |what: &str| FeedError::InvalidData(format!("{what} overflows adding {}", event.value));

        let mut totals = self.totals;
        match event.side {
            LiquidationSide::Long => {
                totals.long_volume = totals
                    .long_volume
                    .checked_add(event.value)
                    .ok_or_else(|| overflow("long volume"))?;
            }
            LiquidationSide::Short => {
                totals.short_volume = totals
                    .short_volume
                    .checked_add(event.value)
                    .ok_or_else(|| overflow("short volume"))?;
            }
        }
        totals.total_volume = totals
            .total_volume
            .checked_add(event.value)
            .ok_or_else(|| overflow("total volume"))?;
        totals.event_count += 1;

        let point = if self.active_symbol.as_deref() == Some(event.symbol.as_str()) {
            let previous = self
                .series
                .back()
                .map_or(Decimal::ZERO, |p| p.cumulative_delta);
            let cumulative_delta = previous
                .checked_add(event.signed_value())
                .ok_or_else(|| overflow("cumulative delta"))?;
            Some(DeltaPoint {
                timestamp: event.timestamp,
                cumulative_delta,
            })
        } else {
            None
        };

        self.totals = totals;
        if let Some(point) = point {
            self.series.push_back(point);
            if self.series.len() > self.series_capacity {
                self.series.pop_front();
            }
        }
        self.events.push(event);
        Ok(())
    }

    pub fn events(&self) -> &EventFeed<LiquidationEvent> {
        &self.events
    }

    pub fn totals(&self) -> LiquidationTotals {
        self.totals
    }

    pub fn active_symbol(&self) -> Option<&str> {
        self.active_symbol.as_deref()
    }

    /// Delta series of the active symbol, oldest first.
    pub fn series(&self) -> impl Iterator<Item = &DeltaPoint> {
        self.series.iter()
    }

    pub fn series_len(&self) -> usize {
        self.series.len()
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl Default for LiquidationProjector {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_CAPACITY)
    }
}

impl Projector for LiquidationProjector {
    fn apply(&mut self, update: &Update) -> bool {
        match LiquidationEvent::from_update(update).and_then(|event| self.record(event)) {
            Ok(()) => true,
            Err(e) => {
                self.rejected += 1;
                warn!(kind = %update.kind, error = %e, "Dropping liquidation message");
                false
            }
        }
    }
}
