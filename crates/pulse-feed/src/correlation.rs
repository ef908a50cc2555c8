//! Correlation matrix projection.
//!
//! Each update carries a full matrix and replaces the previous one.

use crate::error::{FeedError, FeedResult};
use crate::projector::Projector;
use chrono::{DateTime, Utc};
use pulse_ws::Update;
use serde::Serialize;
use tracing::warn;

/// Square matrix of pairwise correlations.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub symbols: Vec<String>,
    /// Row-major, `values[i][j]` = corr(symbols[i], symbols[j]).
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    /// Build from `symbols` and `matrix` fields of an update.
    pub fn from_update(update: &Update) -> FeedResult<Self> {
        let symbols: Vec<String> = serde_json::from_value(
            update
                .get("symbols")
                .cloned()
                .ok_or_else(|| FeedError::MissingField("symbols".to_string()))?,
        )?;
        let values: Vec<Vec<f64>> = serde_json::from_value(
            update
                .get("matrix")
                .cloned()
                .ok_or_else(|| FeedError::MissingField("matrix".to_string()))?,
        )?;

        let n = symbols.len();
        if values.len() != n || values.iter().any(|row| row.len() != n) {
            return Err(FeedError::InvalidData(format!(
                "matrix shape does not match {n} symbols"
            )));
        }

        Ok(Self { symbols, values })
    }

    /// Correlation between two symbols.
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s == a)?;
        let j = self.symbols.iter().position(|s| s == b)?;
        Some(self.values[i][j])
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Latest correlation matrix.
#[derive(Debug, Clone, Default)]
pub struct CorrelationProjector {
    latest: Option<CorrelationMatrix>,
    updated_at: Option<DateTime<Utc>>,
    rejected: u64,
}

impl CorrelationProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<&CorrelationMatrix> {
        self.latest.as_ref()
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}

impl Projector for CorrelationProjector {
    fn apply(&mut self, update: &Update) -> bool {
        match CorrelationMatrix::from_update(update) {
            Ok(matrix) => {
                if self.latest.as_ref() == Some(&matrix) {
                    return false;
                }
                self.latest = Some(matrix);
                self.updated_at = Some(Utc::now());
                true
            }
            Err(e) => {
                self.rejected += 1;
                warn!(kind = %update.kind, error = %e, "Dropping correlation message");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pulse_ws::FeedMessage;
    use serde_json::{json, Value};

    fn update(value: Value) -> Update {
        FeedMessage::from_value(value)
            .unwrap()
            .into_update()
            .unwrap()
    }

    fn matrix_frame(btc_eth: f64) -> Update {
        update(json!({
            "type": "correlation",
            "data": {
                "symbols": ["BTC", "ETH"],
                "matrix": [[1.0, btc_eth], [btc_eth, 1.0]]
            }
        }))
    }

    #[test]
    fn test_latest_matrix_wins() {
        let mut projector = CorrelationProjector::new();
        assert!(projector.apply(&matrix_frame(0.8)));
        assert!(projector.apply(&matrix_frame(0.6)));

        let latest = projector.latest().unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest.get("BTC", "ETH"), Some(0.6));
        assert_eq!(latest.get("ETH", "ETH"), Some(1.0));
        assert_eq!(latest.get("BTC", "SOL"), None);
        assert!(projector.updated_at().is_some());
    }

    #[test]
    fn test_identical_matrix_is_not_a_change() {
        let mut projector = CorrelationProjector::new();
        assert!(projector.apply(&matrix_frame(0.8)));
        assert!(!projector.apply(&matrix_frame(0.8)));
    }

    #[test]
    fn test_bad_shape_is_rejected() {
        let mut projector = CorrelationProjector::new();
        projector.apply(&matrix_frame(0.5));

        let bad = update(json!({
            "type": "correlation",
            "symbols": ["BTC", "ETH"],
            "matrix": [[1.0, 0.2]]
        }));
        assert!(!projector.apply(&bad));
        assert_eq!(projector.rejected(), 1);
        assert_eq!(projector.latest().unwrap().get("BTC", "ETH"), Some(0.5));
    }

    #[test]
    fn test_missing_fields_rejected() {
        assert!(CorrelationMatrix::from_update(&update(json!({"type": "correlation"}))).is_err());
    }
}
