//! Bot status projection.

use crate::mirror::LiveMirror;
use crate::projector::Projector;
use pulse_ws::Update;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;

/// Status shown before the first update arrives.
pub const INACTIVE_STATUS: &str = "inactive";

/// Mirror of one bot's status stream.
#[derive(Debug, Clone)]
pub struct BotStatusProjector {
    bot_id: String,
    mirror: LiveMirror,
}

impl BotStatusProjector {
    /// Create a projector seeded with `{status: "inactive", pnl: 0}`.
    pub fn new(bot_id: impl Into<String>) -> Self {
        let mut seed = serde_json::Map::new();
        seed.insert("status".to_string(), json!(INACTIVE_STATUS));
        seed.insert("pnl".to_string(), json!(0));

        Self {
            bot_id: bot_id.into(),
            mirror: LiveMirror::with_initial(seed),
        }
    }

    pub fn bot_id(&self) -> &str {
        &self.bot_id
    }

    pub fn status(&self) -> &str {
        self.mirror.get_str("status").unwrap_or(INACTIVE_STATUS)
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status(), "active" | "running")
    }

    /// Realized PnL, if the server sent a parseable value.
    pub fn pnl(&self) -> Option<Decimal> {
        match self.mirror.get("pnl")? {
            Value::Number(n) => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .ok(),
            Value::String(s) => Decimal::from_str(s.trim()).ok(),
            _ => None,
        }
    }

    pub fn mirror(&self) -> &LiveMirror {
        &self.mirror
    }
}

impl Projector for BotStatusProjector {
    fn apply(&mut self, update: &Update) -> bool {
        self.mirror.apply(update)
    }
}
