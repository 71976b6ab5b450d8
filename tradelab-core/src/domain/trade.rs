//! TradeRecord — one executed fill against the simulated ledger.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Side of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

/// An executed trade. Immutable once appended to the ledger's log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: i64,
    pub price: f64,
    pub date: NaiveDate,
    pub commission: f64,
    /// Realized PnL net of commission. Zero for buys.
    pub realized_pnl: f64,
}

impl TradeRecord {
    pub fn is_winner(&self) -> bool {
        self.side == TradeSide::Sell && self.realized_pnl > 0.0
    }

    /// Gross notional of the fill, before commission.
    pub fn notional(&self) -> f64 {
        self.price * self.quantity as f64
    }
}
