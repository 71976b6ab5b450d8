//! Position — net held quantity and average cost basis for one instrument.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// An open position. Quantity is strictly positive for as long as the
/// position is tracked; the ledger removes it when quantity reaches zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    /// Weighted-average cost across all buys since the position was opened.
    pub avg_cost: f64,
    /// Last price this position was marked at.
    pub marked_price: f64,
    pub entry_date: NaiveDate,
    /// Realized PnL accumulated by partial sells while the position is open.
    pub realized_pnl: f64,
}

impl Position {
    pub fn new(symbol: &str, quantity: i64, price: f64, entry_date: NaiveDate) -> Self {
        Self {
            symbol: symbol.to_string(),
            quantity,
            avg_cost: price,
            marked_price: price,
            entry_date,
            realized_pnl: 0.0,
        }
    }

    /// Merge a subsequent buy into this position using weighted-average cost:
    /// `new_avg = (old_qty * old_avg + qty * price) / (old_qty + qty)`.
    pub fn add(&mut self, quantity: i64, price: f64) {
        let total = self.quantity + quantity;
        self.avg_cost =
            (self.avg_cost * self.quantity as f64 + price * quantity as f64) / total as f64;
        self.quantity = total;
    }

    pub fn update_mark(&mut self, price: f64) {
        self.marked_price = price;
    }

    pub fn market_value(&self) -> f64 {
        self.marked_price * self.quantity as f64
    }

    /// Unrealized PnL = (marked price - avg cost) * quantity.
    pub fn unrealized_pnl(&self) -> f64 {
        (self.marked_price - self.avg_cost) * self.quantity as f64
    }

    pub fn total_pnl(&self) -> f64 {
        self.unrealized_pnl() + self.realized_pnl
    }
}
