//! Portfolio ledger — cash, positions, trade log, and daily snapshots.
//!
//! The ledger is the only component that mutates money. Every operation is
//! atomic: a rejected trade mutates nothing. The accounting identity must hold
//! across any operation sequence:
//! `initial_cash - sum(buy costs) + sum(sell proceeds) == cash` exactly,
//! with commissions inside costs/proceeds.

use chrono::NaiveDate;
use log::{debug, warn};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::{DailySnapshot, Position, TradeRecord, TradeSide};

/// Recoverable trade rejections. The caller decides whether to skip or retry;
/// the ledger state is untouched on any of these.
#[derive(Debug, Error, PartialEq)]
pub enum TradeError {
    #[error("quantity must be positive, got {0}")]
    InvalidQuantity(i64),
    #[error("insufficient cash: need {needed:.2}, have {available:.2}")]
    InsufficientCash { needed: f64, available: f64 },
    #[error("no open position in {0}")]
    NoPosition(String),
}

/// The simulated portfolio: cash, open positions, and append-only logs.
///
/// Positions are kept in a `BTreeMap` so iteration order is deterministic —
/// the simulation loop relies on this for bit-for-bit reproducibility.
#[derive(Debug, Clone)]
pub struct PortfolioLedger {
    pub initial_capital: f64,
    pub cash: f64,
    positions: BTreeMap<String, Position>,
    trades: Vec<TradeRecord>,
    snapshots: Vec<DailySnapshot>,
    pub total_commission: f64,
    pub winning_sells: usize,
    pub losing_sells: usize,
}

impl PortfolioLedger {
    pub fn new(initial_capital: f64) -> Self {
        Self {
            initial_capital,
            cash: initial_capital,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            snapshots: Vec::new(),
            total_commission: 0.0,
            winning_sells: 0,
            losing_sells: 0,
        }
    }

    /// Buy `quantity` at `price`. Fails without mutation if the quantity is
    /// non-positive or cash cannot cover `quantity * price + commission`.
    pub fn buy(
        &mut self,
        symbol: &str,
        quantity: i64,
        price: f64,
        date: NaiveDate,
        commission: f64,
    ) -> Result<(), TradeError> {
        if quantity <= 0 {
            return Err(TradeError::InvalidQuantity(quantity));
        }
        let cost = quantity as f64 * price + commission;
        if self.cash < cost {
            warn!(
                "buy rejected for {symbol}: need ${cost:.2}, cash ${:.2}",
                self.cash
            );
            return Err(TradeError::InsufficientCash {
                needed: cost,
                available: self.cash,
            });
        }

        match self.positions.get_mut(symbol) {
            Some(pos) => pos.add(quantity, price),
            None => {
                self.positions
                    .insert(symbol.to_string(), Position::new(symbol, quantity, price, date));
            }
        }

        self.cash -= cost;
        self.total_commission += commission;
        self.trades.push(TradeRecord {
            symbol: symbol.to_string(),
            side: TradeSide::Buy,
            quantity,
            price,
            date,
            commission,
            realized_pnl: 0.0,
        });
        debug!("buy {quantity} {symbol} @ ${price:.2}");
        Ok(())
    }

    /// Sell `quantity` at `price`. Fails without mutation if the symbol is not
    /// held or the quantity is non-positive. A quantity above the held amount
    /// clamps to the held amount. Realized PnL is
    /// `(price - avg_cost) * qty - commission`.
    pub fn sell(
        &mut self,
        symbol: &str,
        quantity: i64,
        price: f64,
        date: NaiveDate,
        commission: f64,
    ) -> Result<(), TradeError> {
        if quantity <= 0 {
            return Err(TradeError::InvalidQuantity(quantity));
        }
        let pos = self
            .positions
            .get_mut(symbol)
            .ok_or_else(|| TradeError::NoPosition(symbol.to_string()))?;

        let quantity = quantity.min(pos.quantity);
        let pnl = (price - pos.avg_cost) * quantity as f64 - commission;

        pos.quantity -= quantity;
        pos.realized_pnl += pnl;
        if pos.quantity == 0 {
            self.positions.remove(symbol);
        }

        self.cash += quantity as f64 * price - commission;
        self.total_commission += commission;
        if pnl > 0.0 {
            self.winning_sells += 1;
        } else {
            self.losing_sells += 1;
        }
        self.trades.push(TradeRecord {
            symbol: symbol.to_string(),
            side: TradeSide::Sell,
            quantity,
            price,
            date,
            commission,
            realized_pnl: pnl,
        });
        debug!("sell {quantity} {symbol} @ ${price:.2} (pnl ${pnl:.2})");
        Ok(())
    }

    /// Re-mark every position with a current price and return total portfolio
    /// value = cash + sum of position market values. Positions without a price
    /// observation keep their last mark — prices are never fabricated.
    pub fn mark_to_market(&mut self, prices: &BTreeMap<String, f64>) -> f64 {
        for (symbol, pos) in self.positions.iter_mut() {
            if let Some(&price) = prices.get(symbol) {
                pos.update_mark(price);
            }
        }
        self.cash
            + self
                .positions
                .values()
                .map(Position::market_value)
                .sum::<f64>()
    }

    /// Append the daily valuation record for `date` from current ledger state.
    pub fn snapshot(&mut self, date: NaiveDate, prices: &BTreeMap<String, f64>) -> DailySnapshot {
        let total_value = self.mark_to_market(prices);
        let snap = DailySnapshot {
            date,
            total_value,
            cash: self.cash,
            positions_value: total_value - self.cash,
            cumulative_return: (total_value - self.initial_capital) / self.initial_capital,
            open_positions: self.positions.len(),
            trade_count: self.trades.len(),
        };
        self.snapshots.push(snap.clone());
        snap
    }

    /// Restore initial capital and clear positions and logs.
    pub fn reset(&mut self) {
        self.cash = self.initial_capital;
        self.positions.clear();
        self.trades.clear();
        self.snapshots.clear();
        self.total_commission = 0.0;
        self.winning_sells = 0;
        self.losing_sells = 0;
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    /// Open positions in deterministic (symbol-sorted) order.
    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn snapshots(&self) -> &[DailySnapshot] {
        &self.snapshots
    }
}
