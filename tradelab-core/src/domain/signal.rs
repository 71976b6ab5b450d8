//! Signal — a scored buy/sell/hold recommendation for one instrument-day.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The decision a signal recommends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

/// A scored recommendation produced by the signal scorer.
///
/// Raw buy/sell scores are diagnostic: they explain HOLD outcomes and survive
/// the classifier overlay, which replaces action/confidence but not the scores.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub symbol: String,
    pub action: Action,
    /// Confidence in [0, 1].
    pub confidence: f64,
    pub date: NaiveDate,
    /// Reference price the signal was scored at.
    pub price: f64,
    /// Order quantity the sizer computed for this signal. Advisory — the
    /// ledger still verifies affordability at execution time.
    pub quantity: i64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Ordered, human-readable scoring rationale.
    pub reasons: Vec<String>,
    pub buy_score: f64,
    pub sell_score: f64,
}

impl Signal {
    /// A HOLD with a single reason and zeroed diagnostics. Used for the
    /// short-circuit paths (market filter, invalid data, holding period).
    pub fn hold(symbol: &str, date: NaiveDate, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            action: Action::Hold,
            confidence: 0.0,
            date,
            price: 0.0,
            quantity: 0,
            stop_loss: 0.0,
            take_profit: 0.0,
            reasons: vec![reason.into()],
            buy_score: 0.0,
            sell_score: 0.0,
        }
    }

    /// A SELL record for a forced stop-loss/take-profit liquidation. Not
    /// scored; carries the executed fill so the signal log stays complete.
    pub fn forced_exit(
        symbol: &str,
        date: NaiveDate,
        price: f64,
        quantity: i64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            action: Action::Sell,
            confidence: 1.0,
            date,
            price,
            quantity,
            stop_loss: 0.0,
            take_profit: 0.0,
            reasons: vec![reason.into()],
            buy_score: 0.0,
            sell_score: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hold_constructor_carries_reason() {
        let s = Signal::hold(
            "NVDA",
            NaiveDate::from_ymd_opt(2024, 5, 7).unwrap(),
            "insufficient data",
        );
        assert_eq!(s.action, Action::Hold);
        assert_eq!(s.confidence, 0.0);
        assert_eq!(s.reasons, vec!["insufficient data".to_string()]);
    }

    #[test]
    fn forced_exit_is_a_filled_sell() {
        let s = Signal::forced_exit(
            "NVDA",
            NaiveDate::from_ymd_opt(2024, 5, 7).unwrap(),
            97.0,
            12,
            "stop-loss exit",
        );
        assert_eq!(s.action, Action::Sell);
        assert_eq!(s.quantity, 12);
        assert_eq!(s.price, 97.0);
        assert_eq!(s.reasons, vec!["stop-loss exit".to_string()]);
    }
}
