//! Property tests for the ledger's accounting invariants and the sizer's
//! monotonicity guarantees.

use chrono::NaiveDate;
use proptest::prelude::*;
use tradelab_core::{PortfolioLedger, PositionSizer, SizerParams, TradeSide};

fn day(offset: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 2).unwrap() + chrono::Days::new(offset as u64)
}

proptest! {
    /// avg_cost after a series of buys equals sum(q*p)/sum(q), regardless of
    /// lot order.
    #[test]
    fn weighted_average_cost_identity(
        lots in prop::collection::vec((1i64..100, 1.0f64..500.0), 1..10)
    ) {
        let mut ledger = PortfolioLedger::new(1e9);
        let mut total_qty = 0i64;
        let mut total_cost = 0.0;
        for (i, &(qty, price)) in lots.iter().enumerate() {
            ledger.buy("TEST", qty, price, day(i), 0.0).unwrap();
            total_qty += qty;
            total_cost += qty as f64 * price;
        }
        let pos = ledger.position("TEST").unwrap();
        prop_assert_eq!(pos.quantity, total_qty);
        let expected = total_cost / total_qty as f64;
        prop_assert!((pos.avg_cost - expected).abs() < 1e-6 * expected.max(1.0));
    }

    /// Cash reconciles exactly with the trade log across any operation
    /// sequence: initial - buy costs + sell proceeds (commissions inside).
    #[test]
    fn cash_conservation(
        ops in prop::collection::vec(
            (any::<bool>(), 1i64..50, 1.0f64..200.0, 0.0f64..5.0),
            1..40
        )
    ) {
        let initial = 100_000.0;
        let mut ledger = PortfolioLedger::new(initial);
        for (i, &(is_buy, qty, price, commission)) in ops.iter().enumerate() {
            if is_buy {
                let _ = ledger.buy("TEST", qty, price, day(i), commission);
            } else {
                let _ = ledger.sell("TEST", qty, price, day(i), commission);
            }
        }
        let mut expected = initial;
        for trade in ledger.trades() {
            match trade.side {
                TradeSide::Buy => expected -= trade.notional() + trade.commission,
                TradeSide::Sell => expected += trade.notional() - trade.commission,
            }
        }
        prop_assert!((ledger.cash - expected).abs() < 1e-6);
        prop_assert!(ledger.cash >= -1e-9, "cash went negative: {}", ledger.cash);
    }

    /// Tracked positions always carry strictly positive quantity, and an
    /// oversized sell never produces negative inventory.
    #[test]
    fn no_negative_inventory(
        ops in prop::collection::vec(
            (any::<bool>(), 1i64..100, 10.0f64..50.0),
            1..30
        )
    ) {
        let mut ledger = PortfolioLedger::new(1e9);
        for (i, &(is_buy, qty, price)) in ops.iter().enumerate() {
            if is_buy {
                let _ = ledger.buy("TEST", qty, price, day(i), 0.0);
            } else {
                let _ = ledger.sell("TEST", qty, price, day(i), 0.0);
            }
            if let Some(pos) = ledger.position("TEST") {
                prop_assert!(pos.quantity > 0);
            }
        }
        // Sell quantities in the log never exceed what was held at the time:
        // cumulative sold never exceeds cumulative bought.
        let mut net = 0i64;
        for trade in ledger.trades() {
            match trade.side {
                TradeSide::Buy => net += trade.quantity,
                TradeSide::Sell => net -= trade.quantity,
            }
            prop_assert!(net >= 0);
        }
    }

    /// Rejected operations leave the ledger untouched.
    #[test]
    fn failed_buy_mutates_nothing(
        qty in 1i64..1000,
        price in 100.0f64..1000.0
    ) {
        let initial = 50.0; // can never afford anything
        let mut ledger = PortfolioLedger::new(initial);
        prop_assert!(ledger.buy("TEST", qty, price, day(0), 0.0).is_err());
        prop_assert_eq!(ledger.cash, initial);
        prop_assert!(ledger.trades().is_empty());
        prop_assert!(ledger.positions().is_empty());
    }

    /// Higher volatility never increases the sized quantity; higher
    /// confidence never decreases it.
    #[test]
    fn sizing_monotonicity(
        vol_low in 0.0f64..0.05,
        vol_delta in 0.0f64..0.1,
        conf_low in 0.0f64..0.5,
        conf_delta in 0.0f64..0.5,
        price in 5.0f64..500.0
    ) {
        let sizer = PositionSizer::new(SizerParams::default());
        let capital = 1_000_000.0;

        let calm = sizer.size(capital, price, Some(vol_low), 0.8, 1.0);
        let wild = sizer.size(capital, price, Some(vol_low + vol_delta), 0.8, 1.0);
        prop_assert!(wild <= calm);

        let meek = sizer.size(capital, price, Some(0.02), conf_low, 1.0);
        let bold = sizer.size(capital, price, Some(0.02), conf_low + conf_delta, 1.0);
        prop_assert!(bold >= meek);
    }
}
