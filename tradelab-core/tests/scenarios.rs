//! End-to-end scenarios against the ledger and the simulation loop.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use tradelab_core::{
    keys, Action, Classifier, FeatureRow, FilterProvider, MarketData, MarketFilter,
    PortfolioLedger, RiskLimits, ScorerParams, SignalScorer, SimConfig, Simulation, SizerParams,
    TradeError, TradeSide,
};

fn day(offset: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 2, 1).unwrap() + chrono::Days::new(offset as u64)
}

fn bar(offset: u32, close: f64) -> FeatureRow {
    FeatureRow::new(day(offset), close, close + 0.5, close - 0.5, close, 2_000_000.0)
        .with_indicator(keys::RSI, 50.0)
}

/// Scenario A: buy 10 @ $100 with $10,000, sell all at $110.
#[test]
fn round_trip_realizes_profit() {
    let mut ledger = PortfolioLedger::new(10_000.0);
    ledger.buy("AAPL", 10, 100.0, day(0), 0.0).unwrap();
    ledger.sell("AAPL", 10, 110.0, day(5), 0.0).unwrap();

    assert!((ledger.cash - 10_100.0).abs() < 1e-10);
    assert_eq!(ledger.open_position_count(), 0);
    let sell = &ledger.trades()[1];
    assert_eq!(sell.side, TradeSide::Sell);
    assert!((sell.realized_pnl - 100.0).abs() < 1e-10);
}

/// Scenario C: a buy the cash cannot cover fails without any state change.
#[test]
fn unaffordable_buy_changes_nothing() {
    let mut ledger = PortfolioLedger::new(10_000.0);
    let err = ledger.buy("NVDA", 1_000, 50.0, day(0), 0.0).unwrap_err();
    assert!(matches!(err, TradeError::InsufficientCash { .. }));
    assert_eq!(ledger.cash, 10_000.0);
    assert!(ledger.trades().is_empty());
    assert!(ledger.positions().is_empty());
}

/// Buys exactly when the row's date matches, with full confidence.
struct BuyOn(NaiveDate);

impl Classifier for BuyOn {
    fn predict(&self, row: &FeatureRow) -> Option<(Action, f64)> {
        (row.date == self.0).then_some((Action::Buy, 1.0))
    }
}

/// Scenario B: an entry followed by a 3% slide is force-liquidated before
/// any new entry that date, realizing the loss.
#[test]
fn stop_loss_liquidation_precedes_entries() {
    let entry_day = 24;
    let mut rows: Vec<_> = (0..=entry_day + 1).map(|i| bar(i, 100.0)).collect();
    rows.push(bar(entry_day + 2, 97.0));
    let mut data = MarketData::new();
    data.insert("XYZ".to_string(), rows);

    let config = SimConfig::default();
    let scorer = SignalScorer::new(config.scorer.clone(), config.sizer.clone())
        .with_classifier(Box::new(BuyOn(day(entry_day))));
    let sim = Simulation::new(config).unwrap().with_scorer(scorer);
    let result = sim.run(&data);

    assert_eq!(result.trades.len(), 2, "one entry, one forced exit");
    let buy = &result.trades[0];
    assert_eq!(buy.side, TradeSide::Buy);
    assert_eq!(buy.date, day(entry_day));

    let exit = &result.trades[1];
    assert_eq!(exit.side, TradeSide::Sell);
    assert_eq!(exit.date, day(entry_day + 2));
    assert!((exit.price - 97.0).abs() < 1e-10);
    assert!(
        (exit.realized_pnl - (97.0 - 100.0) * exit.quantity as f64).abs() < 1e-10,
        "loss realized against average cost"
    );
    assert_eq!(
        result.snapshots.last().unwrap().open_positions,
        0,
        "position fully closed"
    );
    // The forced exit is recorded as a sell signal with its reason.
    assert!(result
        .signals
        .iter()
        .any(|s| s.action == Action::Sell && s.reasons.iter().any(|r| r.contains("stop-loss"))));
}

struct AlwaysBlocked;

impl FilterProvider for AlwaysBlocked {
    fn filter(&self, _date: NaiveDate) -> MarketFilter {
        MarketFilter {
            allow_trading: false,
            position_size_multiplier: 0.0,
            reasons: vec!["trading halted".to_string()],
        }
    }
}

/// Scenario D: with the market filter blocking, no trades happen no matter
/// how strong the signals are.
#[test]
fn blocked_market_filter_yields_zero_trades() {
    let rows: Vec<_> = (0..30).map(|i| bar(i, 100.0)).collect();
    let mut data = MarketData::new();
    data.insert("XYZ".to_string(), rows);

    let config = SimConfig::default();
    let scorer = SignalScorer::new(config.scorer.clone(), config.sizer.clone())
        .with_classifier(Box::new(BuyOn(day(25))));
    let sim = Simulation::new(config)
        .unwrap()
        .with_scorer(scorer)
        .with_filter(Box::new(AlwaysBlocked));
    let result = sim.run(&data);

    assert!(result.trades.is_empty());
    assert!(result.signals.iter().all(|s| s.action == Action::Hold));
    assert_eq!(result.snapshots.len(), 30);
    assert_eq!(result.final_value, 10_000.0);
}

/// The scorer alone also short-circuits to HOLD with the filter's reasons.
#[test]
fn blocked_filter_hold_carries_filter_reasons() {
    let scorer = SignalScorer::new(ScorerParams::paper(), SizerParams::default());
    let rows: Vec<_> = (0..30).map(|i| bar(i, 100.0)).collect();
    let filter = MarketFilter {
        allow_trading: false,
        position_size_multiplier: 0.0,
        reasons: vec!["index limit down".to_string()],
    };
    let signal = scorer.score("XYZ", day(29), &rows, &filter, None);
    assert_eq!(signal.action, Action::Hold);
    assert!(signal.reasons.iter().any(|r| r == "index limit down"));
}

/// A catastrophic single-instrument collapse trips the critical drawdown
/// tier; the emergency stop then blocks re-entry for the rest of the run.
#[test]
fn emergency_stop_blocks_reentry_after_collapse() {
    let entry_day = 24;
    let mut rows: Vec<_> = (0..=entry_day).map(|i| bar(i, 100.0)).collect();
    // Collapse far past the stop level, then a rebound that would invite a
    // fresh entry.
    rows.push(bar(entry_day + 1, 40.0));
    for i in 0..5 {
        rows.push(bar(entry_day + 2 + i, 100.0));
    }
    let mut data = MarketData::new();
    data.insert("XYZ".to_string(), rows);

    // All-in sizing so the collapse moves the whole portfolio.
    let config = SimConfig {
        sizer: SizerParams {
            win_rate: 0.9,
            win_loss_ratio: 5.0,
            kelly_cap: 0.9,
            max_risk_per_trade: 0.5,
            max_position_pct: 0.95,
            default_volatility: 0.0,
            ..SizerParams::default()
        },
        ..SimConfig::default()
    };
    let scorer = SignalScorer::new(config.scorer.clone(), config.sizer.clone())
        .with_classifier(Box::new(BuyOnAny));
    let sim = Simulation::new(config).unwrap().with_scorer(scorer);
    let result = sim.run(&data);

    // The collapse day loses over 10% of the portfolio in one session,
    // far past the 2% daily-loss limit.
    let collapse = day(entry_day + 1);
    assert!(
        result
            .alerts
            .iter()
            .any(|a| a.date == collapse && a.message.contains("daily loss")),
        "daily-loss breach reported"
    );
    assert!(
        !result
            .trades
            .iter()
            .any(|t| t.side == TradeSide::Buy && t.date > collapse),
        "no re-entry after the emergency stop"
    );
}

/// Buys every day it can, at full confidence.
struct BuyOnAny;

impl Classifier for BuyOnAny {
    fn predict(&self, _row: &FeatureRow) -> Option<(Action, f64)> {
        Some((Action::Buy, 1.0))
    }
}

/// Buys on one date, sells on another.
struct ActOn {
    buy: NaiveDate,
    sell: NaiveDate,
}

impl Classifier for ActOn {
    fn predict(&self, row: &FeatureRow) -> Option<(Action, f64)> {
        if row.date == self.buy {
            Some((Action::Buy, 1.0))
        } else if row.date == self.sell {
            Some((Action::Sell, 1.0))
        } else {
            None
        }
    }
}

/// With the emergency stop engaged, scored sells are gated like buys; only
/// forced stop/take-profit liquidations may still exit.
#[test]
fn emergency_stop_gates_scored_sells() {
    let entry_day = 20;
    let collapse_day = 25;
    let sell_day = 27;
    let mut rows: Vec<_> = (0..collapse_day).map(|i| bar(i, 100.0)).collect();
    for i in collapse_day..=sell_day + 1 {
        rows.push(bar(i, 65.0));
    }
    let mut data = MarketData::new();
    data.insert("XYZ".to_string(), rows);

    // Wide stop/take-profit so the collapse never force-liquidates, and the
    // rule-based exit trigger silenced so only the classifier sells.
    let mut config = SimConfig {
        sizer: SizerParams {
            win_rate: 0.9,
            win_loss_ratio: 5.0,
            kelly_cap: 0.9,
            max_risk_per_trade: 0.5,
            max_position_pct: 0.95,
            default_volatility: 0.0,
            ..SizerParams::default()
        },
        limits: RiskLimits {
            stop_loss_pct: 0.8,
            take_profit_pct: 0.9,
            ..RiskLimits::default()
        },
        ..SimConfig::default()
    };
    config.scorer.weights.sell_stop_loss = 0.0;
    let scorer = SignalScorer::new(config.scorer.clone(), config.sizer.clone())
        .with_classifier(Box::new(ActOn {
            buy: day(entry_day),
            sell: day(sell_day),
        }));
    let sim = Simulation::new(config).unwrap().with_scorer(scorer);
    let result = sim.run(&data);

    // The 35% one-day slide breaches the daily-loss limit and engages the
    // stop before the sell date.
    assert!(result
        .alerts
        .iter()
        .any(|a| a.date == day(collapse_day) && a.message.contains("daily loss")));
    assert_eq!(result.trades.len(), 1, "only the entry executed");
    assert_eq!(result.trades[0].side, TradeSide::Buy);
    assert_eq!(
        result.snapshots.last().unwrap().open_positions,
        1,
        "position still held"
    );
    // The gated sell is still recorded, with nothing executed.
    let gated = result
        .signals
        .iter()
        .find(|s| s.action == Action::Sell && s.date == day(sell_day))
        .expect("sell signal recorded");
    assert_eq!(gated.quantity, 0);
}
