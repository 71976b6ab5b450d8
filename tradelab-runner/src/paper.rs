//! Paper trading: the backtest cycle run forward on a timed poll.
//!
//! One writer thread owns the score/size/gate/execute cycle; readers observe
//! through [`PaperTrader::status`]. The stop flag is cooperative and only
//! checked between cycles, so a cycle always completes once started.

use chrono::NaiveDate;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tradelab_core::{
    Action, FeatureRow, MarketFilter, PortfolioLedger, PositionSizer, RiskManager, SignalScorer,
    SimConfig,
};

/// Quote and feature access for the paper loop. Implementations own all
/// blocking I/O; the loop itself never touches the network.
pub trait MarketFeed: Send + Sync {
    /// Whether the market is currently open. The loop exits when this turns
    /// false.
    fn is_open(&self) -> bool;

    /// Full feature history for one symbol, oldest first, ending at the most
    /// recent observation.
    fn history(&self, symbol: &str) -> Vec<FeatureRow>;

    /// Current market filter. The default allows trading at full size.
    fn filter(&self) -> MarketFilter {
        MarketFilter::default()
    }
}

/// Read-only view of the trader's state, cheap to clone out of the lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaperStatus {
    pub date: Option<NaiveDate>,
    pub cycles: u64,
    pub total_value: f64,
    pub cash: f64,
    pub open_positions: usize,
    pub trade_count: usize,
    pub alert_count: usize,
    pub trading_allowed: bool,
}

struct PaperState {
    ledger: PortfolioLedger,
    risk: RiskManager,
    last_date: Option<NaiveDate>,
    cycles: u64,
}

pub struct PaperTrader {
    config: SimConfig,
    universe: Vec<String>,
    scorer: SignalScorer,
    sizer: PositionSizer,
    state: Arc<Mutex<PaperState>>,
    stop: Arc<AtomicBool>,
}

impl PaperTrader {
    pub fn new(config: SimConfig, universe: Vec<String>) -> Self {
        let scorer = SignalScorer::new(config.scorer.clone(), config.sizer.clone());
        let sizer = PositionSizer::new(config.sizer.clone());
        let state = PaperState {
            ledger: PortfolioLedger::new(config.initial_capital),
            risk: RiskManager::new(config.initial_capital, config.limits.clone()),
            last_date: None,
            cycles: 0,
        };
        Self {
            config,
            universe,
            scorer,
            sizer,
            state: Arc::new(Mutex::new(state)),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_scorer(mut self, scorer: SignalScorer) -> Self {
        self.scorer = scorer;
        self
    }

    /// Handle for requesting a stop from another thread. Takes effect at the
    /// next cycle boundary.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn status(&self) -> PaperStatus {
        let state = self.lock_state();
        let prices = BTreeMap::new();
        let mut ledger = state.ledger.clone();
        let total_value = ledger.mark_to_market(&prices);
        PaperStatus {
            date: state.last_date,
            cycles: state.cycles,
            total_value,
            cash: ledger.cash,
            open_positions: ledger.open_position_count(),
            trade_count: ledger.trades().len(),
            alert_count: state.risk.alerts().len(),
            trading_allowed: state.risk.allows_trading(),
        }
    }

    /// Poll `feed` until it reports the market closed or a stop is
    /// requested. Blocks the calling thread.
    pub fn run(&self, feed: &dyn MarketFeed, poll: Duration) {
        info!(
            "paper trading start: {} symbols, capital ${:.0}",
            self.universe.len(),
            self.config.initial_capital
        );
        while !self.stop.load(Ordering::SeqCst) && feed.is_open() {
            self.cycle(feed);
            if poll > Duration::ZERO {
                std::thread::sleep(poll);
            }
        }
        let status = self.status();
        info!(
            "paper trading stopped after {} cycles: ${:.2}, {} trades",
            status.cycles, status.total_value, status.trade_count
        );
    }

    /// One full pass over the universe: liquidations, then scored entries
    /// and exits, then the portfolio risk checks.
    fn cycle(&self, feed: &dyn MarketFeed) {
        let filter = feed.filter();
        let histories: BTreeMap<String, Vec<FeatureRow>> = self
            .universe
            .iter()
            .map(|symbol| (symbol.clone(), feed.history(symbol)))
            .collect();
        let Some(date) = histories
            .values()
            .filter_map(|rows| rows.last().map(|r| r.date))
            .max()
        else {
            debug!("cycle skipped: feed returned no history");
            return;
        };
        let mut prices = BTreeMap::new();
        for (symbol, rows) in &histories {
            if let Some(row) = rows.last().filter(|r| r.has_valid_price()) {
                prices.insert(symbol.clone(), row.close);
            }
        }

        let mut state = self.lock_state();
        let PaperState {
            ledger,
            risk,
            last_date,
            cycles,
        } = &mut *state;

        if *last_date != Some(date) {
            let previous = ledger.mark_to_market(&prices);
            risk.roll_daily_reference(date, previous);
            *last_date = Some(date);
        }
        risk.apply_market_filter(&filter);

        // Stops and targets first, as in the backtest loop.
        let mut exits = Vec::new();
        for (symbol, position) in ledger.positions() {
            let Some(&price) = prices.get(symbol) else {
                continue;
            };
            let change = (price - position.avg_cost) / position.avg_cost;
            if change <= -risk.stop_loss_pct() || change >= risk.take_profit_pct() {
                exits.push((symbol.clone(), position.quantity, price));
            }
        }
        for (symbol, quantity, price) in exits {
            match ledger.sell(&symbol, quantity, price, date, self.config.commission) {
                Ok(()) => info!("exit: {quantity} {symbol} @ ${price:.2}"),
                Err(err) => warn!("exit failed for {symbol}: {err}"),
            }
        }

        let capital = ledger.mark_to_market(&prices);
        for (symbol, rows) in &histories {
            let Some(latest) = rows.last() else { continue };
            if latest.date != date {
                continue;
            }
            let signal = self
                .scorer
                .score(symbol, date, rows, &filter, ledger.position(symbol));
            match signal.action {
                Action::Buy => {
                    if !risk.allows_trading() {
                        continue;
                    }
                    let already_held = ledger.has_position(symbol);
                    if !already_held
                        && ledger.open_position_count() >= self.config.limits.max_positions
                    {
                        continue;
                    }
                    let context = self.scorer.resolve_context(symbol, date);
                    let adjustment = context.position_multiplier(&filter);
                    let mut quantity = self.sizer.size(
                        capital,
                        signal.price,
                        latest.volatility_ratio(),
                        signal.confidence,
                        adjustment,
                    );
                    let cap = (capital * risk.max_position_pct() / signal.price).floor() as i64;
                    let held = ledger.position(symbol).map_or(0, |p| p.quantity);
                    quantity = quantity.min((cap - held).max(0));
                    if quantity <= 0 {
                        continue;
                    }
                    match ledger.buy(symbol, quantity, signal.price, date, self.config.commission)
                    {
                        Ok(()) => info!("buy: {quantity} {symbol} @ ${:.2}", signal.price),
                        Err(err) => debug!("buy skipped for {symbol}: {err}"),
                    }
                }
                Action::Sell => {
                    if !risk.allows_trading() {
                        continue;
                    }
                    if let Some(position) = ledger.position(symbol) {
                        let quantity = position.quantity;
                        match ledger.sell(
                            symbol,
                            quantity,
                            signal.price,
                            date,
                            self.config.commission,
                        ) {
                            Ok(()) => info!("sell: {quantity} {symbol} @ ${:.2}", signal.price),
                            Err(err) => debug!("sell skipped for {symbol}: {err}"),
                        }
                    }
                }
                Action::Hold => {}
            }
        }

        let value = ledger.mark_to_market(&prices);
        risk.update_capital(value);
        risk.check_portfolio_risk(date, value, ledger.positions(), &prices);
        *cycles += 1;
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, PaperState> {
        // A poisoned lock still holds consistent ledger state.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU64;
    use tradelab_core::keys;

    /// Feed that reports open for a fixed number of polls, serving flat
    /// history.
    struct CountedFeed {
        remaining: AtomicU64,
    }

    impl CountedFeed {
        fn new(cycles: u64) -> Self {
            Self {
                remaining: AtomicU64::new(cycles),
            }
        }
    }

    impl MarketFeed for CountedFeed {
        fn is_open(&self) -> bool {
            self.remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }

        fn history(&self, _symbol: &str) -> Vec<FeatureRow> {
            let start = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
            (0..30)
                .map(|i| {
                    let date = start + chrono::Days::new(i);
                    FeatureRow::new(date, 100.0, 100.5, 99.5, 100.0, 1_000_000.0)
                        .with_indicator(keys::RSI, 50.0)
                })
                .collect()
        }
    }

    #[test]
    fn loop_exits_when_market_closes() {
        let trader = PaperTrader::new(SimConfig::default(), vec!["AAPL".to_string()]);
        trader.run(&CountedFeed::new(3), Duration::ZERO);
        let status = trader.status();
        assert_eq!(status.cycles, 3);
        assert_eq!(status.trade_count, 0);
        assert_eq!(status.total_value, 10_000.0);
        assert!(status.trading_allowed);
    }

    #[test]
    fn stop_flag_halts_before_any_cycle() {
        let trader = PaperTrader::new(SimConfig::default(), vec!["AAPL".to_string()]);
        trader.stop_handle().store(true, Ordering::SeqCst);
        trader.run(&CountedFeed::new(100), Duration::ZERO);
        assert_eq!(trader.status().cycles, 0);
    }

    #[test]
    fn empty_feed_cycles_without_trading() {
        struct EmptyFeed(AtomicU64);
        impl MarketFeed for EmptyFeed {
            fn is_open(&self) -> bool {
                self.0
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            }
            fn history(&self, _symbol: &str) -> Vec<FeatureRow> {
                Vec::new()
            }
        }
        let trader = PaperTrader::new(SimConfig::default(), vec!["AAPL".to_string()]);
        trader.run(&EmptyFeed(AtomicU64::new(2)), Duration::ZERO);
        // Cycles with no history are skipped before touching state.
        assert_eq!(trader.status().cycles, 0);
        assert!(trader.status().date.is_none());
    }
}
