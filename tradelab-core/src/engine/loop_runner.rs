//! The simulation loop: a sequential fold over the sorted union of dates.
//!
//! Per date, strictly in order: roll risk baselines, apply the market
//! filter, liquidate positions that breached their stop or target, score and
//! execute new signals, run the portfolio risk checks, take one snapshot.
//! Instruments are processed in ascending symbol order; the order is part of
//! the contract because it decides who gets filled when cash runs short.

use chrono::NaiveDate;
use log::{debug, info, warn};
use std::collections::{BTreeMap, BTreeSet};

use crate::domain::{Action, FeatureRow, Signal};
use crate::engine::state::{RunResult, SimConfig};
use crate::ledger::{PortfolioLedger, TradeError};
use crate::params::ConfigError;
use crate::risk::RiskManager;
use crate::signal::{MacroProvider, MarketFilter, SignalScorer};
use crate::sizing::PositionSizer;

/// Per-date market-filter source. The default allows trading at full size
/// every day.
pub trait FilterProvider: Send + Sync {
    fn filter(&self, date: NaiveDate) -> MarketFilter;
}

/// History for every instrument: symbol to rows, oldest first. The BTreeMap
/// keying gives the loop its deterministic instrument order.
pub type MarketData = BTreeMap<String, Vec<FeatureRow>>;

pub struct Simulation {
    config: SimConfig,
    scorer: SignalScorer,
    sizer: PositionSizer,
    filter: Option<Box<dyn FilterProvider>>,
    macro_outlook: Option<Box<dyn MacroProvider>>,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let scorer = SignalScorer::new(config.scorer.clone(), config.sizer.clone());
        let sizer = PositionSizer::new(config.sizer.clone());
        Ok(Self {
            config,
            scorer,
            sizer,
            filter: None,
            macro_outlook: None,
        })
    }

    /// Replace the scorer, e.g. to attach a classifier or context providers.
    pub fn with_scorer(mut self, scorer: SignalScorer) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_filter(mut self, provider: Box<dyn FilterProvider>) -> Self {
        self.filter = Some(provider);
        self
    }

    pub fn with_macro(mut self, provider: Box<dyn MacroProvider>) -> Self {
        self.macro_outlook = Some(provider);
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Run to completion over `data`. Single-threaded and deterministic:
    /// identical inputs reproduce identical outputs bit for bit.
    pub fn run(&self, data: &MarketData) -> RunResult {
        let dates = self.date_union(data);
        let mut ledger = PortfolioLedger::new(self.config.initial_capital);
        let mut risk = RiskManager::new(self.config.initial_capital, self.config.limits.clone());
        let mut signals: Vec<Signal> = Vec::new();
        let mut previous_value = self.config.initial_capital;

        info!(
            "run start: {} instruments, {} dates, capital ${:.0}",
            data.len(),
            dates.len(),
            self.config.initial_capital
        );

        for &date in &dates {
            let prices = Self::prices_for(data, date);
            risk.roll_daily_reference(date, previous_value);

            let filter = self
                .filter
                .as_deref()
                .map_or_else(MarketFilter::default, |p| p.filter(date));
            risk.apply_market_filter(&filter);
            if let Some(outlook) = self
                .macro_outlook
                .as_deref()
                .and_then(|p| p.outlook(date))
            {
                risk.adapt_to_macro(&outlook);
            }

            // Liquidations strictly before new entries.
            self.liquidate(&mut ledger, &risk, &prices, date, &mut signals);

            let capital = ledger.mark_to_market(&prices);
            for (symbol, rows) in data {
                let history = history_through(rows, date);
                let Some(latest) = history.last() else {
                    continue;
                };
                if latest.date != date {
                    continue; // no bar for this instrument today
                }
                let signal = self.scorer.score(
                    symbol,
                    date,
                    history,
                    &filter,
                    ledger.position(symbol),
                );
                match signal.action {
                    Action::Buy => {
                        let executed = self.try_buy(
                            &mut ledger,
                            &risk,
                            &signal,
                            capital,
                            latest,
                            &filter,
                            date,
                        );
                        let mut signal = signal;
                        signal.quantity = executed;
                        signals.push(signal);
                    }
                    Action::Sell => {
                        let mut signal = signal;
                        if !risk.allows_trading() {
                            // Only forced stop/take-profit exits bypass the
                            // global gate.
                            debug!("sell gated for {symbol}: trading disallowed");
                        } else if let Some(position) = ledger.position(symbol) {
                            let quantity = position.quantity;
                            match ledger.sell(
                                symbol,
                                quantity,
                                signal.price,
                                date,
                                self.config.commission,
                            ) {
                                Ok(()) => signal.quantity = quantity,
                                Err(err) => debug!("sell skipped for {symbol}: {err}"),
                            }
                        }
                        signals.push(signal);
                    }
                    Action::Hold => {}
                }
            }

            let value = ledger.mark_to_market(&prices);
            risk.update_capital(value);
            risk.check_portfolio_risk(date, value, ledger.positions(), &prices);
            ledger.snapshot(date, &prices);
            previous_value = value;
        }

        let final_value = ledger
            .snapshots()
            .last()
            .map_or(self.config.initial_capital, |s| s.total_value);
        info!(
            "run complete: final ${final_value:.2}, {} trades, {} alerts",
            ledger.trades().len(),
            risk.alerts().len()
        );

        RunResult {
            initial_capital: self.config.initial_capital,
            final_value,
            trades: ledger.trades().to_vec(),
            snapshots: ledger.snapshots().to_vec(),
            signals,
            alerts: risk.alerts().to_vec(),
            total_commission: ledger.total_commission,
            winning_sells: ledger.winning_sells,
            losing_sells: ledger.losing_sells,
        }
    }

    /// Sorted union of bar dates across instruments, bounded by the config
    /// range.
    fn date_union(&self, data: &MarketData) -> Vec<NaiveDate> {
        let mut dates = BTreeSet::new();
        for rows in data.values() {
            for row in rows {
                if self.config.start.map_or(false, |s| row.date < s) {
                    continue;
                }
                if self.config.end.map_or(false, |e| row.date > e) {
                    continue;
                }
                dates.insert(row.date);
            }
        }
        dates.into_iter().collect()
    }

    fn prices_for(data: &MarketData, date: NaiveDate) -> BTreeMap<String, f64> {
        let mut prices = BTreeMap::new();
        for (symbol, rows) in data {
            if let Some(row) = rows.iter().find(|r| r.date == date) {
                if row.has_valid_price() {
                    prices.insert(symbol.clone(), row.close);
                }
            }
        }
        prices
    }

    /// Force-exit every held position whose price observation breached the
    /// effective stop-loss or take-profit. Bypasses the holding-period gate.
    fn liquidate(
        &self,
        ledger: &mut PortfolioLedger,
        risk: &RiskManager,
        prices: &BTreeMap<String, f64>,
        date: NaiveDate,
        signals: &mut Vec<Signal>,
    ) {
        let mut exits = Vec::new();
        for (symbol, position) in ledger.positions() {
            let Some(&price) = prices.get(symbol) else {
                continue;
            };
            let change = (price - position.avg_cost) / position.avg_cost;
            if change <= -risk.stop_loss_pct() {
                exits.push((symbol.clone(), position.quantity, price, "stop-loss exit"));
            } else if change >= risk.take_profit_pct() {
                exits.push((symbol.clone(), position.quantity, price, "take-profit exit"));
            }
        }
        for (symbol, quantity, price, reason) in exits {
            match ledger.sell(&symbol, quantity, price, date, self.config.commission) {
                Ok(()) => {
                    info!("{reason}: {quantity} {symbol} @ ${price:.2}");
                    signals.push(Signal::forced_exit(&symbol, date, price, quantity, reason));
                }
                Err(err) => warn!("liquidation failed for {symbol}: {err}"),
            }
        }
    }

    /// Gate and execute a buy signal. Returns the executed quantity, zero
    /// when gated or rejected.
    #[allow(clippy::too_many_arguments)]
    fn try_buy(
        &self,
        ledger: &mut PortfolioLedger,
        risk: &RiskManager,
        signal: &Signal,
        capital: f64,
        latest: &FeatureRow,
        filter: &MarketFilter,
        date: NaiveDate,
    ) -> i64 {
        if !risk.allows_trading() {
            debug!("buy gated for {}: trading disallowed", signal.symbol);
            return 0;
        }
        let already_held = ledger.has_position(&signal.symbol);
        if !already_held && ledger.open_position_count() >= self.config.limits.max_positions {
            debug!("buy gated for {}: position limit", signal.symbol);
            return 0;
        }

        let context = self.scorer.resolve_context(&signal.symbol, date);
        let adjustment = context.position_multiplier(filter);
        let mut quantity = self.sizer.size(
            capital,
            signal.price,
            latest.volatility_ratio(),
            signal.confidence,
            adjustment,
        );
        // Per-position limit from the risk manager's effective state.
        let position_cap = (capital * risk.max_position_pct() / signal.price).floor() as i64;
        let held = ledger.position(&signal.symbol).map_or(0, |p| p.quantity);
        quantity = quantity.min((position_cap - held).max(0));
        if quantity <= 0 {
            return 0;
        }

        match ledger.buy(
            &signal.symbol,
            quantity,
            signal.price,
            date,
            self.config.commission,
        ) {
            Ok(()) => quantity,
            Err(TradeError::InsufficientCash { .. }) => {
                debug!("buy skipped for {}: insufficient cash", signal.symbol);
                0
            }
            Err(err) => {
                warn!("buy failed for {}: {err}", signal.symbol);
                0
            }
        }
    }
}

/// The prefix of `rows` with dates up to and including `date`. Rows must be
/// sorted ascending by date; the scorer never sees a future bar.
fn history_through(rows: &[FeatureRow], date: NaiveDate) -> &[FeatureRow] {
    let end = rows.partition_point(|r| r.date <= date);
    &rows[..end]
}
