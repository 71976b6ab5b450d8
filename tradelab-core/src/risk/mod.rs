//! Risk management: capital-relative limits, context-adjusted effective
//! limits, portfolio risk evaluation, and the sticky emergency stop.
//!
//! Alerts are diagnostics. They are returned and logged but never drive
//! control flow themselves; only the critical drawdown and daily-loss tiers
//! set the emergency stop, and nothing clears it except an explicit reset.

use chrono::NaiveDate;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::Position;
use crate::params::RiskLimits;
use crate::signal::{MacroEnvironment, MacroOutlook, MarketFilter};

/// Drawdown tiers as fractions of initial capital.
const DRAWDOWN_MEDIUM: f64 = 0.10;
const DRAWDOWN_HIGH: f64 = 0.15;
const DRAWDOWN_CRITICAL: f64 = 0.20;
/// Concentration tiers as fractions of portfolio value.
const CONCENTRATION_MEDIUM: f64 = 0.20;
const CONCENTRATION_HIGH: f64 = 0.30;
/// Single-day move in one position that counts as a volatility event.
const POSITION_VOLATILITY_LIMIT: f64 = 0.10;
/// Fraction of the daily-loss limit that raises the early-warning tier.
const DAILY_LOSS_WARNING_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

/// One diagnostic emitted by a risk check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAlert {
    pub level: RiskLevel,
    pub message: String,
    pub date: NaiveDate,
    pub symbol: Option<String>,
    pub value: Option<f64>,
    pub threshold: Option<f64>,
}

impl RiskAlert {
    fn new(level: RiskLevel, date: NaiveDate, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            date,
            symbol: None,
            value: None,
            threshold: None,
        }
    }

    fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbol = Some(symbol.to_string());
        self
    }

    fn with_values(mut self, value: f64, threshold: f64) -> Self {
        self.value = Some(value);
        self.threshold = Some(threshold);
        self
    }
}

/// Read-only state snapshot for monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskSummary {
    pub emergency_stop: bool,
    pub market_blocked: bool,
    pub current_capital: f64,
    pub max_position_pct: f64,
    pub max_daily_loss_pct: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub alert_count: usize,
}

/// Owns the limits and the emergency-stop flag for one run. Base limits are
/// immutable; effective limits are re-derived from market filter and macro
/// context and always anchored to base.
pub struct RiskManager {
    initial_capital: f64,
    current_capital: f64,
    base: RiskLimits,
    max_position_pct: f64,
    max_daily_loss_pct: f64,
    stop_loss_pct: f64,
    take_profit_pct: f64,
    filter_multiplier: f64,
    market_blocked: bool,
    emergency_stop: bool,
    alerts: Vec<RiskAlert>,
    /// Previous day's closing portfolio value; the daily-loss baseline.
    daily_reference: f64,
    /// Portfolio value at the start of the current week.
    weekly_reference: f64,
    week_anchor: Option<NaiveDate>,
}

impl RiskManager {
    pub fn new(initial_capital: f64, limits: RiskLimits) -> Self {
        Self {
            initial_capital,
            current_capital: initial_capital,
            max_position_pct: limits.max_position_pct,
            max_daily_loss_pct: limits.max_daily_loss_pct,
            stop_loss_pct: limits.stop_loss_pct,
            take_profit_pct: limits.take_profit_pct,
            base: limits,
            filter_multiplier: 1.0,
            market_blocked: false,
            emergency_stop: false,
            alerts: Vec::new(),
            daily_reference: initial_capital,
            weekly_reference: initial_capital,
            week_anchor: None,
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.base
    }

    pub fn max_position_pct(&self) -> f64 {
        self.max_position_pct
    }

    pub fn max_daily_loss_pct(&self) -> f64 {
        self.max_daily_loss_pct
    }

    pub fn stop_loss_pct(&self) -> f64 {
        self.stop_loss_pct
    }

    pub fn take_profit_pct(&self) -> f64 {
        self.take_profit_pct
    }

    pub fn is_emergency_stopped(&self) -> bool {
        self.emergency_stop
    }

    /// True iff neither the emergency stop nor the market filter blocks
    /// trading.
    pub fn allows_trading(&self) -> bool {
        !self.emergency_stop && !self.market_blocked
    }

    /// Rescale effective position-size and daily-loss limits by the filter's
    /// multiplier: never above base, never below the configured floor.
    pub fn apply_market_filter(&mut self, filter: &MarketFilter) {
        let multiplier = filter.position_size_multiplier.max(0.0);
        self.filter_multiplier = multiplier;
        self.market_blocked = !filter.allow_trading;

        self.max_position_pct = (self.base.max_position_pct * multiplier)
            .clamp(self.base.min_position_pct, self.base.max_position_pct);
        let floor = self.base.max_daily_loss_pct * self.base.daily_loss_floor_ratio;
        self.max_daily_loss_pct = (self.base.max_daily_loss_pct * multiplier)
            .clamp(floor, self.base.max_daily_loss_pct);

        if self.market_blocked {
            info!(
                "market filter blocked trading: {}",
                filter.reasons.join(", ")
            );
        }
    }

    /// Rescale limits from the macro regime, combined multiplicatively with
    /// the market-filter multiplier already applied.
    pub fn adapt_to_macro(&mut self, outlook: &MacroOutlook) {
        let base = &self.base;
        match outlook.environment {
            MacroEnvironment::VeryUnfavorable => {
                self.max_position_pct = base.max_position_pct * 0.3;
                self.stop_loss_pct = base.stop_loss_pct * 0.7;
                self.max_daily_loss_pct = base.max_daily_loss_pct * 0.5;
                warn!("very unfavorable macro regime: defensive limits");
            }
            MacroEnvironment::Unfavorable => {
                self.max_position_pct = base.max_position_pct * 0.5;
                self.stop_loss_pct = base.stop_loss_pct * 0.85;
            }
            MacroEnvironment::Favorable => {
                self.max_position_pct = base.max_position_pct * 1.1;
                self.take_profit_pct = base.take_profit_pct * 1.2;
            }
            MacroEnvironment::VeryFavorable => {
                self.max_position_pct = base.max_position_pct * 1.3;
                self.take_profit_pct = base.take_profit_pct * 1.5;
            }
            MacroEnvironment::Neutral => {
                self.max_position_pct = base.max_position_pct;
                self.stop_loss_pct = base.stop_loss_pct;
                self.take_profit_pct = base.take_profit_pct;
                self.max_daily_loss_pct = base.max_daily_loss_pct;
            }
        }
        self.max_position_pct =
            (self.max_position_pct * self.filter_multiplier).max(self.base.min_position_pct);
    }

    /// Advance the daily (and, when a week has elapsed, weekly) loss
    /// baselines. Call once at the start of each simulated date, before any
    /// trades, with the previous close's portfolio value.
    pub fn roll_daily_reference(&mut self, date: NaiveDate, portfolio_value: f64) {
        self.daily_reference = portfolio_value;
        match self.week_anchor {
            None => {
                self.week_anchor = Some(date);
                self.weekly_reference = portfolio_value;
            }
            Some(anchor) if (date - anchor).num_days() >= 7 => {
                self.week_anchor = Some(date);
                self.weekly_reference = portfolio_value;
            }
            Some(_) => {}
        }
    }

    pub fn update_capital(&mut self, portfolio_value: f64) {
        self.current_capital = portfolio_value;
    }

    /// Run every portfolio-level check and return the alerts generated.
    /// Checks are independent; only critical drawdown and critical daily
    /// loss set the emergency stop.
    pub fn check_portfolio_risk(
        &mut self,
        date: NaiveDate,
        portfolio_value: f64,
        positions: &BTreeMap<String, Position>,
        prices: &BTreeMap<String, f64>,
    ) -> Vec<RiskAlert> {
        let mut alerts = Vec::new();
        self.check_drawdown(date, portfolio_value, &mut alerts);
        self.check_positions(date, positions, prices, &mut alerts);
        self.check_daily_loss(date, portfolio_value, &mut alerts);
        self.check_weekly_loss(date, portfolio_value, &mut alerts);
        self.check_concentration(date, portfolio_value, positions, prices, &mut alerts);
        self.check_position_volatility(date, positions, prices, &mut alerts);

        for alert in &alerts {
            match alert.level {
                RiskLevel::Critical | RiskLevel::High => {
                    warn!("risk alert [{:?}] {}", alert.level, alert.message)
                }
                _ => info!("risk alert [{:?}] {}", alert.level, alert.message),
            }
        }
        self.alerts.extend(alerts.iter().cloned());
        alerts
    }

    fn check_drawdown(&mut self, date: NaiveDate, value: f64, alerts: &mut Vec<RiskAlert>) {
        let loss_pct = (self.initial_capital - value) / self.initial_capital;
        if loss_pct > DRAWDOWN_CRITICAL {
            self.emergency_stop = true;
            alerts.push(
                RiskAlert::new(
                    RiskLevel::Critical,
                    date,
                    format!("drawdown {:.1}% exceeds critical limit", loss_pct * 100.0),
                )
                .with_values(loss_pct, DRAWDOWN_CRITICAL),
            );
        } else if loss_pct > DRAWDOWN_HIGH {
            alerts.push(
                RiskAlert::new(
                    RiskLevel::High,
                    date,
                    format!("drawdown {:.1}%", loss_pct * 100.0),
                )
                .with_values(loss_pct, DRAWDOWN_HIGH),
            );
        } else if loss_pct > DRAWDOWN_MEDIUM {
            alerts.push(
                RiskAlert::new(
                    RiskLevel::Medium,
                    date,
                    format!("drawdown {:.1}%", loss_pct * 100.0),
                )
                .with_values(loss_pct, DRAWDOWN_MEDIUM),
            );
        }
    }

    fn check_positions(
        &self,
        date: NaiveDate,
        positions: &BTreeMap<String, Position>,
        prices: &BTreeMap<String, f64>,
        alerts: &mut Vec<RiskAlert>,
    ) {
        for (symbol, position) in positions {
            let Some(&price) = prices.get(symbol) else {
                continue;
            };
            let change = (price - position.avg_cost) / position.avg_cost;
            if change < -self.stop_loss_pct {
                alerts.push(
                    RiskAlert::new(
                        RiskLevel::High,
                        date,
                        format!("{symbol} breached stop loss ({:.1}%)", change * 100.0),
                    )
                    .with_symbol(symbol)
                    .with_values(-change, self.stop_loss_pct),
                );
            } else if change > self.take_profit_pct {
                alerts.push(
                    RiskAlert::new(
                        RiskLevel::Low,
                        date,
                        format!("{symbol} reached take profit ({:.1}%)", change * 100.0),
                    )
                    .with_symbol(symbol)
                    .with_values(change, self.take_profit_pct),
                );
            }
            let ratio = price * position.quantity as f64 / self.current_capital;
            if ratio > self.max_position_pct {
                alerts.push(
                    RiskAlert::new(
                        RiskLevel::Medium,
                        date,
                        format!("{symbol} is {:.1}% of capital", ratio * 100.0),
                    )
                    .with_symbol(symbol)
                    .with_values(ratio, self.max_position_pct),
                );
            }
        }
    }

    fn check_daily_loss(&mut self, date: NaiveDate, value: f64, alerts: &mut Vec<RiskAlert>) {
        if self.daily_reference <= 0.0 {
            return;
        }
        let daily_loss = (self.daily_reference - value) / self.daily_reference;
        if daily_loss > self.max_daily_loss_pct {
            self.emergency_stop = true;
            alerts.push(
                RiskAlert::new(
                    RiskLevel::Critical,
                    date,
                    format!("daily loss {:.2}% exceeds limit", daily_loss * 100.0),
                )
                .with_values(daily_loss, self.max_daily_loss_pct),
            );
        } else if daily_loss > self.max_daily_loss_pct * DAILY_LOSS_WARNING_RATIO {
            alerts.push(
                RiskAlert::new(
                    RiskLevel::High,
                    date,
                    format!("daily loss {:.2}% approaching limit", daily_loss * 100.0),
                )
                .with_values(daily_loss, self.max_daily_loss_pct * DAILY_LOSS_WARNING_RATIO),
            );
        }
    }

    fn check_weekly_loss(&mut self, date: NaiveDate, value: f64, alerts: &mut Vec<RiskAlert>) {
        if self.weekly_reference <= 0.0 {
            return;
        }
        let weekly_loss = (self.weekly_reference - value) / self.weekly_reference;
        if weekly_loss > self.base.max_weekly_loss_pct {
            alerts.push(
                RiskAlert::new(
                    RiskLevel::High,
                    date,
                    format!("weekly loss {:.2}% exceeds limit", weekly_loss * 100.0),
                )
                .with_values(weekly_loss, self.base.max_weekly_loss_pct),
            );
        }
    }

    fn check_concentration(
        &self,
        date: NaiveDate,
        portfolio_value: f64,
        positions: &BTreeMap<String, Position>,
        prices: &BTreeMap<String, f64>,
        alerts: &mut Vec<RiskAlert>,
    ) {
        if portfolio_value <= 0.0 {
            return;
        }
        let mut worst: Option<(&str, f64)> = None;
        for (symbol, position) in positions {
            let price = prices.get(symbol).copied().unwrap_or(position.marked_price);
            let ratio = price * position.quantity as f64 / portfolio_value;
            if worst.map_or(true, |(_, w)| ratio > w) {
                worst = Some((symbol, ratio));
            }
        }
        let Some((symbol, ratio)) = worst else { return };
        if ratio > CONCENTRATION_HIGH {
            alerts.push(
                RiskAlert::new(
                    RiskLevel::High,
                    date,
                    format!("{symbol} concentration {:.1}%", ratio * 100.0),
                )
                .with_symbol(symbol)
                .with_values(ratio, CONCENTRATION_HIGH),
            );
        } else if ratio > CONCENTRATION_MEDIUM {
            alerts.push(
                RiskAlert::new(
                    RiskLevel::Medium,
                    date,
                    format!("{symbol} concentration {:.1}%", ratio * 100.0),
                )
                .with_symbol(symbol)
                .with_values(ratio, CONCENTRATION_MEDIUM),
            );
        }
    }

    fn check_position_volatility(
        &self,
        date: NaiveDate,
        positions: &BTreeMap<String, Position>,
        prices: &BTreeMap<String, f64>,
        alerts: &mut Vec<RiskAlert>,
    ) {
        for (symbol, position) in positions {
            let Some(&price) = prices.get(symbol) else {
                continue;
            };
            if position.marked_price <= 0.0 {
                continue;
            }
            let daily_change = (price / position.marked_price - 1.0).abs();
            if daily_change > POSITION_VOLATILITY_LIMIT {
                alerts.push(
                    RiskAlert::new(
                        RiskLevel::Medium,
                        date,
                        format!("{symbol} moved {:.1}% in one day", daily_change * 100.0),
                    )
                    .with_symbol(symbol)
                    .with_values(daily_change, POSITION_VOLATILITY_LIMIT),
                );
            }
        }
    }

    /// Clears the emergency stop. The only path out: nothing resets it
    /// automatically on the next evaluation cycle.
    pub fn reset_emergency_stop(&mut self) {
        if self.emergency_stop {
            warn!("emergency stop reset by explicit request");
        }
        self.emergency_stop = false;
    }

    pub fn alerts(&self) -> &[RiskAlert] {
        &self.alerts
    }

    pub fn summary(&self) -> RiskSummary {
        RiskSummary {
            emergency_stop: self.emergency_stop,
            market_blocked: self.market_blocked,
            current_capital: self.current_capital,
            max_position_pct: self.max_position_pct,
            max_daily_loss_pct: self.max_daily_loss_pct,
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
            alert_count: self.alerts.len(),
        }
    }
}
