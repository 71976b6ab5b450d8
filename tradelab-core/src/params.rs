//! Tunable parameters for the scorer, sizer, and risk manager.
//!
//! All thresholds and trigger weights are configuration data, never literals
//! scattered through the scoring code. Two named presets reproduce the two
//! historical behaviors; `paper` is the default.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Construction-time misconfiguration. Raised by `validate()` before a run
/// starts, never mid-run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be in ({low}, {high}), got {value}")]
    OutOfRange {
        name: &'static str,
        low: f64,
        high: f64,
        value: f64,
    },
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },
    #[error("{name} must be non-negative, got {value}")]
    Negative { name: &'static str, value: f64 },
    #[error("trigger weight {name} must be non-negative, got {value}")]
    NegativeWeight { name: &'static str, value: f64 },
}

fn check_fraction(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0 && value < 1.0) {
        return Err(ConfigError::OutOfRange {
            name,
            low: 0.0,
            high: 1.0,
            value,
        });
    }
    Ok(())
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0) {
        return Err(ConfigError::NonPositive { name, value });
    }
    Ok(())
}

/// Per-trigger scoring weights. Buy and sell accumulators are independent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerWeights {
    pub buy_rsi_oversold: f64,
    pub buy_bb_lower: f64,
    pub buy_near_low: f64,
    pub buy_volume_spike: f64,
    pub buy_ma_support: f64,
    pub buy_macd_cross: f64,
    pub buy_divergence: f64,
    pub buy_trend_filter: f64,
    pub buy_market_health: f64,
    pub sell_rsi_overbought: f64,
    pub sell_bb_upper: f64,
    pub sell_near_high: f64,
    pub sell_ma_resistance: f64,
    pub sell_macd_cross: f64,
    pub sell_profit_target: f64,
    pub sell_stop_loss: f64,
    pub sell_divergence: f64,
}

impl Default for TriggerWeights {
    fn default() -> Self {
        Self {
            buy_rsi_oversold: 1.5,
            buy_bb_lower: 1.5,
            buy_near_low: 1.0,
            buy_volume_spike: 1.2,
            buy_ma_support: 1.0,
            buy_macd_cross: 1.3,
            buy_divergence: 2.0,
            buy_trend_filter: 1.5,
            buy_market_health: 1.0,
            sell_rsi_overbought: 1.5,
            sell_bb_upper: 1.5,
            sell_near_high: 1.0,
            sell_ma_resistance: 1.0,
            sell_macd_cross: 1.3,
            sell_profit_target: 2.0,
            sell_stop_loss: 3.0,
            sell_divergence: 2.0,
        }
    }
}

impl TriggerWeights {
    fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("buy_rsi_oversold", self.buy_rsi_oversold),
            ("buy_bb_lower", self.buy_bb_lower),
            ("buy_near_low", self.buy_near_low),
            ("buy_volume_spike", self.buy_volume_spike),
            ("buy_ma_support", self.buy_ma_support),
            ("buy_macd_cross", self.buy_macd_cross),
            ("buy_divergence", self.buy_divergence),
            ("buy_trend_filter", self.buy_trend_filter),
            ("buy_market_health", self.buy_market_health),
            ("sell_rsi_overbought", self.sell_rsi_overbought),
            ("sell_bb_upper", self.sell_bb_upper),
            ("sell_near_high", self.sell_near_high),
            ("sell_ma_resistance", self.sell_ma_resistance),
            ("sell_macd_cross", self.sell_macd_cross),
            ("sell_profit_target", self.sell_profit_target),
            ("sell_stop_loss", self.sell_stop_loss),
            ("sell_divergence", self.sell_divergence),
        ] {
            if !(value >= 0.0) {
                return Err(ConfigError::NegativeWeight { name, value });
            }
        }
        Ok(())
    }
}

/// Signal-scorer thresholds and gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerParams {
    /// BUY when the buy score reaches this. Checked before the sell threshold.
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// Volume-ratio multiple that counts as a spike.
    pub volume_spike_ratio: f64,
    /// Minimum 20-day average dollar volume for the market-health trigger.
    pub min_adv: f64,
    /// Bars of history required before any non-HOLD signal.
    pub min_history_bars: usize,
    /// Calendar days a position must be held before a sell signal may fire.
    pub min_holding_days: i64,
    pub weights: TriggerWeights,
}

impl Default for ScorerParams {
    fn default() -> Self {
        Self::paper()
    }
}

impl ScorerParams {
    /// Permissive preset used for simulated fills.
    pub fn paper() -> Self {
        Self {
            buy_threshold: 3.0,
            sell_threshold: 2.5,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            volume_spike_ratio: 1.3,
            min_adv: 1_000_000.0,
            min_history_bars: 20,
            min_holding_days: 3,
            weights: TriggerWeights::default(),
        }
    }

    /// Conservative preset: higher conviction before committing real capital.
    pub fn live() -> Self {
        Self {
            buy_threshold: 4.5,
            sell_threshold: 4.0,
            rsi_oversold: 25.0,
            rsi_overbought: 75.0,
            volume_spike_ratio: 1.5,
            ..Self::paper()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_positive("buy_threshold", self.buy_threshold)?;
        check_positive("sell_threshold", self.sell_threshold)?;
        check_fraction("rsi_oversold/100", self.rsi_oversold / 100.0)?;
        check_fraction("rsi_overbought/100", self.rsi_overbought / 100.0)?;
        check_positive("volume_spike_ratio", self.volume_spike_ratio)?;
        check_positive("min_adv", self.min_adv)?;
        self.weights.validate()
    }
}

/// Position-sizer parameters. The Kelly inputs are assumptions, not fitted
/// estimates; the 25% scale keeps the bet a conservative fraction of full
/// Kelly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizerParams {
    pub win_rate: f64,
    pub win_loss_ratio: f64,
    /// Fraction of full Kelly actually allocated.
    pub kelly_scale: f64,
    /// Clamp bounds for the Kelly fraction, as fractions of capital.
    pub kelly_floor: f64,
    pub kelly_cap: f64,
    /// Max loss a single trade may risk, as a fraction of capital.
    pub max_risk_per_trade: f64,
    /// Fixed-percent stop/take-profit, used directly by the risk-based
    /// allocation and as the fallback when ATR is unavailable.
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    /// ATR multiples for dynamic stop/take-profit levels.
    pub atr_stop_mult: f64,
    pub atr_take_profit_mult: f64,
    /// Hard cap on any single position, as a fraction of capital.
    pub max_position_pct: f64,
    /// Volatility assumed when the feature row carries none.
    pub default_volatility: f64,
}

impl Default for SizerParams {
    fn default() -> Self {
        Self {
            win_rate: 0.35,
            win_loss_ratio: 2.0,
            kelly_scale: 0.25,
            kelly_floor: 0.01,
            kelly_cap: 0.2,
            max_risk_per_trade: 0.01,
            stop_loss_pct: 0.03,
            take_profit_pct: 0.05,
            atr_stop_mult: 2.0,
            atr_take_profit_mult: 3.5,
            max_position_pct: 0.2,
            default_volatility: 0.02,
        }
    }
}

impl SizerParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_fraction("win_rate", self.win_rate)?;
        check_positive("win_loss_ratio", self.win_loss_ratio)?;
        check_fraction("kelly_scale", self.kelly_scale)?;
        check_fraction("kelly_floor", self.kelly_floor)?;
        check_fraction("kelly_cap", self.kelly_cap)?;
        if self.kelly_floor >= self.kelly_cap {
            return Err(ConfigError::OutOfRange {
                name: "kelly_floor",
                low: 0.0,
                high: self.kelly_cap,
                value: self.kelly_floor,
            });
        }
        check_fraction("max_risk_per_trade", self.max_risk_per_trade)?;
        check_fraction("stop_loss_pct", self.stop_loss_pct)?;
        check_fraction("take_profit_pct", self.take_profit_pct)?;
        check_positive("atr_stop_mult", self.atr_stop_mult)?;
        check_positive("atr_take_profit_mult", self.atr_take_profit_mult)?;
        check_fraction("max_position_pct", self.max_position_pct)?;
        Ok(())
    }
}

/// Base risk limits, all capital-relative. The risk manager derives effective
/// limits from these; the base values themselves never change during a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    pub max_position_pct: f64,
    /// Filter/macro rescaling can never push the effective position limit
    /// below this fraction of capital.
    pub min_position_pct: f64,
    pub max_daily_loss_pct: f64,
    pub max_weekly_loss_pct: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    /// Max simultaneously open positions.
    pub max_positions: usize,
    /// A market-filter multiplier can never push the effective daily-loss
    /// limit below this fraction of base.
    pub daily_loss_floor_ratio: f64,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            max_position_pct: 0.2,
            min_position_pct: 0.01,
            max_daily_loss_pct: 0.02,
            max_weekly_loss_pct: 0.05,
            stop_loss_pct: 0.03,
            take_profit_pct: 0.05,
            max_positions: 5,
            daily_loss_floor_ratio: 0.5,
        }
    }
}

impl RiskLimits {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_fraction("max_position_pct", self.max_position_pct)?;
        check_fraction("min_position_pct", self.min_position_pct)?;
        if self.min_position_pct >= self.max_position_pct {
            return Err(ConfigError::OutOfRange {
                name: "min_position_pct",
                low: 0.0,
                high: self.max_position_pct,
                value: self.min_position_pct,
            });
        }
        check_fraction("max_daily_loss_pct", self.max_daily_loss_pct)?;
        check_fraction("max_weekly_loss_pct", self.max_weekly_loss_pct)?;
        check_fraction("stop_loss_pct", self.stop_loss_pct)?;
        check_fraction("take_profit_pct", self.take_profit_pct)?;
        check_fraction("daily_loss_floor_ratio", self.daily_loss_floor_ratio)?;
        if self.max_positions == 0 {
            return Err(ConfigError::NonPositive {
                name: "max_positions",
                value: 0.0,
            });
        }
        Ok(())
    }
}
