//! Run configuration and result types for the simulation loop.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{DailySnapshot, Signal, TradeRecord};
use crate::params::{ConfigError, RiskLimits, ScorerParams, SizerParams};
use crate::risk::RiskAlert;

/// Everything that defines one run. Serializable so a run can be
/// fingerprinted and reproduced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub initial_capital: f64,
    /// Flat commission charged per executed trade.
    pub commission: f64,
    /// Inclusive date bounds; `None` means unbounded on that side.
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub scorer: ScorerParams,
    pub sizer: SizerParams,
    pub limits: RiskLimits,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            commission: 0.0,
            start: None,
            end: None,
            scorer: ScorerParams::default(),
            sizer: SizerParams::default(),
            limits: RiskLimits::default(),
        }
    }
}

impl SimConfig {
    /// Fail-fast validation, run before the loop starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.initial_capital > 0.0) {
            return Err(ConfigError::NonPositive {
                name: "initial_capital",
                value: self.initial_capital,
            });
        }
        if self.commission < 0.0 {
            return Err(ConfigError::Negative {
                name: "commission",
                value: self.commission,
            });
        }
        self.scorer.validate()?;
        self.sizer.validate()?;
        self.limits.validate()
    }
}

/// Accumulated output of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub initial_capital: f64,
    pub final_value: f64,
    pub trades: Vec<TradeRecord>,
    pub snapshots: Vec<DailySnapshot>,
    /// Every non-HOLD signal the scorer produced, executed or not.
    pub signals: Vec<Signal>,
    pub alerts: Vec<RiskAlert>,
    pub total_commission: f64,
    pub winning_sells: usize,
    pub losing_sells: usize,
}

impl RunResult {
    pub fn total_return(&self) -> f64 {
        (self.final_value - self.initial_capital) / self.initial_capital
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        SimConfig::default().validate().unwrap();
    }

    #[test]
    fn non_positive_capital_rejected() {
        let config = SimConfig {
            initial_capital: 0.0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_commission_valid_negative_rejected() {
        let free = SimConfig {
            commission: 0.0,
            ..SimConfig::default()
        };
        free.validate().unwrap();

        let negative = SimConfig {
            commission: -1.0,
            ..SimConfig::default()
        };
        let err = negative.validate().unwrap_err();
        assert!(err.to_string().contains("non-negative"));
    }

    #[test]
    fn config_roundtrips_through_json() {
        let config = SimConfig {
            start: NaiveDate::from_ymd_opt(2024, 1, 2),
            scorer: ScorerParams::live(),
            ..SimConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: SimConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.start, config.start);
        assert_eq!(back.scorer.buy_threshold, 4.5);
    }
}
