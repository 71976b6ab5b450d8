//! FeatureRow — one instrument-day of market data plus derived indicators.
//!
//! Indicator computation is an external collaborator's job: rows arrive with
//! their indicator fields already filled in and are read by key. An absent or
//! non-finite field reads as `None` — values are never fabricated.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known indicator keys. Providers may attach additional keys; these are
/// the ones the built-in triggers read.
pub mod keys {
    pub const RSI: &str = "rsi";
    pub const MACD: &str = "macd";
    pub const MACD_SIGNAL: &str = "macd_signal";
    pub const MACD_HIST: &str = "macd_hist";
    pub const BB_UPPER: &str = "bb_upper";
    pub const BB_LOWER: &str = "bb_lower";
    pub const MA_20: &str = "ma_20";
    pub const MA_50: &str = "ma_50";
    pub const MA_200: &str = "ma_200";
    pub const VOLUME_RATIO: &str = "volume_ratio";
    pub const ATR: &str = "atr";
    pub const ADV_20: &str = "adv_20";
}

/// One bar of OHLCV data plus named indicator fields for a single instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Named indicator fields, read by key. Absent keys are `None` to readers.
    #[serde(default)]
    pub indicators: HashMap<String, f64>,
}

impl FeatureRow {
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
            indicators: HashMap::new(),
        }
    }

    /// Attach an indicator value (builder style, used heavily in tests).
    pub fn with_indicator(mut self, key: &str, value: f64) -> Self {
        self.indicators.insert(key.to_string(), value);
        self
    }

    /// Read an indicator by key. Non-finite stored values read as `None`.
    pub fn indicator(&self, key: &str) -> Option<f64> {
        self.indicators.get(key).copied().filter(|v| v.is_finite())
    }

    /// Whether the close is usable as a trade/mark price.
    pub fn has_valid_price(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }

    pub fn rsi(&self) -> Option<f64> {
        self.indicator(keys::RSI)
    }

    pub fn atr(&self) -> Option<f64> {
        self.indicator(keys::ATR)
    }

    /// Volatility estimate used for sizing: ATR / close.
    pub fn volatility_ratio(&self) -> Option<f64> {
        match (self.atr(), self.has_valid_price()) {
            (Some(atr), true) => Some(atr / self.close),
            _ => None,
        }
    }

    /// Trend strength relative to the 50-bar moving average: (close - ma50) / ma50.
    pub fn trend_strength(&self) -> Option<f64> {
        self.indicator(keys::MA_50)
            .filter(|&ma| ma > 0.0)
            .map(|ma| (self.close - ma) / ma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> FeatureRow {
        FeatureRow::new(
            NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            100.0,
            102.0,
            99.0,
            101.0,
            1_000_000.0,
        )
    }

    #[test]
    fn indicator_lookup_by_key() {
        let r = row().with_indicator(keys::RSI, 28.5);
        assert_eq!(r.indicator(keys::RSI), Some(28.5));
        assert_eq!(r.indicator(keys::MACD), None);
    }

    #[test]
    fn non_finite_indicator_reads_as_none() {
        let r = row().with_indicator(keys::RSI, f64::NAN);
        assert_eq!(r.rsi(), None);
    }

    #[test]
    fn price_validity() {
        assert!(row().has_valid_price());
        let mut bad = row();
        bad.close = 0.0;
        assert!(!bad.has_valid_price());
        bad.close = f64::NAN;
        assert!(!bad.has_valid_price());
    }

    #[test]
    fn volatility_ratio_from_atr() {
        let r = row().with_indicator(keys::ATR, 2.02);
        assert!((r.volatility_ratio().unwrap() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn trend_strength_relative_to_ma50() {
        let r = row().with_indicator(keys::MA_50, 100.0);
        assert!((r.trend_strength().unwrap() - 0.01).abs() < 1e-12);
    }
}
