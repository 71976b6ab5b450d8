//! Position sizing: fractional Kelly capped by risk-based allocation, damped
//! by volatility, scaled by confidence.
//!
//! The sizer never reserves cash. The quantity it returns is advisory; the
//! ledger re-checks affordability when the order executes.

use log::debug;

use crate::params::SizerParams;

pub struct PositionSizer {
    params: SizerParams,
}

impl PositionSizer {
    pub fn new(params: SizerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SizerParams {
        &self.params
    }

    /// Conservative Kelly fraction of capital:
    /// `(b·p − q) / b` scaled down, clamped to [floor, cap].
    pub fn kelly_fraction(&self) -> f64 {
        let p = self.params.win_rate;
        let b = self.params.win_loss_ratio;
        let q = 1.0 - p;
        let full = (b * p - q) / b;
        (full * self.params.kelly_scale).clamp(self.params.kelly_floor, self.params.kelly_cap)
    }

    /// Whole-unit order quantity for one prospective entry.
    ///
    /// `volatility` is true-range over price; `None` falls back to the
    /// configured default. `adjustment` is the combined multiplicative factor
    /// from the market filter, sector, and macro context. The result is at
    /// least one share, except that a zero (or negative) adjustment yields
    /// exactly zero.
    pub fn size(
        &self,
        capital: f64,
        price: f64,
        volatility: Option<f64>,
        confidence: f64,
        adjustment: f64,
    ) -> i64 {
        if !(price > 0.0) || !price.is_finite() || !(capital > 0.0) {
            return 0;
        }
        if !(adjustment > 0.0) {
            return 0;
        }
        let volatility = volatility
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(self.params.default_volatility);
        let confidence = confidence.clamp(0.0, 1.0);

        let kelly_value = capital * self.kelly_fraction();
        let risk_value = capital * self.params.max_risk_per_trade / self.params.stop_loss_pct;

        let volatility_damping = 1.0 / (1.0 + volatility * 10.0);
        let confidence_scale = 0.5 + 0.5 * confidence;

        let mut value = kelly_value.min(risk_value) * volatility_damping * confidence_scale;
        value = value.min(capital * self.params.max_position_pct);
        value *= adjustment;

        let shares = ((value / price).floor() as i64).max(1);
        debug!(
            "size: capital={capital:.0} price={price:.2} vol={volatility:.3} conf={confidence:.2} adj={adjustment:.2} -> {shares}"
        );
        shares
    }
}
