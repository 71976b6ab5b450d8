//! Rule triggers — the enumerable (id, side, predicate) table behind the
//! scorer's buy/sell accumulators.
//!
//! Every trigger is a pure predicate over the history slice for one
//! instrument, latest bar last. A trigger whose inputs are missing simply
//! does not fire. Weights live in `TriggerWeights`; predicates hold no
//! scoring literals beyond their own lookback geometry.

use crate::domain::{keys, FeatureRow};
use crate::params::{ScorerParams, SizerParams, TriggerWeights};

/// Bars of the recent-low/high proximity windows.
const LOW_LOOKBACK: usize = 10;
const HIGH_LOOKBACK: usize = 10;
/// Rolling window used on both legs of divergence detection.
const DIVERGENCE_WINDOW: usize = 20;
/// Bars between the entry-assumption row and the latest row for the
/// profit-target and stop-loss triggers.
const EXIT_LOOKBACK: usize = 5;

/// Identity of a rule trigger, used for weight lookup and reason strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerId {
    BuyRsiOversold,
    BuyBbLower,
    BuyNearLow,
    BuyVolumeSpike,
    BuyMaSupport,
    BuyMacdCross,
    BuyDivergence,
    BuyTrendFilter,
    BuyMarketHealth,
    SellRsiOverbought,
    SellBbUpper,
    SellNearHigh,
    SellMaResistance,
    SellMacdCross,
    SellProfitTarget,
    SellStopLoss,
    SellDivergence,
}

impl TriggerId {
    pub fn label(self) -> &'static str {
        match self {
            TriggerId::BuyRsiOversold => "RSI oversold",
            TriggerId::BuyBbLower => "lower band touch",
            TriggerId::BuyNearLow => "near recent low",
            TriggerId::BuyVolumeSpike => "volume spike on decline",
            TriggerId::BuyMaSupport => "moving-average support",
            TriggerId::BuyMacdCross => "MACD bullish cross",
            TriggerId::BuyDivergence => "bullish divergence",
            TriggerId::BuyTrendFilter => "above 200-bar trend",
            TriggerId::BuyMarketHealth => "healthy market",
            TriggerId::SellRsiOverbought => "RSI overbought",
            TriggerId::SellBbUpper => "upper band breach",
            TriggerId::SellNearHigh => "near recent high",
            TriggerId::SellMaResistance => "moving-average resistance",
            TriggerId::SellMacdCross => "MACD bearish cross",
            TriggerId::SellProfitTarget => "profit target reached",
            TriggerId::SellStopLoss => "stop-loss breach",
            TriggerId::SellDivergence => "bearish divergence",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Buy,
    Sell,
}

/// Everything a predicate may inspect.
pub struct TriggerCtx<'a> {
    /// History for one instrument, oldest first, latest bar last. Non-empty.
    pub history: &'a [FeatureRow],
    pub scorer: &'a ScorerParams,
    pub exits: &'a SizerParams,
}

impl<'a> TriggerCtx<'a> {
    fn latest(&self) -> &FeatureRow {
        &self.history[self.history.len() - 1]
    }

    fn prev(&self) -> Option<&FeatureRow> {
        self.history.len().checked_sub(2).map(|i| &self.history[i])
    }

    /// Row `n` bars before the latest.
    fn back(&self, n: usize) -> Option<&FeatureRow> {
        self.history.len().checked_sub(n + 1).map(|i| &self.history[i])
    }

    /// The `len` rows ending `offset` bars before the latest (inclusive of
    /// the row at that offset). `None` when the history is too short.
    fn window(&self, offset: usize, len: usize) -> Option<&'a [FeatureRow]> {
        let end = self.history.len().checked_sub(offset)?;
        let start = end.checked_sub(len)?;
        Some(&self.history[start..end])
    }
}

fn min_by(rows: &[FeatureRow], f: impl Fn(&FeatureRow) -> Option<f64>) -> Option<f64> {
    rows.iter().filter_map(f).fold(None, |acc, v| {
        Some(acc.map_or(v, |a: f64| a.min(v)))
    })
}

fn max_by(rows: &[FeatureRow], f: impl Fn(&FeatureRow) -> Option<f64>) -> Option<f64> {
    rows.iter().filter_map(f).fold(None, |acc, v| {
        Some(acc.map_or(v, |a: f64| a.max(v)))
    })
}

type Predicate = fn(&TriggerCtx) -> bool;

/// One row of the trigger table.
pub struct Trigger {
    pub id: TriggerId,
    pub side: Side,
    pub predicate: Predicate,
}

/// The full trigger table, buy side first. Order is the evaluation and
/// reason-reporting order.
pub const TRIGGERS: &[Trigger] = &[
    Trigger { id: TriggerId::BuyRsiOversold, side: Side::Buy, predicate: buy_rsi_oversold },
    Trigger { id: TriggerId::BuyBbLower, side: Side::Buy, predicate: buy_bb_lower },
    Trigger { id: TriggerId::BuyNearLow, side: Side::Buy, predicate: buy_near_low },
    Trigger { id: TriggerId::BuyVolumeSpike, side: Side::Buy, predicate: buy_volume_spike },
    Trigger { id: TriggerId::BuyMaSupport, side: Side::Buy, predicate: buy_ma_support },
    Trigger { id: TriggerId::BuyMacdCross, side: Side::Buy, predicate: buy_macd_cross },
    Trigger { id: TriggerId::BuyDivergence, side: Side::Buy, predicate: buy_divergence },
    Trigger { id: TriggerId::BuyTrendFilter, side: Side::Buy, predicate: buy_trend_filter },
    Trigger { id: TriggerId::BuyMarketHealth, side: Side::Buy, predicate: buy_market_health },
    Trigger { id: TriggerId::SellRsiOverbought, side: Side::Sell, predicate: sell_rsi_overbought },
    Trigger { id: TriggerId::SellBbUpper, side: Side::Sell, predicate: sell_bb_upper },
    Trigger { id: TriggerId::SellNearHigh, side: Side::Sell, predicate: sell_near_high },
    Trigger { id: TriggerId::SellMaResistance, side: Side::Sell, predicate: sell_ma_resistance },
    Trigger { id: TriggerId::SellMacdCross, side: Side::Sell, predicate: sell_macd_cross },
    Trigger { id: TriggerId::SellProfitTarget, side: Side::Sell, predicate: sell_profit_target },
    Trigger { id: TriggerId::SellStopLoss, side: Side::Sell, predicate: sell_stop_loss },
    Trigger { id: TriggerId::SellDivergence, side: Side::Sell, predicate: sell_divergence },
];

impl TriggerWeights {
    pub fn weight(&self, id: TriggerId) -> f64 {
        match id {
            TriggerId::BuyRsiOversold => self.buy_rsi_oversold,
            TriggerId::BuyBbLower => self.buy_bb_lower,
            TriggerId::BuyNearLow => self.buy_near_low,
            TriggerId::BuyVolumeSpike => self.buy_volume_spike,
            TriggerId::BuyMaSupport => self.buy_ma_support,
            TriggerId::BuyMacdCross => self.buy_macd_cross,
            TriggerId::BuyDivergence => self.buy_divergence,
            TriggerId::BuyTrendFilter => self.buy_trend_filter,
            TriggerId::BuyMarketHealth => self.buy_market_health,
            TriggerId::SellRsiOverbought => self.sell_rsi_overbought,
            TriggerId::SellBbUpper => self.sell_bb_upper,
            TriggerId::SellNearHigh => self.sell_near_high,
            TriggerId::SellMaResistance => self.sell_ma_resistance,
            TriggerId::SellMacdCross => self.sell_macd_cross,
            TriggerId::SellProfitTarget => self.sell_profit_target,
            TriggerId::SellStopLoss => self.sell_stop_loss,
            TriggerId::SellDivergence => self.sell_divergence,
        }
    }
}

fn buy_rsi_oversold(ctx: &TriggerCtx) -> bool {
    matches!(ctx.latest().rsi(), Some(rsi) if rsi < ctx.scorer.rsi_oversold)
}

fn buy_bb_lower(ctx: &TriggerCtx) -> bool {
    let row = ctx.latest();
    match (row.indicator(keys::BB_LOWER), row.rsi()) {
        (Some(lower), Some(rsi)) => row.close <= lower && rsi < 40.0,
        _ => false,
    }
}

fn buy_near_low(ctx: &TriggerCtx) -> bool {
    let row = ctx.latest();
    let Some(window) = ctx.window(0, LOW_LOOKBACK) else {
        return false;
    };
    let Some(rolling_low) = min_by(window, |r| Some(r.low)) else {
        return false;
    };
    let volume_ok = row
        .indicator(keys::VOLUME_RATIO)
        .map_or(false, |v| v > 0.8);
    row.close <= rolling_low * 1.02 && volume_ok
}

fn buy_volume_spike(ctx: &TriggerCtx) -> bool {
    let row = ctx.latest();
    let Some(prev) = ctx.prev() else { return false };
    let spike = row
        .indicator(keys::VOLUME_RATIO)
        .map_or(false, |v| v > ctx.scorer.volume_spike_ratio);
    spike && row.close < prev.close
}

fn buy_ma_support(ctx: &TriggerCtx) -> bool {
    let row = ctx.latest();
    match (row.indicator(keys::MA_20), row.indicator(keys::MA_50)) {
        (Some(ma20), Some(ma50)) => row.close > ma20 && row.close > ma50 && ma20 > ma50,
        _ => false,
    }
}

fn buy_macd_cross(ctx: &TriggerCtx) -> bool {
    let row = ctx.latest();
    let Some(prev) = ctx.prev() else { return false };
    match (
        row.indicator(keys::MACD),
        row.indicator(keys::MACD_SIGNAL),
        row.indicator(keys::MACD_HIST),
        prev.indicator(keys::MACD),
        prev.indicator(keys::MACD_SIGNAL),
    ) {
        (Some(macd), Some(sig), Some(hist), Some(p_macd), Some(p_sig)) => {
            macd > sig && p_macd <= p_sig && hist > 0.0
        }
        _ => false,
    }
}

/// Price makes a lower low than the prior window while RSI makes a higher
/// low: momentum refuses to confirm the decline.
fn buy_divergence(ctx: &TriggerCtx) -> bool {
    let row = ctx.latest();
    let Some(prior) = ctx.window(DIVERGENCE_WINDOW, DIVERGENCE_WINDOW) else {
        return false;
    };
    match (
        min_by(prior, |r| Some(r.low)),
        min_by(prior, FeatureRow::rsi),
        row.rsi(),
    ) {
        (Some(prior_low), Some(prior_rsi_low), Some(rsi)) => {
            row.low <= prior_low && rsi > prior_rsi_low
        }
        _ => false,
    }
}

fn buy_trend_filter(ctx: &TriggerCtx) -> bool {
    let row = ctx.latest();
    matches!(row.indicator(keys::MA_200), Some(ma) if row.close > ma)
}

fn buy_market_health(ctx: &TriggerCtx) -> bool {
    let row = ctx.latest();
    let trend_ok = row.trend_strength().map_or(false, |t| t > -0.05);
    let liquid = row
        .indicator(keys::ADV_20)
        .map_or(false, |adv| adv > ctx.scorer.min_adv);
    trend_ok && liquid
}

fn sell_rsi_overbought(ctx: &TriggerCtx) -> bool {
    matches!(ctx.latest().rsi(), Some(rsi) if rsi > ctx.scorer.rsi_overbought)
}

fn sell_bb_upper(ctx: &TriggerCtx) -> bool {
    let row = ctx.latest();
    match (row.indicator(keys::BB_UPPER), row.rsi()) {
        (Some(upper), Some(rsi)) => row.close >= upper && rsi > 60.0,
        _ => false,
    }
}

fn sell_near_high(ctx: &TriggerCtx) -> bool {
    let row = ctx.latest();
    let Some(window) = ctx.window(0, HIGH_LOOKBACK) else {
        return false;
    };
    match max_by(window, |r| Some(r.high)) {
        Some(rolling_high) => row.close >= rolling_high * 0.98,
        None => false,
    }
}

fn sell_ma_resistance(ctx: &TriggerCtx) -> bool {
    let row = ctx.latest();
    match (row.indicator(keys::MA_20), row.indicator(keys::MA_50)) {
        (Some(ma20), Some(ma50)) => row.close < ma20 && row.close < ma50 && ma20 < ma50,
        _ => false,
    }
}

fn sell_macd_cross(ctx: &TriggerCtx) -> bool {
    let row = ctx.latest();
    let Some(prev) = ctx.prev() else { return false };
    match (
        row.indicator(keys::MACD),
        row.indicator(keys::MACD_SIGNAL),
        row.indicator(keys::MACD_HIST),
        prev.indicator(keys::MACD),
        prev.indicator(keys::MACD_SIGNAL),
    ) {
        (Some(macd), Some(sig), Some(hist), Some(p_macd), Some(p_sig)) => {
            macd < sig && p_macd >= p_sig && hist < 0.0
        }
        _ => false,
    }
}

/// Gain over the last `EXIT_LOOKBACK` bars exceeds the take-profit distance.
/// ATR from the entry-assumption row when available, fixed percent otherwise.
fn sell_profit_target(ctx: &TriggerCtx) -> bool {
    let row = ctx.latest();
    let Some(entry) = ctx.back(EXIT_LOOKBACK) else {
        return false;
    };
    match entry.atr() {
        Some(atr) => row.close - entry.close > atr * ctx.exits.atr_take_profit_mult,
        None => {
            entry.close > 0.0
                && (row.close - entry.close) / entry.close > ctx.exits.take_profit_pct
        }
    }
}

fn sell_stop_loss(ctx: &TriggerCtx) -> bool {
    let row = ctx.latest();
    let Some(entry) = ctx.back(EXIT_LOOKBACK) else {
        return false;
    };
    match entry.atr() {
        Some(atr) => entry.close - row.close > atr * ctx.exits.atr_stop_mult,
        None => {
            entry.close > 0.0
                && (row.close - entry.close) / entry.close < -ctx.exits.stop_loss_pct
        }
    }
}

fn sell_divergence(ctx: &TriggerCtx) -> bool {
    let row = ctx.latest();
    let Some(prior) = ctx.window(DIVERGENCE_WINDOW, DIVERGENCE_WINDOW) else {
        return false;
    };
    match (
        max_by(prior, |r| Some(r.high)),
        max_by(prior, FeatureRow::rsi),
        row.rsi(),
    ) {
        (Some(prior_high), Some(prior_rsi_high), Some(rsi)) => {
            row.high >= prior_high && rsi < prior_rsi_high
        }
        _ => false,
    }
}
