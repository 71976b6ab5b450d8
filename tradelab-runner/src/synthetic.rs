//! Seeded synthetic feature rows for offline smoke runs.
//!
//! A geometric random walk with volume noise, plus the derived indicator
//! fields the scorer's triggers read. Same seed, same rows.

use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tradelab_core::{keys, FeatureRow};

const RSI_PERIOD: usize = 14;
const ATR_PERIOD: usize = 14;
const BB_PERIOD: usize = 20;
const BB_WIDTH: f64 = 2.0;

/// Generate `days` of synthetic bars starting at `start`, weekdays only.
/// The seed is mixed with the symbol so each instrument gets its own walk.
pub fn generate(symbol: &str, start: NaiveDate, days: usize, seed: u64) -> Vec<FeatureRow> {
    let mut rng = StdRng::seed_from_u64(seed ^ symbol_seed(symbol));
    let mut price: f64 = rng.gen_range(20.0..200.0);
    let base_volume: f64 = rng.gen_range(500_000.0..5_000_000.0);

    let mut bars = Vec::with_capacity(days);
    let mut date = start;
    while bars.len() < days {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            date = date.succ_opt().unwrap_or(date);
            continue;
        }
        let drift = rng.gen_range(-0.02..0.021);
        let open = price;
        let close = (price * (1.0 + drift)).max(0.5);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = base_volume * rng.gen_range(0.5..2.0);
        bars.push(FeatureRow::new(date, open, high, low, close, volume));
        price = close;
        date = date.succ_opt().unwrap_or(date);
    }
    attach_indicators(&mut bars);
    bars
}

fn symbol_seed(symbol: &str) -> u64 {
    let hash = blake3::hash(symbol.as_bytes());
    u64::from_le_bytes(hash.as_bytes()[..8].try_into().unwrap_or([0; 8]))
}

/// Fill the indicator fields the built-in triggers read.
fn attach_indicators(bars: &mut [FeatureRow]) {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let ma20 = sma(&closes, 20);
    let ma50 = sma(&closes, 50);
    let ma200 = sma(&closes, 200);
    let rsi = rsi(&closes, RSI_PERIOD);
    let (bb_upper, bb_lower) = bollinger(&closes, BB_PERIOD, BB_WIDTH);
    let (macd, macd_signal, macd_hist) = macd(&closes);
    let atr = atr(bars, ATR_PERIOD);

    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let vol_ma20 = sma(&volumes, 20);
    let dollar: Vec<f64> = bars.iter().map(|b| b.close * b.volume).collect();
    let adv20 = sma(&dollar, 20);

    for (i, bar) in bars.iter_mut().enumerate() {
        let mut set = |key: &str, value: Option<f64>| {
            if let Some(v) = value {
                bar.indicators.insert(key.to_string(), v);
            }
        };
        set(keys::MA_20, ma20[i]);
        set(keys::MA_50, ma50[i]);
        set(keys::MA_200, ma200[i]);
        set(keys::RSI, rsi[i]);
        set(keys::BB_UPPER, bb_upper[i]);
        set(keys::BB_LOWER, bb_lower[i]);
        set(keys::MACD, macd[i]);
        set(keys::MACD_SIGNAL, macd_signal[i]);
        set(keys::MACD_HIST, macd_hist[i]);
        set(keys::ATR, atr[i]);
        set(keys::ADV_20, adv20[i]);
        set(
            keys::VOLUME_RATIO,
            vol_ma20[i].filter(|&m| m > 0.0).map(|m| volumes[i] / m),
        );
    }
}

fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 {
        return out;
    }
    let mut sum = 0.0;
    for i in 0..values.len() {
        sum += values[i];
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out[i] = Some(sum / period as f64);
        }
    }
    out
}

fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut current = values.first().copied().unwrap_or(0.0);
    for &v in values {
        current = alpha * v + (1.0 - alpha) * current;
        out.push(current);
    }
    out
}

fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if closes.len() <= period {
        return out;
    }
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        let (gain, loss) = (change.max(0.0), (-change).max(0.0));
        if i <= period {
            avg_gain += gain / period as f64;
            avg_loss += loss / period as f64;
        } else {
            avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
            avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        }
        if i >= period {
            out[i] = Some(if avg_loss == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
            });
        }
    }
    out
}

fn bollinger(closes: &[f64], period: usize, width: f64) -> (Vec<Option<f64>>, Vec<Option<f64>>) {
    let middle = sma(closes, period);
    let mut upper = vec![None; closes.len()];
    let mut lower = vec![None; closes.len()];
    for i in 0..closes.len() {
        let Some(mean) = middle[i] else { continue };
        let window = &closes[i + 1 - period..=i];
        let variance =
            window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
        let dev = variance.sqrt();
        upper[i] = Some(mean + width * dev);
        lower[i] = Some(mean - width * dev);
    }
    (upper, lower)
}

fn macd(closes: &[f64]) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let fast = ema(closes, 12);
    let slow = ema(closes, 26);
    let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let signal = ema(&line, 9);
    let n = closes.len();
    let mut macd_out = vec![None; n];
    let mut signal_out = vec![None; n];
    let mut hist_out = vec![None; n];
    for i in 0..n {
        if i + 1 >= 26 {
            macd_out[i] = Some(line[i]);
            signal_out[i] = Some(signal[i]);
            hist_out[i] = Some(line[i] - signal[i]);
        }
    }
    (macd_out, signal_out, hist_out)
}

fn atr(bars: &[FeatureRow], period: usize) -> Vec<Option<f64>> {
    let mut true_ranges = Vec::with_capacity(bars.len());
    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            let prev_close = bars[i - 1].close;
            (bar.high - bar.low)
                .max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs())
        };
        true_ranges.push(tr);
    }
    sma(&true_ranges, period)
}
