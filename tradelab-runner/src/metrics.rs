//! Performance metrics — pure read-only aggregations over a run's snapshot
//! and trade logs.

use serde::{Deserialize, Serialize};

use tradelab_core::{DailySnapshot, TradeRecord, TradeSide};

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Aggregate performance statistics for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub max_drawdown: f64,
    /// Longest peak-to-recovery stretch, in trading days.
    pub max_drawdown_duration: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub trade_count: usize,
    pub total_commission: f64,
}

impl PerformanceMetrics {
    pub fn compute(snapshots: &[DailySnapshot], trades: &[TradeRecord]) -> Self {
        let equity: Vec<f64> = snapshots.iter().map(|s| s.total_value).collect();
        let returns = daily_returns(&equity);
        let (max_dd, max_dd_duration) = max_drawdown(&equity);
        let (win_rate, profit_factor, avg_win, avg_loss) = trade_stats(trades);
        Self {
            total_return: total_return(&equity),
            annualized_return: annualized_return(&equity),
            volatility: annualized_volatility(&returns),
            sharpe: sharpe(&returns),
            sortino: sortino(&returns),
            max_drawdown: max_dd,
            max_drawdown_duration: max_dd_duration,
            win_rate,
            profit_factor,
            avg_win,
            avg_loss,
            trade_count: trades.len(),
            total_commission: trades.iter().map(|t| t.commission).sum(),
        }
    }
}

fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&first), Some(&last)) if first > 0.0 => (last - first) / first,
        _ => 0.0,
    }
}

fn annualized_return(equity: &[f64]) -> f64 {
    let total = total_return(equity);
    let days = equity.len();
    if days < 2 || total <= -1.0 {
        return 0.0;
    }
    let years = days as f64 / TRADING_DAYS_PER_YEAR;
    (1.0 + total).powf(1.0 / years) - 1.0
}

fn daily_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .filter(|w| w[0] > 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn annualized_volatility(returns: &[f64]) -> f64 {
    std_dev(returns) * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Annualized Sharpe ratio at zero risk-free rate.
fn sharpe(returns: &[f64]) -> f64 {
    let sd = std_dev(returns);
    if sd == 0.0 {
        return 0.0;
    }
    mean(returns) / sd * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Like Sharpe but penalizing only downside deviation.
fn sortino(returns: &[f64]) -> f64 {
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
    if downside.is_empty() {
        return 0.0;
    }
    let downside_dev = (downside.iter().map(|r| r.powi(2)).sum::<f64>()
        / downside.len() as f64)
        .sqrt();
    if downside_dev == 0.0 {
        return 0.0;
    }
    mean(returns) / downside_dev * TRADING_DAYS_PER_YEAR.sqrt()
}

/// Returns (max drawdown as a positive fraction, longest underwater stretch
/// in observations).
fn max_drawdown(equity: &[f64]) -> (f64, usize) {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0;
    let mut underwater = 0usize;
    let mut longest = 0usize;
    for &value in equity {
        if value >= peak {
            peak = value;
            underwater = 0;
        } else {
            underwater += 1;
            longest = longest.max(underwater);
            if peak > 0.0 {
                max_dd = f64::max(max_dd, (peak - value) / peak);
            }
        }
    }
    (max_dd, longest)
}

fn trade_stats(trades: &[TradeRecord]) -> (f64, f64, f64, f64) {
    let sells: Vec<&TradeRecord> = trades
        .iter()
        .filter(|t| t.side == TradeSide::Sell)
        .collect();
    if sells.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let wins: Vec<f64> = sells
        .iter()
        .filter(|t| t.realized_pnl > 0.0)
        .map(|t| t.realized_pnl)
        .collect();
    let losses: Vec<f64> = sells
        .iter()
        .filter(|t| t.realized_pnl <= 0.0)
        .map(|t| t.realized_pnl)
        .collect();
    let gross_profit: f64 = wins.iter().sum();
    let gross_loss: f64 = losses.iter().map(|l| l.abs()).sum();
    let win_rate = wins.len() as f64 / sells.len() as f64;
    let profit_factor = if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };
    (win_rate, profit_factor, mean(&wins), mean(&losses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn snapshots(values: &[f64]) -> Vec<DailySnapshot> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| DailySnapshot {
                date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
                    + chrono::Days::new(i as u64),
                total_value: v,
                cash: v,
                positions_value: 0.0,
                cumulative_return: 0.0,
                open_positions: 0,
                trade_count: 0,
            })
            .collect()
    }

    fn sell(pnl: f64) -> TradeRecord {
        TradeRecord {
            symbol: "X".into(),
            side: TradeSide::Sell,
            quantity: 1,
            price: 100.0,
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            commission: 1.0,
            realized_pnl: pnl,
        }
    }

    #[test]
    fn flat_curve_has_zero_everything() {
        let m = PerformanceMetrics::compute(&snapshots(&[100.0; 10]), &[]);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.sharpe, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert_eq!(m.max_drawdown_duration, 0);
    }

    #[test]
    fn known_drawdown_and_duration() {
        // Peak 120, trough 90: 25% drawdown, underwater 3 observations.
        let m = PerformanceMetrics::compute(
            &snapshots(&[100.0, 120.0, 100.0, 90.0, 110.0, 130.0]),
            &[],
        );
        assert!((m.max_drawdown - 0.25).abs() < 1e-12);
        assert_eq!(m.max_drawdown_duration, 3);
        assert!((m.total_return - 0.3).abs() < 1e-12);
    }

    #[test]
    fn rising_curve_has_positive_sharpe_and_no_sortino_downside() {
        let m = PerformanceMetrics::compute(
            &snapshots(&[100.0, 101.0, 103.0, 104.0, 107.0]),
            &[],
        );
        assert!(m.sharpe > 0.0);
        assert_eq!(m.sortino, 0.0, "no losing days, sortino degenerate");
        assert!(m.volatility > 0.0);
    }

    #[test]
    fn trade_stats_from_realized_pnl() {
        let trades = vec![sell(50.0), sell(-20.0), sell(30.0), sell(-10.0)];
        let m = PerformanceMetrics::compute(&snapshots(&[100.0, 100.0]), &trades);
        assert!((m.win_rate - 0.5).abs() < 1e-12);
        assert!((m.profit_factor - 80.0 / 30.0).abs() < 1e-12);
        assert!((m.avg_win - 40.0).abs() < 1e-12);
        assert!((m.avg_loss - (-15.0)).abs() < 1e-12);
        assert_eq!(m.total_commission, 4.0);
    }
}
