//! Parallel parameter sweep over scorer-threshold grids.
//!
//! Each grid point is a fully independent run: its own ledger, risk manager,
//! and scorer. That independence is what makes the rayon fan-out safe.

use log::info;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{RunConfig, RunId};
use crate::metrics::PerformanceMetrics;
use crate::runner::{RunError, Runner};

/// Threshold grid. The cross product of the two axes is swept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepGrid {
    pub buy_thresholds: Vec<f64>,
    pub sell_thresholds: Vec<f64>,
}

impl Default for SweepGrid {
    fn default() -> Self {
        Self {
            buy_thresholds: vec![2.5, 3.0, 3.5, 4.0, 4.5],
            sell_thresholds: vec![2.0, 2.5, 3.0, 3.5, 4.0],
        }
    }
}

impl SweepGrid {
    pub fn size(&self) -> usize {
        self.buy_thresholds.len() * self.sell_thresholds.len()
    }

    /// One config per grid point, derived from `base`.
    pub fn expand(&self, base: &RunConfig) -> Vec<RunConfig> {
        let mut configs = Vec::with_capacity(self.size());
        for &buy in &self.buy_thresholds {
            for &sell in &self.sell_thresholds {
                let mut config = base.clone();
                config.name = format!("{}-b{buy:.1}-s{sell:.1}", base.name);
                config.sim.scorer.buy_threshold = buy;
                config.sim.scorer.sell_threshold = sell;
                configs.push(config);
            }
        }
        configs
    }
}

/// One leaderboard row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepEntry {
    pub run_id: RunId,
    pub name: String,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub metrics: PerformanceMetrics,
}

/// Run the grid in parallel and return entries ranked by Sharpe, best
/// first. Ties (and NaNs) fall back to run-id order so the leaderboard is
/// deterministic.
pub fn run_sweep(base: &RunConfig, grid: &SweepGrid) -> Result<Vec<SweepEntry>, RunError> {
    let configs = grid.expand(base);
    info!("sweep: {} configurations", configs.len());

    let results: Vec<Result<SweepEntry, RunError>> = configs
        .into_par_iter()
        .map(|config| {
            let buy_threshold = config.sim.scorer.buy_threshold;
            let sell_threshold = config.sim.scorer.sell_threshold;
            let backtest = Runner::new(config).run()?;
            Ok(SweepEntry {
                run_id: backtest.run_id,
                name: backtest.name,
                buy_threshold,
                sell_threshold,
                metrics: backtest.metrics,
            })
        })
        .collect();

    let mut entries = Vec::with_capacity(results.len());
    for result in results {
        entries.push(result?);
    }
    entries.sort_by(|a, b| {
        b.metrics
            .sharpe
            .partial_cmp(&a.metrics.sharpe)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.run_id.cmp(&b.run_id))
    });
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_expands_to_cross_product() {
        let grid = SweepGrid {
            buy_thresholds: vec![3.0, 4.0],
            sell_thresholds: vec![2.5, 3.0, 3.5],
        };
        let configs = grid.expand(&RunConfig::default());
        assert_eq!(configs.len(), 6);
        assert!(configs
            .iter()
            .any(|c| c.sim.scorer.buy_threshold == 4.0 && c.sim.scorer.sell_threshold == 3.5));
        // Names are distinct, so artifacts never collide.
        let mut names: Vec<_> = configs.iter().map(|c| c.name.clone()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn expanded_configs_keep_base_settings() {
        let mut base = RunConfig::default();
        base.sim.initial_capital = 25_000.0;
        let configs = SweepGrid::default().expand(&base);
        assert!(configs.iter().all(|c| c.sim.initial_capital == 25_000.0));
        assert_eq!(configs.len(), 25);
    }
}
