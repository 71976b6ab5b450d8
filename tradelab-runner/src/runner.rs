//! Single-run orchestration: load data, run the simulation, compute
//! metrics, write artifacts.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use tradelab_core::{MarketData, RunResult, Simulation, TradeSide};

use crate::config::{RunConfig, RunId};
use crate::data_loader::{self, LoadError};
use crate::metrics::PerformanceMetrics;
use crate::synthetic;

/// Trading days generated per symbol when no CSV file is present.
const SYNTHETIC_DAYS: usize = 252;
const SYNTHETIC_START: (i32, u32, u32) = (2023, 1, 2);

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] tradelab_core::ConfigError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("no usable data for any symbol in the universe")]
    EmptyUniverse,
    #[error("failed to write artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write trade log: {0}")]
    TradeLog(#[from] csv::Error),
    #[error("failed to serialize result: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Everything a run produces, serialized as the `result.json` artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    pub run_id: RunId,
    pub name: String,
    pub config: RunConfig,
    pub metrics: PerformanceMetrics,
    pub result: RunResult,
}

pub struct Runner {
    config: RunConfig,
}

impl Runner {
    pub fn new(config: RunConfig) -> Self {
        Self { config }
    }

    /// Load feature rows for every symbol in the universe: CSV when a file
    /// exists under `data_dir`, seeded synthetic rows otherwise.
    pub fn load_data(&self) -> Result<MarketData, RunError> {
        let mut data = MarketData::new();
        for symbol in &self.config.universe {
            let csv_path = self
                .config
                .data_dir
                .as_ref()
                .map(|dir| dir.join(format!("{symbol}.csv")));
            let rows = match csv_path {
                Some(path) if path.exists() => data_loader::load_csv(&path)?,
                _ => {
                    let (y, m, d) = SYNTHETIC_START;
                    let start = chrono::NaiveDate::from_ymd_opt(y, m, d)
                        .expect("static start date");
                    info!("{symbol}: no CSV found, generating synthetic rows");
                    synthetic::generate(symbol, start, SYNTHETIC_DAYS, self.config.seed)
                }
            };
            if rows.is_empty() {
                warn!("{symbol}: no rows, skipping");
                continue;
            }
            data.insert(symbol.clone(), rows);
        }
        if data.is_empty() {
            return Err(RunError::EmptyUniverse);
        }
        Ok(data)
    }

    /// Run the backtest and write `result.json` and `trades.csv` under
    /// `{output_dir}/{run_id}/`.
    pub fn run(&self) -> Result<BacktestResult, RunError> {
        let run_id = self.config.run_id();
        info!("run {} ({})", self.config.name, &run_id[..12]);

        let data = self.load_data()?;
        let simulation = Simulation::new(self.config.sim.clone())?;
        let result = simulation.run(&data);
        let metrics = PerformanceMetrics::compute(&result.snapshots, &result.trades);

        let backtest = BacktestResult {
            run_id: run_id.clone(),
            name: self.config.name.clone(),
            config: self.config.clone(),
            metrics,
            result,
        };
        self.write_artifacts(&backtest)?;
        info!(
            "run {} done: return {:.2}%, {} trades",
            self.config.name,
            backtest.metrics.total_return * 100.0,
            backtest.metrics.trade_count
        );
        Ok(backtest)
    }

    fn write_artifacts(&self, backtest: &BacktestResult) -> Result<(), RunError> {
        let dir = self.config.output_dir.join(&backtest.run_id);
        std::fs::create_dir_all(&dir).map_err(|source| RunError::Artifact {
            path: dir.clone(),
            source,
        })?;

        let json_path = dir.join("result.json");
        let json = serde_json::to_string_pretty(backtest)?;
        std::fs::write(&json_path, json).map_err(|source| RunError::Artifact {
            path: json_path,
            source,
        })?;

        write_trades_csv(&dir.join("trades.csv"), backtest)?;
        Ok(())
    }
}

fn write_trades_csv(path: &Path, backtest: &BacktestResult) -> Result<(), RunError> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "date",
        "symbol",
        "side",
        "quantity",
        "price",
        "commission",
        "realized_pnl",
    ])?;
    for trade in &backtest.result.trades {
        let side = match trade.side {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        };
        writer.write_record([
            trade.date.to_string(),
            trade.symbol.clone(),
            side.to_string(),
            trade.quantity.to_string(),
            format!("{:.4}", trade.price),
            format!("{:.4}", trade.commission),
            format!("{:.4}", trade.realized_pnl),
        ])?;
    }
    writer.flush().map_err(|source| RunError::Artifact {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}
