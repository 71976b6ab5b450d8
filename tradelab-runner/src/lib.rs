//! TradeLab Runner — backtest orchestration on top of `tradelab-core`.
//!
//! This crate provides:
//! - TOML run configuration with presets and a content-addressed run id
//! - CSV feature-row loading with a seeded synthetic fallback
//! - Single-backtest runner with artifact output (result JSON, trade log)
//! - Performance metrics over snapshot and trade logs
//! - Parallel parameter sweep with a deterministic leaderboard
//! - A paper-trading poll loop driven by a `MarketFeed`

pub mod config;
pub mod data_loader;
pub mod metrics;
pub mod paper;
pub mod runner;
pub mod sweep;
pub mod synthetic;

pub use config::{ConfigLoadError, RunConfig, RunId, SignalPreset};
pub use data_loader::{load_csv, LoadError};
pub use metrics::PerformanceMetrics;
pub use paper::{MarketFeed, PaperStatus, PaperTrader};
pub use runner::{BacktestResult, RunError, Runner};
pub use sweep::{run_sweep, SweepEntry, SweepGrid};
