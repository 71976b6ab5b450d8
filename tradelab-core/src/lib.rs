//! Simulated trading engine: signal scoring, position sizing, a portfolio
//! ledger with strict accounting invariants, risk management with a sticky
//! emergency stop, and a deterministic day-by-day simulation loop.
//!
//! Market data and indicators arrive from external collaborators as
//! [`domain::FeatureRow`]s; classifier and news/sector/macro context are
//! optional trait objects with neutral defaults. The engine owns no I/O.

pub mod domain;
pub mod engine;
pub mod ledger;
pub mod params;
pub mod risk;
pub mod signal;
pub mod sizing;

pub use domain::{keys, Action, DailySnapshot, FeatureRow, Position, Signal, TradeRecord, TradeSide};
pub use engine::{FilterProvider, MarketData, RunResult, SimConfig, Simulation};
pub use ledger::{PortfolioLedger, TradeError};
pub use params::{ConfigError, RiskLimits, ScorerParams, SizerParams, TriggerWeights};
pub use risk::{RiskAlert, RiskLevel, RiskManager, RiskSummary};
pub use signal::{
    Classifier, MacroEnvironment, MacroOutlook, MacroProvider, MarketFilter, NewsProvider,
    NewsSentiment, NewsTrend, SectorInfo, SectorProvider, SignalScorer,
};
pub use sizing::PositionSizer;
