//! Day-by-day simulation over time-aligned feature rows.

pub mod loop_runner;
pub mod state;

pub use loop_runner::{FilterProvider, MarketData, Simulation};
pub use state::{RunResult, SimConfig};
