//! Domain types: feature rows, positions, trades, snapshots, signals.

pub mod feature;
pub mod position;
pub mod signal;
pub mod snapshot;
pub mod trade;

pub use feature::{keys, FeatureRow};
pub use position::Position;
pub use signal::{Action, Signal};
pub use snapshot::DailySnapshot;
pub use trade::{TradeRecord, TradeSide};
