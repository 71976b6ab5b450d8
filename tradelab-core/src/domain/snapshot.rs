//! DailySnapshot — end-of-day portfolio valuation record.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One end-of-day valuation of the portfolio. Appended after all same-day
/// executions; exactly one per simulated date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub total_value: f64,
    pub cash: f64,
    pub positions_value: f64,
    /// Cumulative return since the run started: (value - initial) / initial.
    pub cumulative_return: f64,
    pub open_positions: usize,
    pub trade_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serialization_roundtrip() {
        let snap = DailySnapshot {
            date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            total_value: 10_250.0,
            cash: 8_000.0,
            positions_value: 2_250.0,
            cumulative_return: 0.025,
            open_positions: 2,
            trade_count: 7,
        };
        let json = serde_json::to_string(&snap).unwrap();
        let deser: DailySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snap.date, deser.date);
        assert_eq!(snap.total_value, deser.total_value);
        assert_eq!(snap.open_positions, deser.open_positions);
    }
}
