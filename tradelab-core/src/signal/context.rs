//! Optional scoring context: classifier, news, sector, and macro providers
//! plus the market-filter snapshot.
//!
//! Every provider is optional. "Provider unavailable" is an expected case,
//! modelled as `Option` with a documented neutral default, never as an error.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{Action, FeatureRow};

/// Discrete news-sentiment trend category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewsTrend {
    VeryPositive,
    Positive,
    Neutral,
    Negative,
    VeryNegative,
}

/// News sentiment for one instrument. Neutral default: trend `Neutral`,
/// score 0, no articles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsSentiment {
    pub score: f64,
    pub trend: NewsTrend,
    pub article_count: usize,
}

impl Default for NewsSentiment {
    fn default() -> Self {
        Self {
            score: 0.0,
            trend: NewsTrend::Neutral,
            article_count: 0,
        }
    }
}

/// Sector standing for one instrument. Neutral default: unranked (999),
/// not strong, weight adjustment 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorInfo {
    pub name: String,
    /// 1 = strongest sector. 999 means unranked.
    pub rank: u32,
    pub is_strong: bool,
    /// Multiplicative position-size adjustment.
    pub weight_adjustment: f64,
}

impl Default for SectorInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            rank: 999,
            is_strong: false,
            weight_adjustment: 1.0,
        }
    }
}

impl SectorInfo {
    /// Ranked but near the bottom of the table.
    pub fn is_weak(&self) -> bool {
        self.rank > 8 && self.rank < 999
    }
}

/// Discrete macro-environment classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MacroEnvironment {
    VeryUnfavorable,
    Unfavorable,
    Neutral,
    Favorable,
    VeryFavorable,
}

/// Macro outlook snapshot. Neutral default: `Neutral`, multiplier 1.0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MacroOutlook {
    pub environment: MacroEnvironment,
    pub score: f64,
    /// Multiplicative position-size adjustment.
    pub position_multiplier: f64,
}

impl Default for MacroOutlook {
    fn default() -> Self {
        Self {
            environment: MacroEnvironment::Neutral,
            score: 0.0,
            position_multiplier: 1.0,
        }
    }
}

/// Global market-filter snapshot. Default allows trading at full size.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketFilter {
    pub allow_trading: bool,
    pub position_size_multiplier: f64,
    pub reasons: Vec<String>,
}

impl Default for MarketFilter {
    fn default() -> Self {
        Self {
            allow_trading: true,
            position_size_multiplier: 1.0,
            reasons: Vec::new(),
        }
    }
}

/// A trained prediction function. The rule-score path must work without one.
pub trait Classifier: Send + Sync {
    /// Predicted action and max-class probability for the latest row.
    /// `None` means the model declined to predict (e.g. missing features).
    fn predict(&self, row: &FeatureRow) -> Option<(Action, f64)>;
}

pub trait NewsProvider: Send + Sync {
    fn sentiment(&self, symbol: &str, date: NaiveDate) -> Option<NewsSentiment>;
}

pub trait SectorProvider: Send + Sync {
    fn sector(&self, symbol: &str) -> Option<SectorInfo>;
}

pub trait MacroProvider: Send + Sync {
    fn outlook(&self, date: NaiveDate) -> Option<MacroOutlook>;
}
