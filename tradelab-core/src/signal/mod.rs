//! Signal scoring: rule triggers plus optional classifier and context
//! overlays, gated by the market filter and minimum holding period.

pub mod context;
pub mod scorer;
pub mod triggers;

pub use context::{
    Classifier, MacroEnvironment, MacroOutlook, MacroProvider, MarketFilter, NewsProvider,
    NewsSentiment, NewsTrend, SectorInfo, SectorProvider,
};
pub use scorer::{ResolvedContext, SignalScorer};
pub use triggers::{Side, Trigger, TriggerCtx, TriggerId, TRIGGERS};
