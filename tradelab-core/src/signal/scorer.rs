//! Signal scorer: rule triggers, classifier overlay, context overlay, gates.

use chrono::NaiveDate;
use log::debug;

use crate::domain::{Action, FeatureRow, Position, Signal};
use crate::params::{ScorerParams, SizerParams};
use crate::signal::context::{
    Classifier, MacroEnvironment, MacroOutlook, MacroProvider, MarketFilter, NewsProvider,
    NewsSentiment, NewsTrend, SectorInfo, SectorProvider,
};
use crate::signal::triggers::{Side, TriggerCtx, TRIGGERS};

/// Raw score normalization divisor: scores land roughly in [0, 10].
const CONFIDENCE_SCALE: f64 = 10.0;

/// Context resolved for one instrument-day. Providers that are absent or
/// decline contribute their neutral defaults.
#[derive(Debug, Clone, Default)]
pub struct ResolvedContext {
    pub news: NewsSentiment,
    pub sector: SectorInfo,
    pub macro_outlook: MacroOutlook,
}

impl ResolvedContext {
    /// Combined multiplicative position-size adjustment for the sizer.
    pub fn position_multiplier(&self, filter: &MarketFilter) -> f64 {
        filter.position_size_multiplier
            * self.sector.weight_adjustment
            * self.macro_outlook.position_multiplier
    }
}

/// Scores one instrument-day into a `Signal`. Construct once per run and
/// reuse across instruments; the scorer holds no per-instrument state.
pub struct SignalScorer {
    params: ScorerParams,
    exits: SizerParams,
    classifier: Option<Box<dyn Classifier>>,
    news: Option<Box<dyn NewsProvider>>,
    sector: Option<Box<dyn SectorProvider>>,
    macro_outlook: Option<Box<dyn MacroProvider>>,
}

impl SignalScorer {
    pub fn new(params: ScorerParams, exits: SizerParams) -> Self {
        Self {
            params,
            exits,
            classifier: None,
            news: None,
            sector: None,
            macro_outlook: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Box<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_news(mut self, provider: Box<dyn NewsProvider>) -> Self {
        self.news = Some(provider);
        self
    }

    pub fn with_sector(mut self, provider: Box<dyn SectorProvider>) -> Self {
        self.sector = Some(provider);
        self
    }

    pub fn with_macro(mut self, provider: Box<dyn MacroProvider>) -> Self {
        self.macro_outlook = Some(provider);
        self
    }

    pub fn params(&self) -> &ScorerParams {
        &self.params
    }

    /// Resolve providers for one instrument-day, substituting neutral
    /// defaults wherever a provider is absent or declines.
    pub fn resolve_context(&self, symbol: &str, date: NaiveDate) -> ResolvedContext {
        ResolvedContext {
            news: self
                .news
                .as_deref()
                .and_then(|p| p.sentiment(symbol, date))
                .unwrap_or_default(),
            sector: self
                .sector
                .as_deref()
                .and_then(|p| p.sector(symbol))
                .unwrap_or_default(),
            macro_outlook: self
                .macro_outlook
                .as_deref()
                .and_then(|p| p.outlook(date))
                .unwrap_or_default(),
        }
    }

    /// Score one instrument for `date`, given its history up to and including
    /// that date (oldest first). `held` is the current position, if any.
    pub fn score(
        &self,
        symbol: &str,
        date: NaiveDate,
        history: &[FeatureRow],
        filter: &MarketFilter,
        held: Option<&Position>,
    ) -> Signal {
        if history.len() < self.params.min_history_bars {
            return Signal::hold(symbol, date, "insufficient data");
        }
        let latest = &history[history.len() - 1];
        if !latest.has_valid_price() {
            return Signal::hold(symbol, date, "invalid price");
        }

        // Global gate: overrides everything, scores included.
        if !filter.allow_trading {
            let mut signal = Signal::hold(symbol, date, "market filter blocked trading");
            signal.reasons.extend(filter.reasons.iter().cloned());
            signal.price = latest.close;
            return signal;
        }

        // Minimum-holding-period gate.
        if let Some(position) = held {
            let held_days = (date - position.entry_date).num_days();
            if held_days < self.params.min_holding_days {
                let mut signal = Signal::hold(
                    symbol,
                    date,
                    format!(
                        "holding period {held_days}d below minimum {}d",
                        self.params.min_holding_days
                    ),
                );
                signal.price = latest.close;
                return signal;
            }
        }

        // Rule score: independent buy and sell accumulators.
        let ctx = TriggerCtx {
            history,
            scorer: &self.params,
            exits: &self.exits,
        };
        let mut buy_score = 0.0;
        let mut sell_score = 0.0;
        let mut reasons = Vec::new();
        for trigger in TRIGGERS {
            if (trigger.predicate)(&ctx) {
                let weight = self.params.weights.weight(trigger.id);
                match trigger.side {
                    Side::Buy => buy_score += weight,
                    Side::Sell => sell_score += weight,
                }
                reasons.push(trigger.id.label().to_string());
            }
        }

        let mut confidence =
            (buy_score.max(sell_score) / CONFIDENCE_SCALE).clamp(0.0, 1.0);

        // Classifier overlay: its action and probability become primary;
        // raw scores survive as diagnostics.
        let mut classified = None;
        if let Some(classifier) = self.classifier.as_deref() {
            if let Some((action, prob)) = classifier.predict(latest) {
                classified = Some(action);
                confidence = prob.clamp(0.0, 1.0);
                reasons.push("classifier prediction".to_string());
            }
        }

        // Context overlay, order-dependent: news, then sector, then macro.
        let context = self.resolve_context(symbol, date);
        match context.news.trend {
            NewsTrend::VeryPositive => {
                buy_score += 2.0;
                reasons.push("very positive news".to_string());
            }
            NewsTrend::Positive => {
                buy_score += 1.0;
                reasons.push("positive news".to_string());
            }
            NewsTrend::VeryNegative => {
                sell_score += 2.0;
                reasons.push("very negative news".to_string());
            }
            NewsTrend::Negative => {
                sell_score += 1.0;
                reasons.push("negative news".to_string());
            }
            NewsTrend::Neutral => {}
        }
        if context.sector.is_strong {
            buy_score += 1.0;
            reasons.push(format!("strong sector ({})", context.sector.name));
        } else if context.sector.is_weak() {
            sell_score += 1.0;
            reasons.push(format!("weak sector ({})", context.sector.name));
        }
        match context.macro_outlook.environment {
            MacroEnvironment::VeryFavorable => {
                buy_score += 1.0;
                reasons.push("very favorable macro".to_string());
            }
            MacroEnvironment::Unfavorable => {
                sell_score += 0.5;
            }
            _ => {}
        }

        // Decision. BUY is checked before SELL: a bar crossing both
        // thresholds resolves to BUY.
        let mut action = match classified {
            Some(action) => action,
            None => {
                if buy_score >= self.params.buy_threshold {
                    Action::Buy
                } else if sell_score >= self.params.sell_threshold {
                    Action::Sell
                } else {
                    Action::Hold
                }
            }
        };

        // A hostile macro regime vetoes new entries outright.
        if context.macro_outlook.environment == MacroEnvironment::VeryUnfavorable
            && action == Action::Buy
        {
            action = Action::Hold;
            reasons.push("very unfavorable macro vetoed buy".to_string());
        }

        let (stop_loss, take_profit) = self.exit_levels(latest);
        debug!(
            "[{symbol}] {date} buy={buy_score:.1} sell={sell_score:.1} conf={confidence:.2} {action:?}"
        );

        Signal {
            symbol: symbol.to_string(),
            action,
            confidence,
            date,
            price: latest.close,
            quantity: 0,
            stop_loss,
            take_profit,
            reasons,
            buy_score,
            sell_score,
        }
    }

    /// Stop-loss and take-profit levels for a prospective entry at the latest
    /// close: ATR distances when ATR is present, fixed percent otherwise.
    fn exit_levels(&self, row: &FeatureRow) -> (f64, f64) {
        match row.atr() {
            Some(atr) if atr > 0.0 => (
                row.close - atr * self.exits.atr_stop_mult,
                row.close + atr * self.exits.atr_take_profit_mult,
            ),
            _ => (
                row.close * (1.0 - self.exits.stop_loss_pct),
                row.close * (1.0 + self.exits.take_profit_pct),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::keys;

    fn scorer() -> SignalScorer {
        SignalScorer::new(ScorerParams::paper(), SizerParams::default())
    }

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap() + chrono::Days::new(day as u64)
    }

    fn flat_history(bars: usize) -> Vec<FeatureRow> {
        (0..bars)
            .map(|i| {
                FeatureRow::new(d(i as u32), 100.0, 101.0, 99.0, 100.0, 1_000_000.0)
                    .with_indicator(keys::RSI, 50.0)
            })
            .collect()
    }

    /// History whose latest bar fires RSI-oversold, lower-band, and bullish
    /// MACD cross (1.5 + 1.5 + 1.3 = 4.3 buy score under default weights).
    fn buyish_history() -> Vec<FeatureRow> {
        let mut history = flat_history(30);
        let n = history.len();
        history[n - 2] = history[n - 2]
            .clone()
            .with_indicator(keys::MACD, -0.5)
            .with_indicator(keys::MACD_SIGNAL, 0.0);
        history[n - 1] = FeatureRow::new(d(n as u32 - 1), 95.0, 96.0, 94.0, 95.0, 1_000_000.0)
            .with_indicator(keys::RSI, 25.0)
            .with_indicator(keys::BB_LOWER, 95.5)
            .with_indicator(keys::MACD, 0.2)
            .with_indicator(keys::MACD_SIGNAL, 0.1)
            .with_indicator(keys::MACD_HIST, 0.1);
        history
    }

    #[test]
    fn insufficient_history_holds() {
        let history = flat_history(5);
        let signal = scorer().score("AAPL", d(4), &history, &MarketFilter::default(), None);
        assert_eq!(signal.action, Action::Hold);
        assert_eq!(signal.reasons, vec!["insufficient data".to_string()]);
    }

    #[test]
    fn invalid_price_holds() {
        let mut history = flat_history(30);
        let n = history.len();
        history[n - 1].close = f64::NAN;
        let signal = scorer().score("AAPL", d(29), &history, &MarketFilter::default(), None);
        assert_eq!(signal.action, Action::Hold);
        assert_eq!(signal.reasons, vec!["invalid price".to_string()]);
    }

    #[test]
    fn strong_triggers_produce_buy() {
        let history = buyish_history();
        let signal = scorer().score(
            "AAPL",
            history.last().unwrap().date,
            &history,
            &MarketFilter::default(),
            None,
        );
        assert_eq!(signal.action, Action::Buy);
        assert!(signal.buy_score >= 3.0, "buy score {}", signal.buy_score);
        assert!(signal.reasons.iter().any(|r| r == "RSI oversold"));
    }

    #[test]
    fn blocked_filter_short_circuits_to_hold() {
        let history = buyish_history();
        let filter = MarketFilter {
            allow_trading: false,
            position_size_multiplier: 0.0,
            reasons: vec!["volatility regime".to_string()],
        };
        let signal = scorer().score(
            "AAPL",
            history.last().unwrap().date,
            &history,
            &filter,
            None,
        );
        assert_eq!(signal.action, Action::Hold);
        assert!(signal.reasons.iter().any(|r| r == "volatility regime"));
        assert_eq!(signal.buy_score, 0.0);
    }

    #[test]
    fn holding_period_gate_forces_hold() {
        let history = buyish_history();
        let date = history.last().unwrap().date;
        let position = Position::new("AAPL", 10, 100.0, date - chrono::Days::new(1));
        let signal = scorer().score(
            "AAPL",
            date,
            &history,
            &MarketFilter::default(),
            Some(&position),
        );
        assert_eq!(signal.action, Action::Hold);

        let aged = Position::new("AAPL", 10, 100.0, date - chrono::Days::new(10));
        let signal = scorer().score(
            "AAPL",
            date,
            &history,
            &MarketFilter::default(),
            Some(&aged),
        );
        assert_eq!(signal.action, Action::Buy);
    }

    #[test]
    fn buy_checked_before_sell_on_double_cross() {
        let mut params = ScorerParams::paper();
        params.buy_threshold = 1.0;
        params.sell_threshold = 1.0;
        let scorer = SignalScorer::new(params, SizerParams::default());
        // Latest bar is both oversold (buy 1.5) and near its rolling high
        // (sell 1.0) in a flat series.
        let mut history = flat_history(30);
        let n = history.len();
        history[n - 1] = history[n - 1].clone().with_indicator(keys::RSI, 25.0);
        let signal = scorer.score(
            "AAPL",
            history.last().unwrap().date,
            &history,
            &MarketFilter::default(),
            None,
        );
        assert!(signal.buy_score >= 1.0 && signal.sell_score >= 1.0);
        assert_eq!(signal.action, Action::Buy);
    }

    struct AlwaysSell;
    impl Classifier for AlwaysSell {
        fn predict(&self, _row: &FeatureRow) -> Option<(Action, f64)> {
            Some((Action::Sell, 0.9))
        }
    }

    #[test]
    fn classifier_output_is_primary() {
        let scorer = SignalScorer::new(ScorerParams::paper(), SizerParams::default())
            .with_classifier(Box::new(AlwaysSell));
        let history = buyish_history();
        let signal = scorer.score(
            "AAPL",
            history.last().unwrap().date,
            &history,
            &MarketFilter::default(),
            None,
        );
        assert_eq!(signal.action, Action::Sell);
        assert_eq!(signal.confidence, 0.9);
        // Raw scores survive for diagnostics.
        assert!(signal.buy_score > 0.0);
    }

    struct FixedNews(NewsTrend);
    impl NewsProvider for FixedNews {
        fn sentiment(&self, _symbol: &str, _date: NaiveDate) -> Option<NewsSentiment> {
            Some(NewsSentiment {
                score: 0.0,
                trend: self.0,
                article_count: 3,
            })
        }
    }

    #[test]
    fn very_positive_news_adds_two_to_buy_score() {
        let plain = scorer();
        let with_news = SignalScorer::new(ScorerParams::paper(), SizerParams::default())
            .with_news(Box::new(FixedNews(NewsTrend::VeryPositive)));
        let history = buyish_history();
        let date = history.last().unwrap().date;
        let base = plain.score("AAPL", date, &history, &MarketFilter::default(), None);
        let boosted = with_news.score("AAPL", date, &history, &MarketFilter::default(), None);
        assert!((boosted.buy_score - base.buy_score - 2.0).abs() < 1e-10);
    }

    struct FixedMacro(MacroEnvironment);
    impl MacroProvider for FixedMacro {
        fn outlook(&self, _date: NaiveDate) -> Option<MacroOutlook> {
            Some(MacroOutlook {
                environment: self.0,
                score: 0.0,
                position_multiplier: 1.0,
            })
        }
    }

    #[test]
    fn hostile_macro_downgrades_buy_to_hold() {
        let scorer = SignalScorer::new(ScorerParams::paper(), SizerParams::default())
            .with_macro(Box::new(FixedMacro(MacroEnvironment::VeryUnfavorable)));
        let history = buyish_history();
        let signal = scorer.score(
            "AAPL",
            history.last().unwrap().date,
            &history,
            &MarketFilter::default(),
            None,
        );
        assert_eq!(signal.action, Action::Hold);
        assert!(signal
            .reasons
            .iter()
            .any(|r| r.contains("macro vetoed buy")));
    }

    #[test]
    fn exit_levels_prefer_atr() {
        let history = {
            let mut h = buyish_history();
            let n = h.len();
            h[n - 1] = h[n - 1].clone().with_indicator(keys::ATR, 2.0);
            h
        };
        let signal = scorer().score(
            "AAPL",
            history.last().unwrap().date,
            &history,
            &MarketFilter::default(),
            None,
        );
        // close 95, ATR 2: SL 95 - 4, TP 95 + 7.
        assert!((signal.stop_loss - 91.0).abs() < 1e-10);
        assert!((signal.take_profit - 102.0).abs() < 1e-10);
    }
}
