//! Tick Pipeline
//!
//! One synchronous pass per quote: trend estimator -> signal detector ->
//! paper portfolio. Owns every piece of per-instrument state, so separate
//! instruments need separate pipelines.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::config::Config;
use crate::domain::{
    FeedFormatError, FeedParser, PortfolioSimulator, PortfolioState, Quote, Signal, SignalCounts,
    TradeOutcome, Valuation, DEFAULT_PRECISION,
};
use crate::ports::ArchiveEntry;
use crate::strategy::{SignalDetector, StrategyConfig, TrendEstimator, TrendLabel};

use super::session::{RoundEnd, RoundSummary};

/// Everything derived from one quote
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// 1-based tick number within the current round
    pub tick: u64,
    pub observed_at: DateTime<Utc>,
    pub quote: Quote,
    pub previous_price: Decimal,
    pub trend: TrendLabel,
    pub slope: Decimal,
    pub signal: Signal,
    pub outcome: TradeOutcome,
    pub portfolio: PortfolioState,
    pub valuation: Valuation,
}

impl TickReport {
    pub fn archive_entry(&self) -> ArchiveEntry {
        ArchiveEntry {
            observed_at: self.observed_at,
            quote: self.quote.clone(),
            trend: self.trend,
            slope: self.slope,
            signal: self.signal,
        }
    }

    /// Single-line status for logs and the terminal
    pub fn status_line(&self) -> String {
        let q = &self.quote;
        format!(
            "{} {} {} ({:+}, {:+}%) | trend {} slope {} | {} | cash {:.2} shares {} total {:.2} ({:+.2}%)",
            q.trade_time.format("%H:%M:%S"),
            q.code,
            q.format_price(q.price),
            q.change_display(),
            q.change_percent(),
            self.trend,
            self.slope.round_dp(6),
            self.signal,
            self.portfolio.cash,
            self.portfolio.shares_held,
            self.valuation.total_assets,
            self.valuation.return_pct,
        )
    }
}

#[derive(Debug, Clone)]
pub struct TickPipeline {
    estimator: TrendEstimator,
    detector: SignalDetector,
    simulator: PortfolioSimulator,
    initial_buy: bool,
    previous_price: Option<Decimal>,
    history: Vec<Decimal>,
    precision: u32,
    counts: SignalCounts,
    ticks: u64,
}

impl TickPipeline {
    pub fn new(config: &StrategyConfig, initial_funds: Decimal, lot_size: u64) -> Self {
        Self {
            estimator: TrendEstimator::from_config(config),
            detector: SignalDetector::new(config),
            simulator: PortfolioSimulator::new(initial_funds, lot_size),
            initial_buy: false,
            previous_price: None,
            history: Vec::new(),
            precision: DEFAULT_PRECISION,
            counts: SignalCounts::default(),
            ticks: 0,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &StrategyConfig::from(config),
            config.portfolio.initial_funds,
            config.portfolio.lot_size,
        )
        .with_initial_buy(config.portfolio.initial_buy)
    }

    /// Force a BUY on the first tick after every reset
    pub fn with_initial_buy(mut self, enabled: bool) -> Self {
        self.initial_buy = enabled;
        self
    }

    /// Run one quote through the estimator, detector and portfolio
    pub fn process(&mut self, quote: &Quote, observed_at: DateTime<Utc>) -> TickReport {
        let price = quote.price;
        let previous_price = self.previous_price.unwrap_or(price);

        let reading = self.estimator.update_reading(price, observed_at);
        let detected = self.detector.on_tick(price, previous_price, reading.label);
        let signal = if self.initial_buy && self.ticks == 0 {
            Signal::Buy
        } else {
            detected
        };

        let outcome = self.simulator.execute(signal, price);
        let portfolio = self.simulator.state();
        let valuation = self.simulator.valuation(price);

        self.previous_price = Some(price);
        self.history.push(price);
        self.precision = quote.precision;
        self.counts.record(signal);
        self.ticks += 1;

        tracing::debug!(
            tick = self.ticks,
            %price,
            slope = %reading.slope,
            trend = %reading.label,
            %signal,
            "Tick processed"
        );

        TickReport {
            tick: self.ticks,
            observed_at,
            quote: quote.clone(),
            previous_price,
            trend: reading.label,
            slope: reading.slope,
            signal,
            outcome,
            portfolio,
            valuation,
        }
    }

    /// Parse a raw feed response and process it
    pub fn process_raw(
        &mut self,
        raw: &str,
        observed_at: DateTime<Utc>,
    ) -> Result<TickReport, FeedFormatError> {
        let quote = FeedParser::parse_first(raw)?;
        Ok(self.process(&quote, observed_at))
    }

    /// Drive archived ticks through this pipeline, using each entry's
    /// observation time as the tick time
    pub fn replay<'a, I>(&mut self, entries: I) -> Vec<TickReport>
    where
        I: IntoIterator<Item = &'a ArchiveEntry>,
    {
        entries
            .into_iter()
            .map(|entry| self.process(&entry.quote, entry.observed_at))
            .collect()
    }

    /// Fresh trend window, high-water mark and portfolio
    pub fn reset(&mut self) {
        self.estimator.reset();
        self.detector.reset();
        self.simulator.reset();
        self.previous_price = None;
        self.history.clear();
        self.precision = DEFAULT_PRECISION;
        self.counts = SignalCounts::default();
        self.ticks = 0;
    }

    /// Account for everything processed since the last reset
    pub fn summary(
        &self,
        round: u32,
        code: &str,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
        end_reason: RoundEnd,
    ) -> RoundSummary {
        let state = self.simulator.state();
        let last_price = self.history.last().copied();
        let valuation = match last_price {
            Some(price) => self.simulator.valuation(price),
            None => Valuation {
                cash: state.cash,
                position_value: Decimal::ZERO,
                total_assets: state.cash,
                return_pct: Decimal::ZERO,
            },
        };

        RoundSummary {
            round,
            code: code.to_string(),
            started_at,
            ended_at,
            end_reason,
            ticks: self.ticks,
            initial_funds: self.simulator.initial_funds(),
            cash: state.cash,
            shares_held: state.shares_held,
            last_price,
            position_value: valuation.position_value,
            total_assets: valuation.total_assets,
            return_pct: valuation.return_pct,
            trade_count: state.trade_count,
            signals: self.counts,
            prices: self.history.clone(),
            precision: self.precision,
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn history(&self) -> &[Decimal] {
        &self.history
    }

    pub fn precision(&self) -> u32 {
        self.precision
    }

    pub fn counts(&self) -> SignalCounts {
        self.counts
    }

    pub fn portfolio(&self) -> PortfolioState {
        self.simulator.state()
    }

    pub fn detector(&self) -> &SignalDetector {
        &self.detector
    }

    pub fn estimator(&self) -> &TrendEstimator {
        &self.estimator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::feed_parser::fixtures::record;
    use crate::domain::quote::fixtures::sample_quote;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 2, 0, 0).unwrap()
    }

    fn pipeline() -> TickPipeline {
        TickPipeline::new(&StrategyConfig::default(), dec!(10000), 100)
    }

    #[test]
    fn test_first_tick_uses_own_price_as_previous() {
        let mut pipeline = pipeline();
        let report = pipeline.process(&sample_quote(dec!(9.04)), start());

        assert_eq!(report.tick, 1);
        assert_eq!(report.previous_price, dec!(9.04));
        assert_eq!(report.trend, TrendLabel::Flat);
        assert_eq!(report.signal, Signal::Hold);
        assert_eq!(report.outcome, TradeOutcome::Held);
        assert_eq!(pipeline.detector().highest_price(), Some(dec!(9.04)));
    }

    #[test]
    fn test_initial_buy_on_first_tick_only() {
        let mut pipeline = pipeline().with_initial_buy(true);

        let first = pipeline.process(&sample_quote(dec!(9.04)), start());
        assert_eq!(first.signal, Signal::Buy);
        assert_eq!(first.portfolio.shares_held, 1100);
        assert_eq!(first.portfolio.cash, dec!(56.00));

        let second = pipeline.process(&sample_quote(dec!(9.04)), start() + Duration::seconds(5));
        assert_eq!(second.signal, Signal::Hold);
        assert_eq!(second.portfolio.trade_count, 1);
    }

    #[test]
    fn test_rising_prices_trigger_buy() {
        let mut pipeline = pipeline();
        let prices = [dec!(9.00), dec!(9.02), dec!(9.05)];

        let reports: Vec<TickReport> = prices
            .iter()
            .enumerate()
            .map(|(i, p)| pipeline.process(&sample_quote(*p), start() + Duration::seconds(5 * i as i64)))
            .collect();

        // slope over (0, 9.00), (5, 9.02), (10, 9.05) is 0.005/s -> UP;
        // 9.05 - 9.02 = 0.03 > 0.02 is a sharp rise
        assert_eq!(reports[2].trend, TrendLabel::Up);
        assert_eq!(reports[2].signal, Signal::Buy);
        assert_eq!(reports[2].portfolio.shares_held, 1100);
    }

    #[test]
    fn test_process_raw_carries_precision() {
        let mut pipeline = pipeline();
        let raw = record("sh518880", "2.040", "2.046");

        let report = pipeline.process_raw(&raw, start()).unwrap();
        assert_eq!(report.quote.precision, 3);
        assert_eq!(pipeline.precision(), 3);
        assert!(pipeline.process_raw("garbage", start()).is_err());
        assert_eq!(pipeline.ticks(), 1);
    }

    #[test]
    fn test_reset_starts_new_session() {
        let mut pipeline = pipeline().with_initial_buy(true);
        pipeline.process(&sample_quote(dec!(9.04)), start());
        assert_eq!(pipeline.portfolio().shares_held, 1100);

        pipeline.reset();

        assert_eq!(pipeline.ticks(), 0);
        assert!(pipeline.history().is_empty());
        assert_eq!(pipeline.portfolio(), PortfolioState::new(dec!(10000)));
        assert_eq!(pipeline.detector().highest_price(), None);
        assert!(pipeline.estimator().window().is_empty());
        assert_eq!(pipeline.counts().total(), 0);
    }

    #[test]
    fn test_summary_values_position_at_last_price() {
        let mut pipeline = pipeline().with_initial_buy(true);
        pipeline.process(&sample_quote(dec!(9.04)), start());
        pipeline.process(&sample_quote(dec!(9.05)), start() + Duration::seconds(5));

        let summary = pipeline.summary(1, "518880", start(), start() + Duration::seconds(5), RoundEnd::Shutdown);

        assert_eq!(summary.ticks, 2);
        assert_eq!(summary.last_price, Some(dec!(9.05)));
        assert_eq!(summary.position_value, dec!(9955.00));
        assert_eq!(summary.total_assets, dec!(10011.00));
        assert_eq!(summary.return_pct, dec!(0.11));
        assert_eq!(summary.prices, vec![dec!(9.04), dec!(9.05)]);
        assert_eq!(summary.signals.buy, 1);
    }

    #[test]
    fn test_summary_without_ticks() {
        let summary = pipeline().summary(1, "518880", start(), start(), RoundEnd::MarketClosed);
        assert_eq!(summary.total_assets, dec!(10000));
        assert_eq!(summary.return_pct, Decimal::ZERO);
        assert!(summary.last_price.is_none());
    }

    #[test]
    fn test_replay_uses_observed_time() {
        let entries: Vec<ArchiveEntry> = [dec!(9.00), dec!(9.02), dec!(9.05)]
            .into_iter()
            .enumerate()
            .map(|(i, price)| ArchiveEntry {
                observed_at: start() + Duration::seconds(5 * i as i64),
                quote: sample_quote(price),
                trend: TrendLabel::Flat,
                slope: Decimal::ZERO,
                signal: Signal::Hold,
            })
            .collect();

        let reports = pipeline().replay(&entries);
        assert_eq!(reports.len(), 3);
        assert_eq!(reports[2].observed_at, start() + Duration::seconds(10));
        assert_eq!(reports[2].signal, Signal::Buy);
    }
}
