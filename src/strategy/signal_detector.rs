//! Signal Detector
//!
//! Turns trend labels and price moves into BUY/SELL/HOLD.
//!
//! BUY when:
//! - the trend reverses DOWN → UP, or
//! - the trend is UP and the price jumped more than 2 price units this tick
//!
//! SELL when:
//! - the trend is DOWN and the price is `drawdown_steps` units or more
//!   below the high-water mark, or
//! - the trend is not DOWN and the price dropped more than 2 units this tick
//!
//! BUY is checked first and wins when both would fire on the same tick.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::Signal;
use crate::strategy::params::StrategyConfig;
use crate::strategy::trend::TrendLabel;

/// State carried between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SignalState {
    /// Trend seen on the previous tick
    pub previous_trend: TrendLabel,
    /// Highest price since the last reset, unset before the first tick
    pub highest_price: Option<Decimal>,
}

/// Stateful BUY/SELL/HOLD classifier
#[derive(Debug, Clone)]
pub struct SignalDetector {
    drawdown_threshold: Decimal,
    sharp_move: Decimal,
    state: SignalState,
}

impl SignalDetector {
    pub fn new(config: &StrategyConfig) -> Self {
        Self {
            drawdown_threshold: config.drawdown_threshold(),
            sharp_move: config.sharp_move(),
            state: SignalState::default(),
        }
    }

    /// Classify the current tick.
    ///
    /// Raises the high-water mark before evaluating and records
    /// `current_trend` as the previous trend for the next tick.
    pub fn detect(
        &mut self,
        current_price: Decimal,
        previous_price: Decimal,
        current_trend: TrendLabel,
        previous_trend: TrendLabel,
    ) -> Signal {
        let highest = match self.state.highest_price {
            Some(high) if high >= current_price => high,
            _ => current_price,
        };
        self.state.highest_price = Some(highest);
        self.state.previous_trend = current_trend;

        let change = current_price - previous_price;

        let reversal = previous_trend == TrendLabel::Down && current_trend == TrendLabel::Up;
        let sharp_rise = current_trend == TrendLabel::Up && change > self.sharp_move;
        if reversal || sharp_rise {
            return Signal::Buy;
        }

        if current_trend == TrendLabel::Down {
            if highest - current_price >= self.drawdown_threshold {
                return Signal::Sell;
            }
        } else if current_price < previous_price - self.sharp_move {
            return Signal::Sell;
        }

        Signal::Hold
    }

    /// Classify using the previous trend remembered from the last tick
    pub fn on_tick(
        &mut self,
        current_price: Decimal,
        previous_price: Decimal,
        current_trend: TrendLabel,
    ) -> Signal {
        let previous_trend = self.state.previous_trend;
        self.detect(current_price, previous_price, current_trend, previous_trend)
    }

    pub fn state(&self) -> SignalState {
        self.state
    }

    pub fn highest_price(&self) -> Option<Decimal> {
        self.state.highest_price
    }

    /// Distance of `price` below the high-water mark
    pub fn drawdown(&self, price: Decimal) -> Option<Decimal> {
        self.state.highest_price.map(|high| (high - price).max(Decimal::ZERO))
    }

    /// Clear the high-water mark and trend memory for a new session
    pub fn reset(&mut self) {
        self.state = SignalState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use crate::strategy::trend::TrendLabel::{Down, Flat, Up};

    fn detector() -> SignalDetector {
        SignalDetector::new(&StrategyConfig::default())
    }

    #[test]
    fn test_first_call_sets_high_water() {
        let mut det = detector();
        assert_eq!(det.highest_price(), None);
        let signal = det.detect(dec!(9.04), dec!(9.04), Flat, Flat);
        assert_eq!(signal, Signal::Hold);
        assert_eq!(det.highest_price(), Some(dec!(9.04)));
    }

    #[test]
    fn test_high_water_never_decreases() {
        let mut det = detector();
        det.detect(dec!(9.10), dec!(9.10), Flat, Flat);
        det.detect(dec!(9.16), dec!(9.10), Flat, Flat);
        det.detect(dec!(9.12), dec!(9.16), Flat, Flat);
        assert_eq!(det.highest_price(), Some(dec!(9.16)));
        assert_eq!(det.drawdown(dec!(9.12)), Some(dec!(0.04)));
    }

    #[test]
    fn test_reversal_buys_regardless_of_delta() {
        let mut det = detector();
        assert_eq!(det.detect(dec!(9.00), dec!(9.00), Up, Down), Signal::Buy);

        let mut det = detector();
        assert_eq!(det.detect(dec!(8.90), dec!(9.00), Up, Down), Signal::Buy);
    }

    #[test]
    fn test_sharp_rise_in_uptrend_buys() {
        let mut det = detector();
        assert_eq!(det.detect(dec!(9.03), dec!(9.00), Up, Up), Signal::Buy);
        // Exactly two units is not "more than" two units
        let mut det = detector();
        assert_eq!(det.detect(dec!(9.02), dec!(9.00), Up, Up), Signal::Hold);
    }

    #[test]
    fn test_drawdown_exit() {
        let mut det = detector();
        det.detect(dec!(9.16), dec!(9.15), Flat, Flat);
        assert_eq!(det.detect(dec!(9.15), dec!(9.16), Down, Flat), Signal::Hold);

        let mut det = detector();
        det.detect(dec!(9.16), dec!(9.15), Flat, Flat);
        det.detect(dec!(9.15), dec!(9.16), Down, Flat);
        assert_eq!(det.detect(dec!(9.14), dec!(9.15), Down, Down), Signal::Sell);
    }

    #[test]
    fn test_sharp_drop_outside_downtrend_sells() {
        let mut det = detector();
        assert_eq!(det.detect(dec!(8.97), dec!(9.00), Flat, Flat), Signal::Sell);

        let mut det = detector();
        assert_eq!(det.detect(dec!(8.98), dec!(9.00), Flat, Flat), Signal::Hold);
    }

    #[test]
    fn test_sharp_drop_in_downtrend_needs_drawdown() {
        // In a downtrend only the drawdown rule applies
        let mut det = detector();
        det.detect(dec!(9.00), dec!(9.00), Flat, Flat);
        assert_eq!(det.detect(dec!(8.99), dec!(9.00), Down, Flat), Signal::Hold);
        assert_eq!(det.detect(dec!(8.98), dec!(8.99), Down, Down), Signal::Sell);
    }

    #[test]
    fn test_buy_wins_tie_with_sell() {
        // Reversal to UP with a large drop on the same tick
        let mut det = detector();
        det.detect(dec!(9.20), dec!(9.20), Down, Flat);
        assert_eq!(det.detect(dec!(9.00), dec!(9.20), Up, Down), Signal::Buy);
    }

    #[test]
    fn test_on_tick_tracks_previous_trend() {
        let mut det = detector();
        det.on_tick(dec!(9.00), dec!(9.01), Down);
        assert_eq!(det.state().previous_trend, Down);
        assert_eq!(det.on_tick(dec!(9.01), dec!(9.00), Up), Signal::Buy);
        assert_eq!(det.state().previous_trend, Up);
    }

    #[test]
    fn test_reset_clears_state() {
        let mut det = detector();
        det.detect(dec!(9.16), dec!(9.15), Up, Down);
        det.reset();
        assert_eq!(det.state(), SignalState::default());
        assert_eq!(det.highest_price(), None);
    }
}
