//! Trend Estimator
//!
//! Least-squares slope of price against elapsed time over a short FIFO
//! window of recent ticks.
//!
//! slope = (n·Σxy − Σx·Σy) / (n·Σx² − (Σx)²)
//!
//! where x is seconds since the oldest point in the window. The slope is
//! compared against a fixed threshold with strict inequality on both sides,
//! so a slope of exactly ±threshold is FLAT.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::strategy::params::StrategyConfig;

/// Direction of the short-term trend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrendLabel {
    Up,
    Down,
    #[default]
    Flat,
}

impl TrendLabel {
    /// Classify a slope against the threshold
    pub fn from_slope(slope: Decimal, threshold: Decimal) -> Self {
        if slope > threshold {
            TrendLabel::Up
        } else if slope < -threshold {
            TrendLabel::Down
        } else {
            TrendLabel::Flat
        }
    }
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendLabel::Up => write!(f, "UP"),
            TrendLabel::Down => write!(f, "DOWN"),
            TrendLabel::Flat => write!(f, "FLAT"),
        }
    }
}

/// One (price, timestamp) observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendPoint {
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Bounded FIFO of the most recent observations
#[derive(Debug, Clone)]
pub struct TrendWindow {
    capacity: usize,
    points: VecDeque<TrendPoint>,
}

impl TrendWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            points: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append a point, evicting the oldest once over capacity
    pub fn push(&mut self, point: TrendPoint) {
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    /// Least-squares slope in price units per second.
    ///
    /// Zero with fewer than 2 points or when every timestamp is identical.
    pub fn slope(&self) -> Decimal {
        let n = self.points.len();
        if n < 2 {
            return Decimal::ZERO;
        }

        let origin = self.points[0].timestamp;
        let mut sum_x = Decimal::ZERO;
        let mut sum_y = Decimal::ZERO;
        let mut sum_xy = Decimal::ZERO;
        let mut sum_x2 = Decimal::ZERO;

        for point in &self.points {
            let x = elapsed_seconds(origin, point.timestamp);
            let y = point.price;
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_x2 += x * x;
        }

        let n = Decimal::from(n);
        let denominator = n * sum_x2 - sum_x * sum_x;
        if denominator.is_zero() {
            return Decimal::ZERO;
        }

        (n * sum_xy - sum_x * sum_y) / denominator
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&TrendPoint> {
        self.points.back()
    }

    pub fn points(&self) -> impl Iterator<Item = &TrendPoint> {
        self.points.iter()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

fn elapsed_seconds(origin: DateTime<Utc>, at: DateTime<Utc>) -> Decimal {
    Decimal::new((at - origin).num_milliseconds(), 3)
}

/// Label together with the slope that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendReading {
    pub label: TrendLabel,
    pub slope: Decimal,
}

/// Sliding-window trend classifier
#[derive(Debug, Clone)]
pub struct TrendEstimator {
    window: TrendWindow,
    threshold: Decimal,
}

impl TrendEstimator {
    pub fn new(window_size: usize, threshold: Decimal) -> Self {
        Self {
            window: TrendWindow::new(window_size),
            threshold,
        }
    }

    pub fn from_config(config: &StrategyConfig) -> Self {
        Self::new(config.window_size, config.slope_threshold)
    }

    /// Add an observation and return the current trend label
    pub fn update(&mut self, price: Decimal, timestamp: DateTime<Utc>) -> TrendLabel {
        self.update_reading(price, timestamp).label
    }

    /// Add an observation and return label and slope
    pub fn update_reading(&mut self, price: Decimal, timestamp: DateTime<Utc>) -> TrendReading {
        if let Some(last) = self.window.latest() {
            if timestamp < last.timestamp {
                tracing::warn!(
                    previous = %last.timestamp,
                    current = %timestamp,
                    "Tick timestamp went backwards; slope may be meaningless"
                );
            }
        }

        self.window.push(TrendPoint { price, timestamp });
        let slope = self.window.slope();
        let label = TrendLabel::from_slope(slope, self.threshold);

        tracing::trace!(%price, %slope, %label, points = self.window.len(), "Trend updated");

        TrendReading { label, slope }
    }

    pub fn threshold(&self) -> Decimal {
        self.threshold
    }

    pub fn window(&self) -> &TrendWindow {
        &self.window
    }

    /// Drop all history, e.g. at the start of a monitoring round
    pub fn reset(&mut self) {
        self.window.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 2, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn estimator() -> TrendEstimator {
        TrendEstimator::from_config(&StrategyConfig::default())
    }

    #[test]
    fn test_single_point_is_flat() {
        let mut est = estimator();
        let reading = est.update_reading(dec!(9.04), at(0));
        assert_eq!(reading.label, TrendLabel::Flat);
        assert_eq!(reading.slope, Decimal::ZERO);
    }

    #[test]
    fn test_rising_prices_are_up() {
        let mut est = estimator();
        est.update(dec!(9.04), at(0));
        est.update(dec!(9.05), at(1));
        let label = est.update(dec!(9.06), at(2));
        assert_eq!(label, TrendLabel::Up);
    }

    #[test]
    fn test_falling_prices_are_down() {
        let mut est = estimator();
        est.update(dec!(9.16), at(0));
        est.update(dec!(9.15), at(1));
        let reading = est.update_reading(dec!(9.14), at(2));
        assert_eq!(reading.label, TrendLabel::Down);
        assert_eq!(reading.slope, dec!(-0.01));
    }

    #[test]
    fn test_slope_exactly_at_threshold_is_flat() {
        let mut est = estimator();
        est.update(dec!(10.000), at(0));
        est.update(dec!(10.001), at(1));
        let reading = est.update_reading(dec!(10.002), at(2));
        assert_eq!(reading.slope, dec!(0.001));
        assert_eq!(reading.label, TrendLabel::Flat);

        let mut est = estimator();
        est.update(dec!(10.002), at(0));
        est.update(dec!(10.001), at(1));
        let reading = est.update_reading(dec!(10.000), at(2));
        assert_eq!(reading.slope, dec!(-0.001));
        assert_eq!(reading.label, TrendLabel::Flat);
    }

    #[test]
    fn test_identical_timestamps_give_zero_slope() {
        let mut est = estimator();
        est.update(dec!(9.00), at(5));
        let reading = est.update_reading(dec!(9.50), at(5));
        assert_eq!(reading.slope, Decimal::ZERO);
        assert_eq!(reading.label, TrendLabel::Flat);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let mut est = estimator();
        for i in 0..7 {
            est.update(Decimal::from(i), at(i));
        }
        assert_eq!(est.window().len(), 5);
        let first = est.window().points().next().unwrap();
        assert_eq!(first.price, Decimal::from(2));
        assert_eq!(first.timestamp, at(2));
    }

    #[test]
    fn test_slope_uses_elapsed_time() {
        let mut window = TrendWindow::new(5);
        window.push(TrendPoint { price: dec!(9.00), timestamp: at(0) });
        window.push(TrendPoint { price: dec!(9.10), timestamp: at(5) });
        // 0.10 over 5 seconds
        assert_eq!(window.slope(), dec!(0.02));
    }

    #[test]
    fn test_sub_second_timestamps() {
        let mut window = TrendWindow::new(5);
        let t0 = at(0);
        window.push(TrendPoint { price: dec!(1.000), timestamp: t0 });
        window.push(TrendPoint {
            price: dec!(1.001),
            timestamp: t0 + Duration::milliseconds(500),
        });
        assert_eq!(window.slope(), dec!(0.002));
    }

    #[test]
    fn test_reset_clears_window() {
        let mut est = estimator();
        est.update(dec!(9.04), at(0));
        est.update(dec!(9.05), at(1));
        est.reset();
        assert!(est.window().is_empty());
    }

    #[test]
    fn test_label_from_slope() {
        let threshold = dec!(0.001);
        assert_eq!(TrendLabel::from_slope(dec!(0.0011), threshold), TrendLabel::Up);
        assert_eq!(TrendLabel::from_slope(dec!(-0.0011), threshold), TrendLabel::Down);
        assert_eq!(TrendLabel::from_slope(dec!(0.0005), threshold), TrendLabel::Flat);
    }
}
