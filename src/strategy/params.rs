//! Strategy Parameters
//!
//! Tuning knobs for trend detection and signal generation.
//! Defaults suit an ETF quoted in 0.01 ticks and polled every few seconds.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Ticks of movement in a single update that count as a sharp move
pub const SHARP_MOVE_STEPS: u32 = 2;

/// Trend and signal configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Number of recent points in the regression window
    pub window_size: usize,
    /// Slope (price per second) beyond which the trend is UP/DOWN
    pub slope_threshold: Decimal,
    /// Minimum price increment of the instrument
    pub min_price_unit: Decimal,
    /// Drawdown from the peak, in price units, that exits a downtrend
    pub drawdown_steps: u32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            slope_threshold: dec!(0.001),
            min_price_unit: dec!(0.01),
            drawdown_steps: 2,
        }
    }
}

impl StrategyConfig {
    pub fn with_window_size(mut self, size: usize) -> Self {
        self.window_size = size;
        self
    }

    pub fn with_slope_threshold(mut self, threshold: Decimal) -> Self {
        self.slope_threshold = threshold;
        self
    }

    pub fn with_min_price_unit(mut self, unit: Decimal) -> Self {
        self.min_price_unit = unit;
        self
    }

    pub fn with_drawdown_steps(mut self, steps: u32) -> Self {
        self.drawdown_steps = steps;
        self
    }

    /// Peak-to-current drop that triggers a SELL in a downtrend
    pub fn drawdown_threshold(&self) -> Decimal {
        Decimal::from(self.drawdown_steps) * self.min_price_unit
    }

    /// Single-tick move that counts as sharp
    pub fn sharp_move(&self) -> Decimal {
        Decimal::from(SHARP_MOVE_STEPS) * self.min_price_unit
    }

    pub fn validate(&self) -> Result<(), StrategyConfigError> {
        if self.window_size < 2 {
            return Err(StrategyConfigError::InvalidWindow(self.window_size));
        }
        if self.slope_threshold <= Decimal::ZERO {
            return Err(StrategyConfigError::InvalidSlopeThreshold(self.slope_threshold));
        }
        if self.min_price_unit <= Decimal::ZERO {
            return Err(StrategyConfigError::InvalidPriceUnit(self.min_price_unit));
        }
        if self.drawdown_steps == 0 {
            return Err(StrategyConfigError::InvalidDrawdownSteps(self.drawdown_steps));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StrategyConfigError {
    #[error("Invalid window size: {0} (minimum 2)")]
    InvalidWindow(usize),
    #[error("Invalid slope threshold: {0} (must be > 0)")]
    InvalidSlopeThreshold(Decimal),
    #[error("Invalid minimum price unit: {0} (must be > 0)")]
    InvalidPriceUnit(Decimal),
    #[error("Invalid drawdown steps: {0} (minimum 1)")]
    InvalidDrawdownSteps(u32),
}
