//! Strategy Layer - Slope trend detection and drawdown-exit signals
//!
//! - `TrendEstimator`: least-squares slope over a short sliding window,
//!   labelled UP/DOWN/FLAT against a fixed threshold
//! - `SignalDetector`: reversal/sharp-move entries, drawdown-from-peak and
//!   sharp-drop exits, BUY-first tie-break

pub mod params;
pub mod trend;
pub mod signal_detector;

pub use params::{StrategyConfig, StrategyConfigError, SHARP_MOVE_STEPS};
pub use trend::{TrendEstimator, TrendLabel, TrendPoint, TrendReading, TrendWindow};
pub use signal_detector::{SignalDetector, SignalState};
