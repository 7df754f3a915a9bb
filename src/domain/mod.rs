//! Domain Layer - Core types for the quote monitor
//!
//! Pure types and logic with no I/O:
//! - `quote`: parsed quote snapshot, markets, order book levels
//! - `feed_parser`: fixed-format feed record → `Quote`
//! - `signal`: BUY/SELL/HOLD tokens
//! - `portfolio`: lot-sized paper portfolio and valuation

pub mod quote;
pub mod feed_parser;
pub mod signal;
pub mod portfolio;

pub use quote::{BookLevel, Market, Quote, DEFAULT_PRECISION, SHARES_PER_LOT};
pub use feed_parser::{FeedFormatError, FeedParser, MIN_FIELDS};
pub use signal::{Signal, SignalCounts};
pub use portfolio::{
    PortfolioSimulator, PortfolioState, SkipReason, TradeOutcome, Valuation, DEFAULT_LOT_SIZE,
};
