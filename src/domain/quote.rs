//! Quote snapshot types
//!
//! A `Quote` is one immutable snapshot of the instrument produced by the
//! feed parser. Prices keep the exact digits the feed sent; the display
//! precision travels with the quote instead of living in shared state.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shares per board lot as quoted by the feed (display unit for sizes)
pub const SHARES_PER_LOT: u64 = 100;
/// Turnover display unit (ten-thousand currency units)
pub const TURNOVER_UNIT: u64 = 10_000;
/// Precision used when neither price field carries a fractional part
pub const DEFAULT_PRECISION: u32 = 2;
/// Largest precision the feed is known to use
pub const MAX_PRECISION: u32 = 4;
/// Number of order book levels per side
pub const BOOK_DEPTH: usize = 5;

/// Exchange the instrument is listed on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    Shanghai,
    Shenzhen,
    Beijing,
    Unknown,
}

impl Market {
    /// Look up the market from the 2-character feed prefix.
    /// Unrecognized prefixes are `Unknown`, never an error.
    pub fn from_prefix(prefix: &str) -> Self {
        match prefix.to_ascii_lowercase().as_str() {
            "sh" => Market::Shanghai,
            "sz" => Market::Shenzhen,
            "bj" => Market::Beijing,
            _ => Market::Unknown,
        }
    }

    /// Infer the listing market from a bare instrument code.
    ///
    /// Codes starting with 6 or 5 (stocks and ETFs) trade in Shanghai,
    /// 0 in Shenzhen and 8 in Beijing.
    pub fn for_code(code: &str) -> Option<Self> {
        match code.chars().next()? {
            '6' | '5' => Some(Market::Shanghai),
            '0' => Some(Market::Shenzhen),
            '8' => Some(Market::Beijing),
            _ => None,
        }
    }

    /// Feed prefix for this market
    pub fn prefix(&self) -> Option<&'static str> {
        match self {
            Market::Shanghai => Some("sh"),
            Market::Shenzhen => Some("sz"),
            Market::Beijing => Some("bj"),
            Market::Unknown => None,
        }
    }

    /// Build the feed symbol (e.g. `sh518880`) for a bare code
    pub fn feed_symbol(code: &str) -> Option<String> {
        let code = code.trim();
        if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let prefix = Market::for_code(code)?.prefix()?;
        Some(format!("{}{}", prefix, code))
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Market::Shanghai => write!(f, "Shanghai"),
            Market::Shenzhen => write!(f, "Shenzhen"),
            Market::Beijing => write!(f, "Beijing"),
            Market::Unknown => write!(f, "Unknown"),
        }
    }
}

/// One price level of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    /// Resting size in shares (raw feed units)
    pub size: u64,
}

impl BookLevel {
    pub fn new(price: Decimal, size: u64) -> Self {
        Self { price, size }
    }

    /// Size in board lots, for display only
    pub fn size_lots(&self) -> u64 {
        self.size / SHARES_PER_LOT
    }
}

/// Parsed quote snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Bare instrument code (e.g. "518880")
    pub code: String,
    /// Display name as sent by the feed
    pub name: String,
    pub market: Market,
    /// Latest traded price
    pub price: Decimal,
    pub previous_close: Decimal,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    /// Best bid
    pub bid: Decimal,
    /// Best ask
    pub ask: Decimal,
    pub bids: [BookLevel; BOOK_DEPTH],
    pub asks: [BookLevel; BOOK_DEPTH],
    /// Cumulative volume in shares
    pub volume: u64,
    /// Cumulative turnover in currency units
    pub turnover: Decimal,
    pub trade_date: NaiveDate,
    pub trade_time: NaiveTime,
    /// Fractional digits the feed used for this quote's prices
    pub precision: u32,
}

impl Quote {
    /// Absolute change against the previous close, full precision
    pub fn change(&self) -> Decimal {
        self.price - self.previous_close
    }

    /// Percent change against the previous close, full precision
    pub fn change_percent_exact(&self) -> Decimal {
        if self.previous_close <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.change() / self.previous_close * Decimal::ONE_HUNDRED
    }

    /// Percent change rounded to 2 decimal places for display
    pub fn change_percent(&self) -> Decimal {
        round_display(self.change_percent_exact())
    }

    /// Absolute change rounded to 2 decimal places for display
    pub fn change_display(&self) -> Decimal {
        round_display(self.change())
    }

    /// Volume in board lots. Display only, never used for signals.
    pub fn volume_lots(&self) -> u64 {
        self.volume / SHARES_PER_LOT
    }

    /// Turnover in ten-thousand units. Display only.
    pub fn turnover_wan(&self) -> u64 {
        (self.turnover / Decimal::from(TURNOVER_UNIT))
            .trunc()
            .to_u64()
            .unwrap_or(0)
    }

    /// Exchange-local timestamp of the snapshot
    pub fn trade_datetime(&self) -> NaiveDateTime {
        self.trade_date.and_time(self.trade_time)
    }

    /// Spread between best ask and best bid
    pub fn spread(&self) -> Decimal {
        self.ask - self.bid
    }

    /// Format a price with this quote's precision
    pub fn format_price(&self, price: Decimal) -> String {
        format_price(price, self.precision)
    }
}

/// Round to 2 decimal places, half away from zero
pub fn round_display(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Format a price at a given number of fractional digits
pub fn format_price(price: Decimal, precision: u32) -> String {
    format!("{:.*}", precision as usize, price)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use rust_decimal_macros::dec;

    /// A plain Shanghai ETF quote for tests that only need sane values
    pub fn sample_quote(price: Decimal) -> Quote {
        let level = BookLevel::new(price, 10_000);
        Quote {
            code: "518880".to_string(),
            name: "Gold ETF".to_string(),
            market: Market::Shanghai,
            price,
            previous_close: dec!(9.00),
            open: dec!(9.00),
            high: price,
            low: price,
            bid: price,
            ask: price,
            bids: [level; BOOK_DEPTH],
            asks: [level; BOOK_DEPTH],
            volume: 123_456_789,
            turnover: dec!(25364038.000),
            trade_date: NaiveDate::from_ymd_opt(2023, 12, 28).unwrap(),
            trade_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            precision: 2,
        }
    }
}
