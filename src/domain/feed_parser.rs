//! Feed Parser
//!
//! Turns one raw record of the text quote feed into a `Quote`.
//!
//! Record shape:
//! `var hq_str_sh518880="name,open,prev_close,price,high,low,bid,ask,volume,turnover,
//!  b1_size,b1_price,...,b5_price,a1_size,a1_price,...,a5_price,YYYY-MM-DD,HH:MM:SS,...";`

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;
use thiserror::Error;

use super::quote::{BookLevel, Market, Quote, BOOK_DEPTH, DEFAULT_PRECISION, MAX_PRECISION};

/// Minimum number of comma-separated fields in a record
pub const MIN_FIELDS: usize = 32;

const NAME: usize = 0;
const OPEN: usize = 1;
const PREVIOUS_CLOSE: usize = 2;
const PRICE: usize = 3;
const HIGH: usize = 4;
const LOW: usize = 5;
const BID: usize = 6;
const ASK: usize = 7;
const VOLUME: usize = 8;
const TURNOVER: usize = 9;
const BIDS_START: usize = 10;
const ASKS_START: usize = 20;
const DATE: usize = 30;
const TIME: usize = 31;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeedFormatError {
    #[error("Record has no '=' separator")]
    MissingSeparator,

    #[error("Record has no '_'-delimited market/code prefix: {0:?}")]
    MissingCodePrefix(String),

    #[error("Record has {found} fields, need at least {required}")]
    TooFewFields { found: usize, required: usize },

    #[error("Field {index} ({name}) is invalid: {value:?}")]
    InvalidField {
        index: usize,
        name: &'static str,
        value: String,
    },

    #[error("Previous close must be positive, got {0}")]
    NonPositivePreviousClose(Decimal),

    #[error("Invalid instrument code: {0:?}")]
    InvalidInstrumentCode(String),
}

/// Parser for the fixed-format quote feed
pub struct FeedParser;

impl FeedParser {
    /// Parse one raw feed record into a `Quote`
    pub fn parse(record: &str) -> Result<Quote, FeedFormatError> {
        let (code_part, data_part) = record
            .trim()
            .split_once('=')
            .ok_or(FeedFormatError::MissingSeparator)?;

        let (market, code) = split_code(code_part)?;

        let data = data_part
            .trim()
            .trim_end_matches(';')
            .trim()
            .trim_matches('"');
        let fields: Vec<&str> = data.split(',').map(str::trim).collect();

        if fields.len() < MIN_FIELDS {
            return Err(FeedFormatError::TooFewFields {
                found: fields.len(),
                required: MIN_FIELDS,
            });
        }

        let precision = infer_precision(fields[PRICE], fields[PREVIOUS_CLOSE]);

        let previous_close = decimal_field(&fields, PREVIOUS_CLOSE, "previous_close")?;
        if previous_close <= Decimal::ZERO {
            return Err(FeedFormatError::NonPositivePreviousClose(previous_close));
        }

        let quote = Quote {
            code,
            name: fields[NAME].to_string(),
            market,
            price: decimal_field(&fields, PRICE, "price")?,
            previous_close,
            open: decimal_field(&fields, OPEN, "open")?,
            high: decimal_field(&fields, HIGH, "high")?,
            low: decimal_field(&fields, LOW, "low")?,
            bid: decimal_field(&fields, BID, "bid")?,
            ask: decimal_field(&fields, ASK, "ask")?,
            bids: book_side(&fields, BIDS_START)?,
            asks: book_side(&fields, ASKS_START)?,
            volume: count_field(&fields, VOLUME, "volume")?,
            turnover: decimal_field(&fields, TURNOVER, "turnover")?,
            trade_date: NaiveDate::parse_from_str(fields[DATE], "%Y-%m-%d")
                .map_err(|_| invalid(&fields, DATE, "date"))?,
            trade_time: NaiveTime::parse_from_str(fields[TIME], "%H:%M:%S")
                .map_err(|_| invalid(&fields, TIME, "time"))?,
            precision,
        };

        tracing::trace!(
            code = %quote.code,
            price = %quote.price,
            precision = quote.precision,
            "Parsed feed record"
        );

        Ok(quote)
    }

    /// Parse the first non-empty line of a multi-line feed response
    pub fn parse_first(response: &str) -> Result<Quote, FeedFormatError> {
        let line = response
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("");
        Self::parse(line)
    }
}

/// Fractional digit count of the current price, else the previous close,
/// else `DEFAULT_PRECISION`.
pub fn infer_precision(price: &str, previous_close: &str) -> u32 {
    fractional_digits(price)
        .or_else(|| fractional_digits(previous_close))
        .unwrap_or(DEFAULT_PRECISION)
        .min(MAX_PRECISION)
}

fn fractional_digits(field: &str) -> Option<u32> {
    let (_, frac) = field.trim().split_once('.')?;
    let digits = frac.chars().take_while(|c| c.is_ascii_digit()).count();
    (digits > 0).then_some(digits as u32)
}

/// Split `var hq_str_sh518880` into the market and the bare code
fn split_code(code_part: &str) -> Result<(Market, String), FeedFormatError> {
    let code_part = code_part.trim();
    let (_, full_code) = code_part
        .rsplit_once('_')
        .ok_or_else(|| FeedFormatError::MissingCodePrefix(code_part.to_string()))?;

    let full_code = full_code.trim();
    if full_code.len() <= 2 || !full_code.is_char_boundary(2) {
        return Err(FeedFormatError::MissingCodePrefix(code_part.to_string()));
    }

    let (prefix, code) = full_code.split_at(2);
    Ok((Market::from_prefix(prefix), code.to_string()))
}

fn book_side(fields: &[&str], start: usize) -> Result<[BookLevel; BOOK_DEPTH], FeedFormatError> {
    let mut levels = [BookLevel::new(Decimal::ZERO, 0); BOOK_DEPTH];
    for (level, slot) in levels.iter_mut().enumerate() {
        let size_idx = start + level * 2;
        *slot = BookLevel::new(
            decimal_field(fields, size_idx + 1, "book_price")?,
            count_field(fields, size_idx, "book_size")?,
        );
    }
    Ok(levels)
}

fn decimal_field(
    fields: &[&str],
    index: usize,
    name: &'static str,
) -> Result<Decimal, FeedFormatError> {
    Decimal::from_str(fields[index]).map_err(|_| invalid(fields, index, name))
}

/// Integer counts sometimes arrive with a fractional suffix ("1200.000")
fn count_field(fields: &[&str], index: usize, name: &'static str) -> Result<u64, FeedFormatError> {
    let raw = fields[index];
    raw.parse::<u64>()
        .ok()
        .or_else(|| Decimal::from_str(raw).ok().and_then(|d| d.trunc().to_u64()))
        .ok_or_else(|| invalid(fields, index, name))
}

fn invalid(fields: &[&str], index: usize, name: &'static str) -> FeedFormatError {
    FeedFormatError::InvalidField {
        index,
        name,
        value: fields[index].to_string(),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Build a feed record with the given price fields and well-formed filler
    pub fn record(symbol: &str, previous_close: &str, price: &str) -> String {
        format!(
            "var hq_str_{}=\"Gold ETF,{p},{pc},{p},{p},{p},{p},{p},123456789,25364038.000,\
             12345,{p},67890,{p},54321,{p},210987,{p},198765,{p},\
             98765,{p},87654,{p},76543,{p},65432,{p},54321,{p},\
             2023-12-28,15:00:00,00\";",
            symbol,
            p = price,
            pc = previous_close,
        )
    }
}
