//! Trading sessions and monitoring rounds
//!
//! The exchange trades weekdays 09:30-11:30 and 13:00-15:00 China Standard
//! Time. A monitoring round is the span between entering and leaving those
//! hours (or a shutdown); each round gets a fresh simulation.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDateTime, Timelike, Utc, Weekday};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::quote::format_price;
use crate::domain::SignalCounts;

/// UTC+8, no daylight saving
pub const EXCHANGE_UTC_OFFSET_HOURS: i64 = 8;

const fn hms(h: u32, m: u32) -> u32 {
    h * 3600 + m * 60
}

/// Continuous trading sessions as inclusive seconds-from-midnight ranges
const SESSIONS: [(u32, u32); 2] = [(hms(9, 30), hms(11, 30)), (hms(13, 0), hms(15, 0))];

#[derive(Debug, Clone, Copy, Default)]
pub struct TradingCalendar;

impl TradingCalendar {
    pub fn new() -> Self {
        Self
    }

    /// Exchange-local wall clock for a UTC instant
    pub fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        now.naive_utc() + Duration::hours(EXCHANGE_UTC_OFFSET_HOURS)
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        let local = self.local_time(now);
        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        let secs = local.time().num_seconds_from_midnight();
        SESSIONS.iter().any(|&(open, close)| secs >= open && secs <= close)
    }
}

/// Why a round finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoundEnd {
    Shutdown,
    MarketClosed,
    TickLimit,
    ReplayFinished,
}

impl fmt::Display for RoundEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RoundEnd::Shutdown => "shutdown",
            RoundEnd::MarketClosed => "market closed",
            RoundEnd::TickLimit => "tick limit reached",
            RoundEnd::ReplayFinished => "replay finished",
        };
        write!(f, "{}", text)
    }
}

/// Final accounting for one monitoring round
#[derive(Debug, Clone, Serialize)]
pub struct RoundSummary {
    pub round: u32,
    pub code: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub end_reason: RoundEnd,
    pub ticks: u64,
    pub initial_funds: Decimal,
    pub cash: Decimal,
    pub shares_held: u64,
    pub last_price: Option<Decimal>,
    pub position_value: Decimal,
    pub total_assets: Decimal,
    pub return_pct: Decimal,
    pub trade_count: u32,
    pub signals: SignalCounts,
    pub prices: Vec<Decimal>,
    pub precision: u32,
}

impl RoundSummary {
    pub fn duration(&self) -> Duration {
        self.ended_at - self.started_at
    }
}

impl fmt::Display for RoundSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let price = |p: Decimal| format_price(p, self.precision);
        writeln!(f, "Round {} summary ({}) - {}", self.round, self.code, self.end_reason)?;
        writeln!(
            f,
            "  Period:         {} -> {} ({})",
            self.started_at.format("%Y-%m-%d %H:%M:%S"),
            self.ended_at.format("%Y-%m-%d %H:%M:%S"),
            format_duration(self.duration())
        )?;
        writeln!(f, "  Ticks:          {}", self.ticks)?;
        writeln!(f, "  Initial funds:  {:.2}", self.initial_funds)?;
        writeln!(f, "  Cash:           {:.2}", self.cash)?;
        match self.last_price {
            Some(last) => writeln!(
                f,
                "  Position:       {} shares @ {} = {:.2}",
                self.shares_held,
                price(last),
                self.position_value
            )?,
            None => writeln!(f, "  Position:       {} shares", self.shares_held)?,
        }
        writeln!(f, "  Total assets:   {:.2}", self.total_assets)?;
        writeln!(f, "  Return:         {:.2}%", self.return_pct)?;
        writeln!(f, "  Trades:         {}", self.trade_count)?;
        write!(
            f,
            "  Signals:        BUY {} / SELL {} / HOLD {}",
            self.signals.buy, self.signals.sell, self.signals.hold
        )
    }
}

/// `1h 02m 03s`, dropping leading zero units
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
