//! Quote archive port
//!
//! Append-only audit trail of processed ticks with read-back for when live
//! data is unavailable.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Quote, Signal};
use crate::strategy::TrendLabel;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Archive I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize archive entry: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One processed tick as written to the audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub observed_at: DateTime<Utc>,
    pub quote: Quote,
    pub trend: TrendLabel,
    pub slope: Decimal,
    pub signal: Signal,
}

#[cfg_attr(test, mockall::automock)]
pub trait QuoteArchive: Send + Sync {
    /// Append one entry
    fn record(&mut self, entry: &ArchiveEntry) -> Result<(), ArchiveError>;

    /// Most recent entry for an instrument code
    fn latest(&self, code: &str) -> Result<Option<ArchiveEntry>, ArchiveError>;

    /// Up to `limit` most recent entries for a code, oldest first
    fn history(&self, code: &str, limit: usize) -> Result<Vec<ArchiveEntry>, ArchiveError>;
}
