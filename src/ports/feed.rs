use async_trait::async_trait;
use thiserror::Error;

/// Quote feed transport error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeedError {
    #[error("Feed request failed: {0}")]
    Transport(String),

    #[error("Feed returned HTTP status {0}")]
    Status(u16),

    #[error("Feed returned an empty body for {0}")]
    Empty(String),

    #[error("Invalid instrument code: {0}")]
    InvalidSymbol(String),
}

/// Source of raw quote records.
///
/// Returns the raw response text for a feed symbol (e.g. `sh518880`);
/// parsing is the caller's job.
#[async_trait]
pub trait QuoteFeed: Send + Sync {
    async fn fetch_raw(&self, symbol: &str) -> Result<String, FeedError>;
}
