//! Ports Layer - Trait definitions for external collaborators
//!
//! - `QuoteFeed`: raw quote text source (network)
//! - `QuoteArchive`: audit trail of processed ticks with read-back
//! - `mocks`: scripted/in-memory implementations for tests and offline runs

pub mod feed;
pub mod archive;
pub mod mocks;

pub use feed::{FeedError, QuoteFeed};
pub use archive::{ArchiveEntry, ArchiveError, QuoteArchive};
pub use mocks::{MemoryArchive, ScriptedFeed};
