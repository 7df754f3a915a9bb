//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits and the
//! terminal-facing pieces:
//! - Sina: HTTP quote feed client
//! - Archive: append-only JSON-lines audit trail
//! - Chart: ASCII price chart
//! - Lock: single-instance PID lock file
//! - CLI: Command-line interface definitions

pub mod sina;
pub mod archive;
pub mod chart;
pub mod lock;
pub mod cli;

pub use sina::SinaFeedClient;
pub use archive::JsonlArchive;
pub use chart::ChartRenderer;
pub use lock::{InstanceLock, LockError};
pub use cli::CliApp;
