//! Sina Finance quote feed
//!
//! Plain-text `var hq_str_<symbol>="...";` records served over HTTP in
//! GB18030.

pub mod client;

pub use client::{SinaFeedClient, DEFAULT_FEED_URL};
