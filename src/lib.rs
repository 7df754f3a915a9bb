//! Quotewatch - Single-instrument quote monitor library
//!
//! Polls a fixed-format text quote feed, classifies the short-term trend by
//! least-squares slope, emits BUY/SELL/HOLD signals and tracks a lot-sized
//! paper portfolio.
//!
//! # Modules
//!
//! - `domain`: Quote, feed parser, signals, paper portfolio
//! - `ports`: Trait abstractions (QuoteFeed, QuoteArchive)
//! - `strategy`: Trend estimation and signal detection
//! - `adapters`: External implementations (Sina feed, JSONL archive, chart, lock, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Tick pipeline, trading sessions, monitor loop

pub mod domain;
pub mod ports;
pub mod strategy;
pub mod adapters;
pub mod config;
pub mod application;
