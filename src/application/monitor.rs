//! Monitor Loop
//!
//! Polls the quote feed on a fixed interval, runs every quote through the
//! tick pipeline, appends the result to the archive and splits the run into
//! rounds at trading-hours boundaries.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Notify, RwLock};

use crate::config::Config;
use crate::domain::{FeedFormatError, FeedParser, Market};
use crate::ports::{ArchiveEntry, ArchiveError, FeedError, QuoteArchive, QuoteFeed};

use super::pipeline::{TickPipeline, TickReport};
use super::session::{RoundEnd, RoundSummary, TradingCalendar};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Feed error: {0}")]
    Feed(#[from] FeedError),
    #[error("Malformed feed record: {0}")]
    Format(#[from] FeedFormatError),
    #[error("Invalid instrument code: {0}")]
    InvalidSymbol(String),
}

/// Static settings for one monitored instrument
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Bare instrument code, e.g. `518880`
    pub code: String,
    /// Feed symbol with market prefix, e.g. `sh518880`
    pub feed_symbol: String,
    pub tick_interval: Duration,
    pub trading_hours_only: bool,
    pub max_ticks: Option<u64>,
}

impl MonitorSettings {
    pub fn new(code: &str, tick_interval: Duration) -> Result<Self, MonitorError> {
        let code = code.trim();
        let feed_symbol = Market::feed_symbol(code)
            .ok_or_else(|| MonitorError::InvalidSymbol(code.to_string()))?;
        Ok(Self {
            code: code.to_string(),
            feed_symbol,
            tick_interval,
            trading_hours_only: false,
            max_ticks: None,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, MonitorError> {
        let mut settings = Self::new(
            &config.feed.symbol,
            Duration::from_secs(config.monitor.tick_interval_secs),
        )?;
        settings.trading_hours_only = config.monitor.trading_hours_only;
        settings.max_ticks = config.monitor.max_ticks;
        Ok(settings)
    }

    pub fn with_trading_hours_only(mut self, enabled: bool) -> Self {
        self.trading_hours_only = enabled;
        self
    }

    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = max_ticks;
        self
    }
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickStatus {
    Processed(Box<TickReport>),
    /// Outside trading hours; nothing fetched
    MarketClosed,
}

#[derive(Debug, Clone, Copy)]
struct ActiveRound {
    number: u32,
    started_at: DateTime<Utc>,
}

type SharedArchive = Arc<Mutex<Box<dyn QuoteArchive>>>;

struct MonitorState {
    pipeline: TickPipeline,
    round: Option<ActiveRound>,
    rounds_started: u32,
    total_ticks: u64,
    completed: Vec<RoundSummary>,
}

/// Snapshot of the loop for status output
#[derive(Debug, Clone)]
pub struct MonitorStatus {
    pub is_running: bool,
    pub round: Option<u32>,
    pub total_ticks: u64,
    pub completed_rounds: usize,
}

pub struct MonitorLoop {
    settings: MonitorSettings,
    calendar: TradingCalendar,
    feed: Arc<dyn QuoteFeed>,
    archive: Option<SharedArchive>,
    state: Arc<RwLock<MonitorState>>,
    is_running: Arc<RwLock<bool>>,
    wake: Arc<Notify>,
}

impl MonitorLoop {
    pub fn new(
        settings: MonitorSettings,
        pipeline: TickPipeline,
        feed: Arc<dyn QuoteFeed>,
        archive: Option<Box<dyn QuoteArchive>>,
    ) -> Self {
        Self {
            settings,
            calendar: TradingCalendar::new(),
            feed,
            archive: archive.map(|archive| Arc::new(Mutex::new(archive))),
            state: Arc::new(RwLock::new(MonitorState {
                pipeline,
                round: None,
                rounds_started: 0,
                total_ticks: 0,
                completed: Vec::new(),
            })),
            is_running: Arc::new(RwLock::new(false)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn from_config(
        config: &Config,
        feed: Arc<dyn QuoteFeed>,
        archive: Option<Box<dyn QuoteArchive>>,
    ) -> Result<Self, MonitorError> {
        let settings = MonitorSettings::from_config(config)?;
        Ok(Self::new(settings, TickPipeline::from_config(config), feed, archive))
    }

    /// Poll until stopped or the tick limit is reached; returns every
    /// completed round
    pub async fn run(&self) -> Result<Vec<RoundSummary>, MonitorError> {
        self.run_with(|report| tracing::info!("{}", report.status_line()))
            .await
    }

    /// Like `run`, handing each processed tick to `on_tick`
    pub async fn run_with<F>(&self, mut on_tick: F) -> Result<Vec<RoundSummary>, MonitorError>
    where
        F: FnMut(&TickReport) + Send,
    {
        *self.is_running.write().await = true;

        tracing::info!(
            "Starting monitor - {} ({}), interval {:?}, trading hours only: {}",
            self.settings.code,
            self.settings.feed_symbol,
            self.settings.tick_interval,
            self.settings.trading_hours_only
        );

        while *self.is_running.read().await {
            match self.tick_at(Utc::now()).await {
                Ok(TickStatus::Processed(report)) => on_tick(&report),
                Ok(TickStatus::MarketClosed) => {
                    tracing::debug!("Outside trading hours, skipping fetch")
                }
                Err(e) => tracing::warn!("Tick skipped: {}", e),
            }

            if !*self.is_running.read().await {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.settings.tick_interval) => {}
                _ = self.wake.notified() => {}
            }
        }

        self.end_round(Utc::now(), RoundEnd::Shutdown).await;
        tracing::info!("Monitor stopped");

        let mut state = self.state.write().await;
        Ok(std::mem::take(&mut state.completed))
    }

    /// Execute one polling cycle as of `now`
    pub async fn tick_at(&self, now: DateTime<Utc>) -> Result<TickStatus, MonitorError> {
        if self.settings.trading_hours_only && !self.calendar.is_open(now) {
            self.end_round(now, RoundEnd::MarketClosed).await;
            return Ok(TickStatus::MarketClosed);
        }

        // Fetch before taking the state lock so stop/status never wait on I/O
        let raw = match self.feed.fetch_raw(&self.settings.feed_symbol).await {
            Ok(raw) => raw,
            Err(e) => {
                self.log_last_archived().await;
                return Err(e.into());
            }
        };
        let quote = FeedParser::parse_first(&raw)?;
        if quote.code != self.settings.code {
            tracing::warn!(
                "Feed returned code {} while monitoring {}",
                quote.code,
                self.settings.code
            );
        }

        self.start_round(now).await;

        let report = {
            let mut state = self.state.write().await;
            state.total_ticks += 1;
            state.pipeline.process(&quote, now)
        };

        let entry = report.archive_entry();
        if let Some(Err(e)) = self.with_archive(move |archive| archive.record(&entry)).await {
            tracing::warn!("Failed to archive tick: {}", e);
        }

        if report.signal.is_trade() {
            tracing::info!(
                "{} signal at {} ({})",
                report.signal,
                report.quote.format_price(report.quote.price),
                report.trend
            );
        }

        if let Some(max) = self.settings.max_ticks {
            if self.state.read().await.total_ticks >= max {
                tracing::info!("Tick limit {} reached", max);
                self.end_round(now, RoundEnd::TickLimit).await;
                *self.is_running.write().await = false;
            }
        }

        Ok(TickStatus::Processed(Box::new(report)))
    }

    /// Begin a round unless one is already active; resets the pipeline
    pub async fn start_round(&self, now: DateTime<Utc>) -> bool {
        let mut state = self.state.write().await;
        if state.round.is_some() {
            return false;
        }
        state.rounds_started += 1;
        let number = state.rounds_started;
        state.pipeline.reset();
        state.round = Some(ActiveRound { number, started_at: now });
        tracing::info!("Round {} started", number);
        true
    }

    /// Close the active round, if any, and record its summary
    pub async fn end_round(&self, now: DateTime<Utc>, reason: RoundEnd) -> Option<RoundSummary> {
        let mut state = self.state.write().await;
        let round = state.round.take()?;
        let summary = state.pipeline.summary(
            round.number,
            &self.settings.code,
            round.started_at,
            now,
            reason,
        );
        tracing::info!(
            "Round {} ended ({}): {} ticks, {} trades, return {:.2}%",
            round.number,
            reason,
            summary.ticks,
            summary.trade_count,
            summary.return_pct
        );
        state.completed.push(summary.clone());
        Some(summary)
    }

    /// Stop the loop; wakes it if sleeping
    pub async fn stop(&self) {
        *self.is_running.write().await = false;
        self.wake.notify_one();
        tracing::info!("Stop signal sent to monitor");
    }

    pub async fn status(&self) -> MonitorStatus {
        let state = self.state.read().await;
        MonitorStatus {
            is_running: *self.is_running.read().await,
            round: state.round.map(|r| r.number),
            total_ticks: state.total_ticks,
            completed_rounds: state.completed.len(),
        }
    }

    /// Rounds finished so far, without draining them
    pub async fn completed_rounds(&self) -> Vec<RoundSummary> {
        self.state.read().await.completed.clone()
    }

    /// Most recent archived tick for the monitored code
    pub async fn last_archived(&self) -> Option<ArchiveEntry> {
        let code = self.settings.code.clone();
        match self.with_archive(move |archive| archive.latest(&code)).await? {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Failed to read archive: {}", e);
                None
            }
        }
    }

    /// Run archive I/O on the blocking pool. `None` without an archive.
    async fn with_archive<T, F>(&self, op: F) -> Option<Result<T, ArchiveError>>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn QuoteArchive) -> Result<T, ArchiveError> + Send + 'static,
    {
        let archive = Arc::clone(self.archive.as_ref()?);
        let joined = tokio::task::spawn_blocking(move || {
            let mut guard = archive.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            op(&mut **guard)
        })
        .await;

        match joined {
            Ok(result) => Some(result),
            Err(e) => {
                tracing::warn!("Archive task failed: {}", e);
                None
            }
        }
    }

    async fn log_last_archived(&self) {
        if let Some(entry) = self.last_archived().await {
            tracing::warn!(
                "Live quote unavailable; last archived {} at {} ({})",
                entry.quote.format_price(entry.quote.price),
                entry.observed_at.format("%Y-%m-%d %H:%M:%S"),
                entry.signal
            );
        }
    }

    pub fn settings(&self) -> &MonitorSettings {
        &self.settings
    }
}

// Clone shares state so a signal handler can stop the running loop
impl Clone for MonitorLoop {
    fn clone(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            calendar: self.calendar,
            feed: Arc::clone(&self.feed),
            archive: self.archive.clone(),
            state: Arc::clone(&self.state),
            is_running: Arc::clone(&self.is_running),
            wake: Arc::clone(&self.wake),
        }
    }
}
