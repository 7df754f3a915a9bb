//! Configuration Loader
//!
//! Loads and validates configuration from TOML files. Every section has
//! defaults, so an empty file (or no file at all) yields a runnable config.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::adapters::archive::DEFAULT_ARCHIVE_PATH;
use crate::adapters::chart::{DEFAULT_CHART_HEIGHT, DEFAULT_CHART_WIDTH};
use crate::adapters::lock::DEFAULT_LOCK_PATH;
use crate::adapters::sina::DEFAULT_FEED_URL;
use crate::domain::{Market, DEFAULT_LOT_SIZE};
use crate::strategy::StrategyConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/quotewatch.toml";

/// Main configuration structure matching quotewatch.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub feed: FeedSection,
    pub strategy: StrategySection,
    pub portfolio: PortfolioSection,
    pub monitor: MonitorSection,
    pub archive: ArchiveSection,
    pub logging: LoggingSection,
    pub lock: LockSection,
}

/// Quote feed section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedSection {
    /// Six-digit instrument code (e.g. 518880)
    pub symbol: String,
    /// Feed base endpoint
    pub url: String,
    /// HTTP timeout per request
    pub timeout_secs: u64,
}

impl Default for FeedSection {
    fn default() -> Self {
        Self {
            symbol: "518880".to_string(),
            url: DEFAULT_FEED_URL.to_string(),
            timeout_secs: 10,
        }
    }
}

impl FeedSection {
    /// Get symbol with environment variable override
    /// Checks QUOTEWATCH_SYMBOL env var first, falls back to config value
    pub fn get_symbol(&self) -> String {
        std::env::var("QUOTEWATCH_SYMBOL").unwrap_or_else(|_| self.symbol.clone())
    }

    /// Get feed URL with environment variable override
    pub fn get_url(&self) -> String {
        std::env::var("QUOTEWATCH_FEED_URL").unwrap_or_else(|_| self.url.clone())
    }
}

/// Trend/signal section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategySection {
    /// Sliding regression window (ticks)
    pub window_size: usize,
    /// Slope magnitude (price per second) separating UP/DOWN from FLAT
    pub slope_threshold: Decimal,
    /// Minimum price increment
    pub min_price_unit: Decimal,
    /// Drawdown from peak, in price units, that exits a downtrend
    pub drawdown_steps: u32,
}

impl Default for StrategySection {
    fn default() -> Self {
        let defaults = StrategyConfig::default();
        Self {
            window_size: defaults.window_size,
            slope_threshold: defaults.slope_threshold,
            min_price_unit: defaults.min_price_unit,
            drawdown_steps: defaults.drawdown_steps,
        }
    }
}

/// Paper portfolio section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PortfolioSection {
    pub initial_funds: Decimal,
    pub lot_size: u64,
    /// Place a BUY on the first tick of every round
    pub initial_buy: bool,
}

impl Default for PortfolioSection {
    fn default() -> Self {
        Self {
            initial_funds: dec!(10000),
            lot_size: DEFAULT_LOT_SIZE,
            initial_buy: false,
        }
    }
}

/// Polling loop section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MonitorSection {
    pub tick_interval_secs: u64,
    /// Only poll during exchange trading sessions
    pub trading_hours_only: bool,
    /// Stop after this many processed ticks
    pub max_ticks: Option<u64>,
    pub chart_width: usize,
    pub chart_height: usize,
}

impl Default for MonitorSection {
    fn default() -> Self {
        Self {
            tick_interval_secs: 5,
            trading_hours_only: true,
            max_ticks: None,
            chart_width: DEFAULT_CHART_WIDTH,
            chart_height: DEFAULT_CHART_HEIGHT,
        }
    }
}

/// Audit trail section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArchiveSection {
    pub enabled: bool,
    pub path: String,
}

impl Default for ArchiveSection {
    fn default() -> Self {
        Self {
            enabled: true,
            path: DEFAULT_ARCHIVE_PATH.to_string(),
        }
    }
}

impl ArchiveSection {
    /// Archive path with `~` expanded
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Instance lock section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LockSection {
    pub path: String,
}

impl Default for LockSection {
    fn default() -> Self {
        Self {
            path: DEFAULT_LOCK_PATH.to_string(),
        }
    }
}

impl LockSection {
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Read a TOML file and apply env overrides without validating.
///
/// Callers that layer command-line values on top validate afterwards.
pub fn read_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&content)?;
    config.apply_env();
    Ok(config)
}

/// Like `read_config`, but a missing file yields the defaults
pub fn read_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    if path.exists() {
        return read_config(path);
    }
    tracing::debug!("No config at {}, using defaults", path.display());
    let mut config = Config::default();
    config.apply_env();
    Ok(config)
}

/// Load configuration from a TOML file, applying env overrides
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let config = read_config(path)?;
    config.validate()?;
    Ok(config)
}

/// Like `load_config`, but a missing file yields the defaults
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let config = read_config_or_default(path)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Fold QUOTEWATCH_* environment overrides into the file values
    pub fn apply_env(&mut self) {
        self.feed.symbol = self.feed.get_symbol();
        self.feed.url = self.feed.get_url();
    }

    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        StrategyConfig::from(self)
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        let symbol = self.feed.symbol.trim();
        if symbol.is_empty() {
            return Err(ConfigError::ValidationError(
                "feed symbol cannot be empty".to_string(),
            ));
        }
        if Market::feed_symbol(symbol).is_none() {
            return Err(ConfigError::ValidationError(format!(
                "feed symbol {} does not map to a known market",
                symbol
            )));
        }

        if self.feed.url.is_empty() {
            return Err(ConfigError::ValidationError(
                "feed url cannot be empty".to_string(),
            ));
        }

        if self.portfolio.initial_funds <= Decimal::ZERO {
            return Err(ConfigError::ValidationError(format!(
                "initial_funds must be > 0, got {}",
                self.portfolio.initial_funds
            )));
        }

        if self.portfolio.lot_size == 0 {
            return Err(ConfigError::ValidationError(
                "lot_size must be > 0".to_string(),
            ));
        }

        if self.monitor.tick_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "tick_interval_secs must be > 0".to_string(),
            ));
        }

        if self.monitor.max_ticks == Some(0) {
            return Err(ConfigError::ValidationError(
                "max_ticks must be > 0 when set".to_string(),
            ));
        }

        Ok(())
    }
}

// Conversion from Config to StrategyConfig
impl From<&Config> for StrategyConfig {
    fn from(config: &Config) -> Self {
        StrategyConfig {
            window_size: config.strategy.window_size,
            slope_threshold: config.strategy.slope_threshold,
            min_price_unit: config.strategy.min_price_unit,
            drawdown_steps: config.strategy.drawdown_steps,
        }
    }
}
