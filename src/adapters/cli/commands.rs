//! CLI Command Definitions
//!
//! Argument structs for every quotewatch command. Handlers live in the
//! binary.

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};

use crate::config::{read_config_or_default, Config, ConfigError, DEFAULT_CONFIG_PATH};

/// Quotewatch - single-instrument quote monitor with paper trading
#[derive(Parser, Debug)]
#[command(
    name = "quotewatch",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Single-instrument quote monitor with slope trend signals",
    long_about = "Quotewatch polls a real-time quote feed, classifies the short-term trend \
                  with a sliding least-squares slope, emits BUY/SELL/HOLD signals and tracks \
                  a lot-sized paper portfolio. No real orders are ever placed."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the monitoring loop
    Run(RunCmd),

    /// Fetch and print a single quote
    Quote(QuoteCmd),

    /// Replay an archive through a fresh strategy and portfolio
    Replay(ReplayCmd),

    /// Print the effective strategy parameters and rules
    Explain(ExplainCmd),
}

/// Per-run overrides of file/env configuration
#[derive(Args, Debug, Clone, Default)]
pub struct ParamOverrides {
    /// Instrument code (e.g. 518880)
    #[arg(short, long, value_name = "CODE")]
    pub symbol: Option<String>,

    /// Trend window size (ticks)
    #[arg(long, value_name = "N")]
    pub window: Option<usize>,

    /// Slope threshold (price per second)
    #[arg(long, value_name = "SLOPE")]
    pub slope_threshold: Option<Decimal>,

    /// Minimum price unit
    #[arg(long, value_name = "UNIT")]
    pub min_price_unit: Option<Decimal>,

    /// Drawdown steps (in price units) that exit a downtrend
    #[arg(long, value_name = "STEPS")]
    pub drawdown_steps: Option<u32>,

    /// Initial paper funds
    #[arg(long, value_name = "AMOUNT")]
    pub funds: Option<Decimal>,

    /// Shares per lot
    #[arg(long, value_name = "SHARES")]
    pub lot_size: Option<u64>,

    /// BUY on the first tick of each round
    #[arg(long)]
    pub initial_buy: bool,
}

impl ParamOverrides {
    /// Fold command-line values over the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(ref symbol) = self.symbol {
            config.feed.symbol = symbol.clone();
        }
        if let Some(window) = self.window {
            config.strategy.window_size = window;
        }
        if let Some(threshold) = self.slope_threshold {
            config.strategy.slope_threshold = threshold;
        }
        if let Some(unit) = self.min_price_unit {
            config.strategy.min_price_unit = unit;
        }
        if let Some(steps) = self.drawdown_steps {
            config.strategy.drawdown_steps = steps;
        }
        if let Some(funds) = self.funds {
            config.portfolio.initial_funds = funds;
        }
        if let Some(lot_size) = self.lot_size {
            config.portfolio.lot_size = lot_size;
        }
        if self.initial_buy {
            config.portfolio.initial_buy = true;
        }
    }

    /// Config file (or defaults) plus env, then these overrides, validated last
    pub fn load(&self, path: &Path) -> Result<Config, ConfigError> {
        let mut config = read_config_or_default(path)?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}

/// Start monitoring
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(flatten)]
    pub params: ParamOverrides,

    /// Seconds between polls
    #[arg(short, long, value_name = "SECS")]
    pub interval: Option<u64>,

    /// Stop after this many ticks
    #[arg(long, value_name = "N")]
    pub max_ticks: Option<u64>,

    /// Poll outside exchange trading hours too
    #[arg(long)]
    pub ignore_hours: bool,

    /// Do not write the audit archive
    #[arg(long)]
    pub no_archive: bool,
}

impl RunCmd {
    pub fn apply(&self, config: &mut Config) {
        self.params.apply(config);
        if let Some(interval) = self.interval {
            config.monitor.tick_interval_secs = interval;
        }
        if self.max_ticks.is_some() {
            config.monitor.max_ticks = self.max_ticks;
        }
        if self.ignore_hours {
            config.monitor.trading_hours_only = false;
        }
        if self.no_archive {
            config.archive.enabled = false;
        }
    }

    /// Effective run configuration: file, env, then every run flag
    pub fn load(&self) -> Result<Config, ConfigError> {
        let mut config = read_config_or_default(&self.config)?;
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }
}

/// Fetch a single quote
#[derive(Parser, Debug)]
pub struct QuoteCmd {
    /// Instrument code (e.g. 518880); defaults to the configured symbol
    #[arg(value_name = "CODE")]
    pub code: Option<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Read the latest archived quote instead of the live feed
    #[arg(long)]
    pub offline: bool,

    /// Print the quote as JSON
    #[arg(long)]
    pub json: bool,
}

/// Replay an archive
#[derive(Parser, Debug)]
pub struct ReplayCmd {
    /// Archive file (JSON lines); defaults to the configured archive
    #[arg(value_name = "ARCHIVE")]
    pub archive: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(flatten)]
    pub params: ParamOverrides,

    /// Print every replayed tick
    #[arg(long)]
    pub ticks: bool,

    /// Skip the price chart
    #[arg(long)]
    pub no_chart: bool,
}

/// Explain the strategy
#[derive(Parser, Debug)]
pub struct ExplainCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(flatten)]
    pub params: ParamOverrides,
}

/// Initialize logging system
///
/// Flags win, then `RUST_LOG`, then the configured level.
pub fn init_logging(verbose: bool, debug: bool, configured: &str) -> anyhow::Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}
