//! Quotewatch - single-instrument quote monitor
//!
//! Polls a real-time quote feed and paper-trades a slope trend strategy.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;

use quotewatch::adapters::cli::{
    init_logging, CliApp, Command, ExplainCmd, ParamOverrides, QuoteCmd, ReplayCmd,
};
use quotewatch::adapters::{ChartRenderer, InstanceLock, JsonlArchive, SinaFeedClient};
use quotewatch::application::{MonitorLoop, RoundEnd, TickPipeline};
use quotewatch::config::{Config, ConfigError};
use quotewatch::domain::quote::format_price;
use quotewatch::domain::{FeedParser, Quote};
use quotewatch::ports::QuoteArchive;
use quotewatch::strategy::{StrategyConfig, SHARP_MOVE_STEPS};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let app = CliApp::parse();

    match app.command {
        Command::Run(cmd) => {
            let config = config_context(cmd.load(), &cmd.config)?;
            init_logging(app.verbose, app.debug, &config.logging.level)?;
            run_command(config).await
        }
        Command::Quote(cmd) => {
            let config = config_context(ParamOverrides::default().load(&cmd.config), &cmd.config)?;
            init_logging(app.verbose, app.debug, &config.logging.level)?;
            quote_command(cmd, config).await
        }
        Command::Replay(cmd) => {
            let config = config_context(cmd.params.load(&cmd.config), &cmd.config)?;
            init_logging(app.verbose, app.debug, &config.logging.level)?;
            replay_command(cmd, config)
        }
        Command::Explain(cmd) => {
            let config = config_context(cmd.params.load(&cmd.config), &cmd.config)?;
            init_logging(app.verbose, app.debug, &config.logging.level)?;
            explain_command(cmd, config)
        }
    }
}

fn config_context(config: Result<Config, ConfigError>, path: &Path) -> Result<Config> {
    config.with_context(|| format!("Failed to load configuration from {}", path.display()))
}

fn archive_for(config: &Config) -> JsonlArchive {
    JsonlArchive::new(config.archive.resolved_path())
}

async fn run_command(config: Config) -> Result<()> {
    tracing::info!("Starting quotewatch monitor...");

    let _lock = InstanceLock::acquire(config.lock.resolved_path())
        .context("Failed to acquire instance lock")?;

    let feed = SinaFeedClient::new(
        config.feed.url.clone(),
        Duration::from_secs(config.feed.timeout_secs),
    )
    .context("Failed to create feed client")?;

    let archive: Option<Box<dyn QuoteArchive>> = if config.archive.enabled {
        let archive = archive_for(&config);
        tracing::info!("Archiving ticks to {}", archive.path().display());
        Some(Box::new(archive))
    } else {
        None
    };

    let monitor = MonitorLoop::from_config(&config, Arc::new(feed), archive)
        .context("Failed to create monitor")?;

    // Setup Ctrl+C handler
    let handle = monitor.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        handle.stop().await;
    });

    println!(
        "Monitoring {} every {}s (paper trading, funds {:.2}) - Ctrl+C to stop",
        config.feed.symbol, config.monitor.tick_interval_secs, config.portfolio.initial_funds
    );

    let rounds = monitor
        .run_with(|report| println!("{}", report.status_line()))
        .await?;

    let chart = ChartRenderer::new(config.monitor.chart_width, config.monitor.chart_height);
    for summary in &rounds {
        println!();
        println!("{}", summary);
        if !summary.prices.is_empty() {
            println!("\nPrice history:");
            print!("{}", chart.render(&summary.prices, summary.precision));
        }
    }
    if rounds.is_empty() {
        println!("No rounds completed (market closed the whole time?)");
    }

    tracing::info!("Quotewatch stopped");
    Ok(())
}

async fn quote_command(cmd: QuoteCmd, config: Config) -> Result<()> {
    let code = cmd.code.clone().unwrap_or_else(|| config.feed.symbol.clone());
    let archive = archive_for(&config);

    let quote = if cmd.offline {
        latest_archived(&archive, &code)?
    } else {
        let feed = SinaFeedClient::new(
            config.feed.url.clone(),
            Duration::from_secs(config.feed.timeout_secs),
        )
        .context("Failed to create feed client")?;

        let live = match feed.fetch_code(&code).await {
            Ok(raw) => FeedParser::parse_first(&raw).map_err(anyhow::Error::from),
            Err(e) => Err(e.into()),
        };
        match live {
            Ok(quote) => quote,
            Err(e) => {
                tracing::warn!("Live quote failed ({}), falling back to archive", e);
                latest_archived(&archive, &code)
                    .with_context(|| format!("Live quote failed: {}", e))?
            }
        }
    };

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&quote)?);
    } else {
        print_quote(&quote);
    }
    Ok(())
}

fn latest_archived(archive: &JsonlArchive, code: &str) -> Result<Quote> {
    let entry = archive
        .latest(code)
        .with_context(|| format!("Failed to read archive {}", archive.path().display()))?;
    match entry {
        Some(entry) => {
            println!(
                "(archived at {})",
                entry.observed_at.format("%Y-%m-%d %H:%M:%S UTC")
            );
            Ok(entry.quote)
        }
        None => bail!("No archived quote for {} in {}", code, archive.path().display()),
    }
}

fn print_quote(quote: &Quote) {
    let p = |price| quote.format_price(price);

    println!("{} ({}, {})", quote.name, quote.code, quote.market);
    println!(
        "  Price:      {}  {:+} ({:+}%)",
        p(quote.price),
        quote.change_display(),
        quote.change_percent()
    );
    println!(
        "  Open:       {}   High: {}   Low: {}   Prev close: {}",
        p(quote.open),
        p(quote.high),
        p(quote.low),
        p(quote.previous_close)
    );
    println!("  Bid / Ask:  {} / {}", p(quote.bid), p(quote.ask));
    println!(
        "  Volume:     {} lots   Turnover: {} x10k",
        quote.volume_lots(),
        quote.turnover_wan()
    );
    println!("  Book:");
    for (level, (bid, ask)) in quote.bids.iter().zip(quote.asks.iter()).enumerate() {
        println!(
            "    {}  bid {} x {:>6}   ask {} x {:>6}",
            level + 1,
            p(bid.price),
            bid.size_lots(),
            p(ask.price),
            ask.size_lots()
        );
    }
    println!("  As of:      {}", quote.trade_datetime().format("%Y-%m-%d %H:%M:%S"));
}

fn replay_command(cmd: ReplayCmd, config: Config) -> Result<()> {
    let archive = match cmd.archive {
        Some(ref path) => JsonlArchive::new(path),
        None => archive_for(&config),
    };
    let code = config.feed.symbol.clone();

    let entries = archive
        .history(&code, usize::MAX)
        .with_context(|| format!("Failed to read archive {}", archive.path().display()))?;
    let (first, last) = match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => (first.observed_at, last.observed_at),
        _ => bail!("No archived ticks for {} in {}", code, archive.path().display()),
    };

    let mut pipeline = TickPipeline::from_config(&config);
    let reports = pipeline.replay(&entries);
    if cmd.ticks {
        for report in &reports {
            println!("{}", report.status_line());
        }
    }

    let summary = pipeline.summary(1, &code, first, last, RoundEnd::ReplayFinished);
    println!("{}", summary);

    if !cmd.no_chart {
        let chart = ChartRenderer::new(config.monitor.chart_width, config.monitor.chart_height);
        println!("\nPrice history:");
        print!("{}", chart.render(&summary.prices, summary.precision));
    }
    Ok(())
}

fn explain_command(_cmd: ExplainCmd, config: Config) -> Result<()> {
    let strategy = StrategyConfig::from(&config);
    let unit = strategy.min_price_unit;

    println!("Strategy parameters");
    println!("  Instrument:        {}", config.feed.symbol);
    println!("  Trend window:      {} ticks", strategy.window_size);
    println!("  Slope threshold:   {} per second", strategy.slope_threshold);
    println!("  Min price unit:    {}", unit);
    println!(
        "  Drawdown exit:     {} units ({})",
        strategy.drawdown_steps,
        strategy.drawdown_threshold()
    );
    println!(
        "  Sharp move:        {} units ({})",
        SHARP_MOVE_STEPS,
        strategy.sharp_move()
    );
    println!("  Initial funds:     {:.2}", config.portfolio.initial_funds);
    println!("  Lot size:          {} shares", config.portfolio.lot_size);
    println!("  Initial buy:       {}", config.portfolio.initial_buy);
    println!("  Tick interval:     {}s", config.monitor.tick_interval_secs);
    println!();
    println!("Rules");
    println!(
        "  Trend: least-squares slope of price vs. seconds over the window; \
         UP above +{0}, DOWN below -{0}, otherwise FLAT.",
        strategy.slope_threshold
    );
    println!(
        "  BUY:   trend turns DOWN -> UP, or trend is UP and price rose more than {} in one tick.",
        format_price(strategy.sharp_move(), unit.scale())
    );
    println!(
        "  SELL:  trend is DOWN and price is at least {} below the round's peak, \
         or (trend not DOWN) price fell more than {} in one tick.",
        format_price(strategy.drawdown_threshold(), unit.scale()),
        format_price(strategy.sharp_move(), unit.scale())
    );
    println!("  BUY is checked first; otherwise HOLD.");
    println!(
        "  BUY spends cash on whole lots of {} shares; SELL liquidates the whole position.",
        config.portfolio.lot_size
    );
    Ok(())
}
