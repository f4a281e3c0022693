//! SentiLab CLI — run sentiment-driven backtests and inspect feeds.
//!
//! Commands:
//! - `run` — execute a backtest from a TOML config file and save artifacts
//! - `sentiment` — load a sentiment feed and summarize it

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::SecondsFormat;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use sentilab_core::sentiment::{load_feed, FeedLayout};
use sentilab_runner::export::export_json;
use sentilab_runner::runner::{run_single_backtest, RunOptions};
use sentilab_runner::{save_artifacts, BacktestConfig, BacktestResult};

#[derive(Parser)]
#[command(
    name = "sentilab",
    version,
    about = "SentiLab CLI — sentiment-driven backtesting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a backtest from a TOML config file.
    Run {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,

        /// Use synthetic klines when no cached data exists.
        #[arg(long, default_value_t = false)]
        synthetic: bool,

        /// Download days missing from the kline cache from the Binance archive.
        #[arg(long, default_value_t = false)]
        download: bool,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Log filter (trace, debug, info, warn, error). Overrides RUST_LOG and the config.
        #[arg(long)]
        log_level: Option<String>,

        /// Print the full result as JSON instead of the summary.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Load a sentiment feed and print a summary.
    Sentiment {
        /// Path to the feed CSV.
        #[arg(long)]
        feed: PathBuf,

        /// Column layout: sourced or timestamped.
        #[arg(long, default_value = "sourced")]
        layout: FeedLayout,

        /// Log filter. Overrides RUST_LOG.
        #[arg(long)]
        log_level: Option<String>,

        /// Print the summary as JSON.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            synthetic,
            download,
            output_dir,
            log_level,
            json,
        } => {
            let opts = RunOptions {
                synthetic,
                download,
            };
            run_backtest_cmd(&config, &opts, &output_dir, log_level.as_deref(), json)
        }
        Commands::Sentiment {
            feed,
            layout,
            log_level,
            json,
        } => {
            init_logging(log_level.as_deref(), "info");
            run_sentiment_cmd(&feed, layout, json)
        }
    }
}

/// Filter precedence: explicit flag, then `RUST_LOG`, then the fallback.
fn init_logging(flag: Option<&str>, fallback: &str) {
    let filter = flag
        .and_then(|level| EnvFilter::try_new(level).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .or_else(|| EnvFilter::try_new(fallback).ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_backtest_cmd(
    config_path: &Path,
    opts: &RunOptions,
    output_dir: &Path,
    log_level: Option<&str>,
    json: bool,
) -> Result<()> {
    let config = BacktestConfig::from_file(config_path)
        .with_context(|| format!("invalid config {}", config_path.display()))?;
    init_logging(log_level, &config.logging.level);
    tracing::info!(run_id = %config.run_id(), "sentilab v{}", env!("CARGO_PKG_VERSION"));

    let result = run_single_backtest(&config, opts)?;

    if json {
        println!("{}", export_json(&result)?);
    } else {
        print_summary(&result);
    }

    let run_dir = save_artifacts(&result, output_dir)?;
    eprintln!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_sentiment_cmd(feed: &Path, layout: FeedLayout, json: bool) -> Result<()> {
    let series =
        load_feed(feed, layout).with_context(|| format!("failed to load {}", feed.display()))?;
    let counts = series.label_counts();
    let first = series
        .first_timestamp()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true));
    let last = series
        .last_timestamp()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true));

    if json {
        let summary = serde_json::json!({
            "feed": feed.display().to_string(),
            "layout": layout,
            "observations": series.len(),
            "first": first,
            "last": last,
            "labels": counts,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("=== Sentiment Feed ===");
    println!("File:           {}", feed.display());
    println!("Layout:         {layout}");
    println!("Observations:   {}", series.len());
    match (first, last) {
        (Some(first), Some(last)) => println!("Range:          {first} to {last}"),
        _ => println!("Range:          (empty)"),
    }
    println!();
    println!("--- Labels ---");
    println!("Bullish:        {}", counts.bullish);
    println!("Bearish:        {}", counts.bearish);
    println!("Unknown:        {}", counts.unknown);
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:         {} ({})", result.symbol, result.interval);
    println!(
        "Period:         {} to {}",
        result.start_date, result.end_date
    );
    println!("Strategy:       {}", result.strategy);
    println!("Bars:           {}", result.bar_count);
    println!(
        "Signals:        {} bullish, {} bearish, {} unknown",
        result.labels.bullish, result.labels.bearish, result.labels.unknown
    );
    println!(
        "Orders:         {} buy, {} sell, {} rejected",
        result.intents.buy, result.intents.sell, result.rejected_orders
    );
    println!();
    println!("--- Performance ---");
    println!("Final Equity:   {:.2}", m.final_equity);
    println!("Total Return:   {:.2}%", m.total_return_pct);
    println!("Buy & Hold:     {:.2}%", m.buy_and_hold_pct);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown_pct);
    println!("Trades:         {}", m.trade_count);
    println!("Win Rate:       {:.1}%", m.win_rate_pct);
    println!("Best Trade:     {:.2}%", m.best_trade_pct);
    println!("Worst Trade:    {:.2}%", m.worst_trade_pct);
    println!("Exposure:       {:.1}%", m.exposure_pct);
    if let Some(open) = &result.open_position {
        println!(
            "Open Position:  {} @ {:.2} (unrealized {:.2})",
            open.quantity, open.entry_price, open.unrealized_pnl
        );
    }
    if result.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
}
