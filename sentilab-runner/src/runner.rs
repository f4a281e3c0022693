//! Backtest runner — wires config, price data, the sentiment strategy, and the
//! paper broker together.
//!
//! Two entry points:
//! - `run_single_backtest()`: loads the sentiment feed and klines (downloading
//!   missing days when asked), then runs. Used by the CLI.
//! - `run_backtest()`: takes pre-loaded klines and a series. No I/O.
//!
//! Per bar, in order: fill queued orders at the open, step the strategy with
//! the previous bar's open time, mark equity at the close.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sentilab_core::domain::{IntentCounts, KlineInterval, LabelCounts};
use sentilab_core::sentiment::{load_feed, FeedError, SentimentSeries};
use sentilab_core::strategy::{build_engine, SentimentStrategy, StrategyError, StrategyKind};

use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{load_klines, KlineCache, LoadError, LoadOptions, LoadedKlines};
use crate::download::{fill_missing_days, BinanceArchive, DownloadError};
use crate::metrics::PerformanceMetrics;
use crate::paper::{Fill, OpenPosition, PaperBroker, TradeRecord};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("download error: {0}")]
    Download(#[from] DownloadError),
    #[error("sentiment feed error: {0}")]
    Feed(#[from] FeedError),
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),
    #[error("no klines to run over")]
    NoBars,
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Equity of one bar, keyed by the bar's open time and marked at its close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub bar_open: DateTime<Utc>,
    /// Cash plus holdings valued at the bar's close.
    pub equity: f64,
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: String,
    pub symbol: String,
    pub interval: KlineInterval,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_balance: f64,
    pub commission: f64,
    pub strategy: StrategyKind,
    pub order_quantity: f64,
    pub quantity_ceiling: Option<f64>,
    pub bar_count: usize,
    /// Labels resolved per step, not raw feed counts.
    pub labels: LabelCounts,
    pub intents: IntentCounts,
    pub rejected_orders: usize,
    /// Orders still queued when the data ran out.
    pub unfilled_orders: usize,
    /// Every execution, in fill order.
    #[serde(default)]
    pub fills: Vec<Fill>,
    pub trades: Vec<TradeRecord>,
    pub open_position: Option<OpenPosition>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: PerformanceMetrics,
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Options for `run_single_backtest`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Fall back to synthetic klines when the cache is empty.
    pub synthetic: bool,
    /// Fetch days missing from the cache before loading.
    pub download: bool,
}

/// Load the feed and klines named by `config`, then run.
pub fn run_single_backtest(
    config: &BacktestConfig,
    opts: &RunOptions,
) -> Result<BacktestResult, RunError> {
    config.validate()?;

    let series = load_feed(&config.strategy.sentiment_data, config.feed_layout())?;
    if series.is_empty() {
        tracing::warn!(
            path = %config.strategy.sentiment_data.display(),
            "sentiment feed is empty; every step will skip"
        );
    }

    let cache = KlineCache::new(&config.data.market_data_dir);
    if opts.download {
        let source = BinanceArchive::new()?;
        fill_missing_days(
            &cache,
            &source,
            &config.backtest.symbol,
            config.backtest.kline_interval,
            config.backtest.start_date,
            config.backtest.end_date,
        )?;
    }
    let load_opts = LoadOptions {
        start: config.backtest.start_date,
        end: config.backtest.end_date,
        synthetic: opts.synthetic,
    };
    let data = load_klines(
        &cache,
        &config.backtest.symbol,
        config.backtest.kline_interval,
        &load_opts,
    )?;

    run_backtest(config, &data, series)
}

/// Run a backtest over pre-loaded klines. No I/O.
pub fn run_backtest(
    config: &BacktestConfig,
    data: &LoadedKlines,
    series: SentimentSeries,
) -> Result<BacktestResult, RunError> {
    let Some(last_bar) = data.klines.last() else {
        return Err(RunError::NoBars);
    };

    let params = config.engine_params()?;
    let engine = build_engine(config.strategy.kind, &params)?;
    let symbol = config.backtest.symbol.clone();
    let mut strategy = SentimentStrategy::new(symbol.clone(), series, engine);
    let mut broker = PaperBroker::new(config.backtest.start_balance, config.backtest.commission);

    tracing::info!(
        %symbol,
        strategy = strategy.engine_name(),
        bars = data.klines.len(),
        observations = strategy.series().len(),
        "starting backtest"
    );

    let mut labels = LabelCounts::default();
    let mut intents = IntentCounts::default();
    let mut equity_curve = Vec::with_capacity(data.klines.len());
    let mut exposure = Vec::with_capacity(data.klines.len());
    let mut previous = None;

    for kline in &data.klines {
        broker.on_bar_open(kline);

        let outcome = strategy.on_step(previous, kline.open_time, &mut broker);
        labels.record(outcome.label);
        intents.record(&outcome.intent);

        equity_curve.push(EquityPoint {
            bar_open: kline.open_time,
            equity: broker.equity(kline.close),
        });
        exposure.push(broker.position() > 0.0);
        previous = Some(kline.open_time);
    }

    let curve: Vec<f64> = equity_curve.iter().map(|p| p.equity).collect();
    let metrics = PerformanceMetrics::compute(
        &curve,
        broker.trades(),
        config.backtest.start_balance,
        &data.klines,
        &exposure,
    );
    let unfilled_orders = broker.pending_orders();
    if unfilled_orders > 0 {
        tracing::debug!(unfilled_orders, "orders from the final step were never filled");
    }

    tracing::info!(
        %symbol,
        final_equity = metrics.final_equity,
        trades = metrics.trade_count,
        rejected = broker.rejected_orders(),
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id(),
        symbol,
        interval: data.interval,
        start_date: config.backtest.start_date,
        end_date: config.backtest.end_date,
        start_balance: config.backtest.start_balance,
        commission: config.backtest.commission,
        strategy: config.strategy.kind,
        order_quantity: params.order_quantity(),
        quantity_ceiling: params.quantity_ceiling(),
        bar_count: data.klines.len(),
        labels,
        intents,
        rejected_orders: broker.rejected_orders(),
        unfilled_orders,
        fills: broker.fills().to_vec(),
        trades: broker.trades().to_vec(),
        open_position: broker.open_position(last_bar.close),
        equity_curve,
        metrics,
        dataset_hash: data.dataset_hash.clone(),
        has_synthetic: data.has_synthetic,
    })
}
