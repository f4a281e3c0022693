//! SentiLab Runner — backtest orchestration around the decision engine.
//!
//! This crate builds on `sentilab-core` to provide:
//! - TOML configuration with validation and content-hash run ids
//! - Kline loading from the day-file cache, with a synthetic fallback
//! - Opt-in download of missing cache days from the Binance archive
//! - A paper broker implementing the execution boundary
//! - The bar loop, performance metrics, and artifact export

pub mod config;
pub mod data_loader;
pub mod download;
pub mod export;
pub mod metrics;
pub mod paper;
pub mod runner;

pub use config::{BacktestConfig, ConfigError, RunId};
pub use data_loader::{load_klines, KlineCache, LoadError, LoadOptions, LoadedKlines};
pub use download::{fill_missing_days, BinanceArchive, DownloadError, DownloadSummary, KlineSource};
pub use export::{generate_report, save_artifacts};
pub use metrics::PerformanceMetrics;
pub use paper::{Fill, OpenPosition, PaperBroker, TradeRecord};
pub use runner::{
    run_backtest, run_single_backtest, BacktestResult, EquityPoint, RunError, RunOptions,
    SCHEMA_VERSION,
};
