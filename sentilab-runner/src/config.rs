//! Backtest configuration loaded from TOML.
//!
//! ```toml
//! [backtest]
//! symbol = "BTCUSDT"
//! kline_interval = "1h"
//! start_date = "2023-01-01"
//! end_date = "2023-01-31"
//! start_balance = 100000.0
//! commission = 0.001
//!
//! [strategy]
//! kind = "accumulating"
//! order_quantity = 0.01
//! total_quantity_limit = 0.05
//! sentiment_data = "data/sentiment.csv"
//! ```
//!
//! Everything is validated at load. A config that parses is safe to run.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sentilab_core::domain::KlineInterval;
use sentilab_core::sentiment::FeedLayout;
use sentilab_core::strategy::{EngineParams, StrategyError, StrategyKind};

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("symbol must not be empty")]
    EmptySymbol,
    #[error("end_date {end} is before start_date {start}")]
    DateRange { start: NaiveDate, end: NaiveDate },
    #[error("start_balance must be a positive finite number, got {0}")]
    InvalidBalance(f64),
    #[error("commission must be in [0, 1), got {0}")]
    InvalidCommission(f64),
    #[error("invalid strategy parameters: {0}")]
    Strategy(#[from] StrategyError),
}

/// Top-level configuration for one backtest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub strategy: StrategySection,
    #[serde(default)]
    pub data: DataSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Instrument, period, and account settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct BacktestSection {
    pub symbol: String,
    pub kline_interval: KlineInterval,
    /// Inclusive.
    pub start_date: NaiveDate,
    /// Inclusive.
    pub end_date: NaiveDate,
    pub start_balance: f64,
    /// Fraction of notional charged per fill.
    #[serde(default)]
    pub commission: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct StrategySection {
    pub kind: StrategyKind,
    pub order_quantity: f64,
    /// Ceiling on cumulative buys. Required for the accumulating strategy.
    #[serde(default)]
    pub total_quantity_limit: Option<f64>,
    pub sentiment_data: PathBuf,
    /// Overrides the layout implied by `kind`.
    #[serde(default)]
    pub feed_layout: Option<FeedLayout>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DataSection {
    #[serde(default = "default_market_data_dir")]
    pub market_data_dir: PathBuf,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            market_data_dir: default_market_data_dir(),
        }
    }
}

fn default_market_data_dir() -> PathBuf {
    PathBuf::from("market_data")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    /// `tracing` filter directive, e.g. "info" or "sentilab_runner=debug".
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl BacktestConfig {
    /// Read, parse, and validate a config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bt = &self.backtest;
        if bt.symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol);
        }
        if bt.end_date < bt.start_date {
            return Err(ConfigError::DateRange {
                start: bt.start_date,
                end: bt.end_date,
            });
        }
        if !bt.start_balance.is_finite() || bt.start_balance <= 0.0 {
            return Err(ConfigError::InvalidBalance(bt.start_balance));
        }
        if !(0.0..1.0).contains(&bt.commission) {
            return Err(ConfigError::InvalidCommission(bt.commission));
        }

        let params = self.engine_params()?;
        if self.strategy.kind == StrategyKind::Accumulating && params.quantity_ceiling().is_none()
        {
            return Err(StrategyError::MissingQuantityCeiling.into());
        }
        Ok(())
    }

    /// Engine parameters. The ceiling only applies to the accumulating strategy.
    pub fn engine_params(&self) -> Result<EngineParams, StrategyError> {
        let ceiling = match self.strategy.kind {
            StrategyKind::Accumulating => self.strategy.total_quantity_limit,
            StrategyKind::Simple => None,
        };
        EngineParams::new(
            self.backtest.symbol.clone(),
            self.strategy.order_quantity,
            ceiling,
        )
    }

    pub fn feed_layout(&self) -> FeedLayout {
        self.strategy
            .feed_layout
            .unwrap_or_else(|| self.strategy.kind.default_feed_layout())
    }

    /// Deterministic hash of the full configuration.
    pub fn run_id(&self) -> RunId {
        let json = serde_json::to_string(self).expect("BacktestConfig serialization failed");
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCUMULATING: &str = r#"
[backtest]
symbol = "BTCUSDT"
kline_interval = "1h"
start_date = "2023-01-01"
end_date = "2023-01-31"
start_balance = 100000.0
commission = 0.001

[strategy]
kind = "accumulating"
order_quantity = 0.01
total_quantity_limit = 0.05
sentiment_data = "data/sentiment.csv"
"#;

    #[test]
    fn parses_full_config_with_defaults() {
        let config = BacktestConfig::from_toml(ACCUMULATING).unwrap();
        assert_eq!(config.backtest.kline_interval, KlineInterval::H1);
        assert_eq!(config.strategy.kind, StrategyKind::Accumulating);
        assert_eq!(config.data.market_data_dir, PathBuf::from("market_data"));
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.feed_layout(), FeedLayout::Sourced);
        assert_eq!(config.engine_params().unwrap().quantity_ceiling(), Some(0.05));
    }

    #[test]
    fn simple_strategy_needs_no_ceiling() {
        let text = ACCUMULATING
            .replace("kind = \"accumulating\"", "kind = \"simple\"")
            .replace("total_quantity_limit = 0.05\n", "");
        let config = BacktestConfig::from_toml(&text).unwrap();
        assert_eq!(config.feed_layout(), FeedLayout::Timestamped);
        assert_eq!(config.engine_params().unwrap().quantity_ceiling(), None);
    }

    #[test]
    fn accumulating_without_ceiling_is_rejected() {
        let text = ACCUMULATING.replace("total_quantity_limit = 0.05\n", "");
        let err = BacktestConfig::from_toml(&text).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Strategy(StrategyError::MissingQuantityCeiling)
        ));
    }

    #[test]
    fn non_numeric_quantity_is_a_parse_error() {
        let text = ACCUMULATING.replace("order_quantity = 0.01", "order_quantity = \"lots\"");
        assert!(matches!(
            BacktestConfig::from_toml(&text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_key_is_a_parse_error() {
        let text = ACCUMULATING.replace("order_quantity = 0.01\n", "");
        assert!(matches!(
            BacktestConfig::from_toml(&text),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn unknown_interval_is_rejected() {
        let text = ACCUMULATING.replace("\"1h\"", "\"7m\"");
        let err = BacktestConfig::from_toml(&text).unwrap_err();
        assert!(err.to_string().contains("7m"));
    }

    #[test]
    fn inverted_dates_are_rejected() {
        let text = ACCUMULATING.replace("2023-01-31", "2022-12-01");
        assert!(matches!(
            BacktestConfig::from_toml(&text),
            Err(ConfigError::DateRange { .. })
        ));
    }

    #[test]
    fn commission_and_balance_are_bounded() {
        let text = ACCUMULATING.replace("commission = 0.001", "commission = 1.5");
        assert!(matches!(
            BacktestConfig::from_toml(&text),
            Err(ConfigError::InvalidCommission(_))
        ));
        let text = ACCUMULATING.replace("start_balance = 100000.0", "start_balance = 0.0");
        assert!(matches!(
            BacktestConfig::from_toml(&text),
            Err(ConfigError::InvalidBalance(_))
        ));
    }

    #[test]
    fn ceiling_below_unit_is_rejected() {
        let text = ACCUMULATING.replace("total_quantity_limit = 0.05", "total_quantity_limit = 0.001");
        assert!(matches!(
            BacktestConfig::from_toml(&text),
            Err(ConfigError::Strategy(StrategyError::CeilingBelowOrderUnit { .. }))
        ));
    }

    #[test]
    fn layout_override_wins() {
        let text = ACCUMULATING.replace(
            "sentiment_data = \"data/sentiment.csv\"",
            "sentiment_data = \"data/sentiment.csv\"\nfeed_layout = \"timestamped\"",
        );
        let config = BacktestConfig::from_toml(&text).unwrap();
        assert_eq!(config.feed_layout(), FeedLayout::Timestamped);
    }

    #[test]
    fn run_id_is_deterministic_and_sensitive() {
        let a = BacktestConfig::from_toml(ACCUMULATING).unwrap();
        let b = BacktestConfig::from_toml(ACCUMULATING).unwrap();
        assert_eq!(a.run_id(), b.run_id());
        assert_eq!(a.run_id().len(), 64);

        let mut c = a.clone();
        c.strategy.order_quantity = 0.02;
        assert_ne!(a.run_id(), c.run_id());
    }
}
