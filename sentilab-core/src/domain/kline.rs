//! Kline — one bar of the simulated price series.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// OHLCV bar keyed by its open time.
///
/// Each simulated time step corresponds to one kline; the decision engine only
/// sees `open_time` of the current and previous kline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Kline {
    /// Returns true if any price field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high >= low, high bounds open/close, prices positive.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
    }
}

// ─── Interval ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown kline interval '{0}' (expected one of 1m, 3m, 5m, 15m, 30m, 1h, 2h, 4h, 6h, 8h, 12h, 1d)")]
pub struct UnknownInterval(pub String);

/// Bar width in exchange notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum KlineInterval {
    M1,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H6,
    H8,
    H12,
    D1,
}

impl KlineInterval {
    pub const ALL: [KlineInterval; 12] = [
        Self::M1,
        Self::M3,
        Self::M5,
        Self::M15,
        Self::M30,
        Self::H1,
        Self::H2,
        Self::H4,
        Self::H6,
        Self::H8,
        Self::H12,
        Self::D1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::M1 => "1m",
            Self::M3 => "3m",
            Self::M5 => "5m",
            Self::M15 => "15m",
            Self::M30 => "30m",
            Self::H1 => "1h",
            Self::H2 => "2h",
            Self::H4 => "4h",
            Self::H6 => "6h",
            Self::H8 => "8h",
            Self::H12 => "12h",
            Self::D1 => "1d",
        }
    }

    pub fn minutes(&self) -> i64 {
        match self {
            Self::M1 => 1,
            Self::M3 => 3,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::M30 => 30,
            Self::H1 => 60,
            Self::H2 => 120,
            Self::H4 => 240,
            Self::H6 => 360,
            Self::H8 => 480,
            Self::H12 => 720,
            Self::D1 => 1440,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Bars in one UTC day.
    pub fn bars_per_day(&self) -> usize {
        (1440 / self.minutes()) as usize
    }
}

impl fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KlineInterval {
    type Err = UnknownInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|i| i.as_str() == trimmed)
            .ok_or_else(|| UnknownInterval(trimmed.to_string()))
    }
}

impl TryFrom<String> for KlineInterval {
    type Error = UnknownInterval;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KlineInterval> for String {
    fn from(value: KlineInterval) -> Self {
        value.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_kline() -> Kline {
        Kline {
            open_time: Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap(),
            open: 23_100.0,
            high: 23_400.0,
            low: 22_950.0,
            close: 23_250.0,
            volume: 812.5,
        }
    }

    #[test]
    fn kline_is_sane() {
        assert!(sample_kline().is_sane());
    }

    #[test]
    fn kline_detects_void() {
        let mut k = sample_kline();
        k.close = f64::NAN;
        assert!(k.is_void());
        assert!(!k.is_sane());
    }

    #[test]
    fn kline_detects_inverted_range() {
        let mut k = sample_kline();
        k.high = 22_000.0;
        assert!(!k.is_sane());
    }

    #[test]
    fn interval_parses_exchange_notation() {
        assert_eq!("1h".parse::<KlineInterval>().unwrap(), KlineInterval::H1);
        assert_eq!(" 15m ".parse::<KlineInterval>().unwrap(), KlineInterval::M15);
        assert_eq!(KlineInterval::D1.duration(), Duration::days(1));
        assert_eq!(KlineInterval::H4.bars_per_day(), 6);
        assert!("1w".parse::<KlineInterval>().is_err());
        assert!("1H".parse::<KlineInterval>().is_err());
    }

    #[test]
    fn interval_serializes_as_string() {
        let json = serde_json::to_string(&KlineInterval::M5).unwrap();
        assert_eq!(json, "\"5m\"");
        let back: KlineInterval = serde_json::from_str(&json).unwrap();
        assert_eq!(back, KlineInterval::M5);
        assert!(serde_json::from_str::<KlineInterval>("\"7m\"").is_err());
    }
}
