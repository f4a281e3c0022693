//! Sentiment labels and observations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a single piece of market sentiment.
///
/// Only `Bullish` and `Bearish` carry decision weight. Everything else the
/// upstream feed emits (empty strings, "neutral", typos) collapses to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Bullish,
    Bearish,
    Unknown,
}

impl SentimentLabel {
    /// Parse a free-text feed value. Never fails.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("bullish") {
            Self::Bullish
        } else if trimmed.eq_ignore_ascii_case("bearish") {
            Self::Bearish
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bullish => "bullish",
            Self::Bearish => "bearish",
            Self::Unknown => "unknown",
        }
    }
}

impl From<&str> for SentimentLabel {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A timestamped sentiment label. Immutable once loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentObservation {
    pub timestamp: DateTime<Utc>,
    pub label: SentimentLabel,
}

impl SentimentObservation {
    pub fn new(timestamp: DateTime<Utc>, label: SentimentLabel) -> Self {
        Self { timestamp, label }
    }
}

/// Per-label tally over a series or a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub bullish: usize,
    pub bearish: usize,
    pub unknown: usize,
}

impl LabelCounts {
    pub fn record(&mut self, label: SentimentLabel) {
        match label {
            SentimentLabel::Bullish => self.bullish += 1,
            SentimentLabel::Bearish => self.bearish += 1,
            SentimentLabel::Unknown => self.unknown += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.bullish + self.bearish + self.unknown
    }
}
