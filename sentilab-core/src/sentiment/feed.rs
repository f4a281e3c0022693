//! Sentiment feed loading.
//!
//! Feeds are header-less CSV files in one of two column layouts:
//! - `Sourced`: `source, collected_timestamp, published_timestamp, headline, sentiment`
//! - `Timestamped`: `timestamp, headline, sentiment`
//!
//! The observation time is the published timestamp (sourced) or the only
//! timestamp (timestamped), in epoch seconds or milliseconds.
//!
//! Fields may be double-quoted, and whitespace right after a delimiter is
//! skipped, so `news, 1700000000, "Fed hikes, markets rally", bullish` reads as
//! four fields.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::domain::SentimentLabel;

use super::series::SentimentSeries;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to open sentiment feed {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed sentiment feed: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: missing {column} column")]
    MissingColumn { line: u64, column: &'static str },

    #[error("line {line}: timestamp '{value}' is not an integer epoch")]
    InvalidTimestamp { line: u64, value: String },

    #[error("line {line}: timestamp {value} is out of range")]
    TimestampOutOfRange { line: u64, value: i64 },

    #[error("unknown feed layout '{0}' (expected 'sourced' or 'timestamped')")]
    UnknownLayout(String),
}

/// Column layout of a sentiment feed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedLayout {
    /// `source, collected_timestamp, published_timestamp, headline, sentiment`
    Sourced,
    /// `timestamp, headline, sentiment`
    Timestamped,
}

impl FeedLayout {
    fn timestamp_column(&self) -> usize {
        match self {
            Self::Sourced => 2,
            Self::Timestamped => 0,
        }
    }

    fn sentiment_column(&self) -> usize {
        match self {
            Self::Sourced => 4,
            Self::Timestamped => 2,
        }
    }
}

impl fmt::Display for FeedLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sourced => f.write_str("sourced"),
            Self::Timestamped => f.write_str("timestamped"),
        }
    }
}

impl FromStr for FeedLayout {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sourced" => Ok(Self::Sourced),
            "timestamped" => Ok(Self::Timestamped),
            other => Err(FeedError::UnknownLayout(other.to_string())),
        }
    }
}

/// Load a feed file into a series.
pub fn load_feed(path: &Path, layout: FeedLayout) -> Result<SentimentSeries, FeedError> {
    let file = std::fs::File::open(path).map_err(|source| FeedError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let series = read_feed(file, layout)?;
    tracing::debug!(
        path = %path.display(),
        %layout,
        observations = series.len(),
        "loaded sentiment feed"
    );
    Ok(series)
}

/// Drops spaces and tabs that directly follow an unquoted delimiter, so the
/// csv reader sees `"` at the start of a quoted field.
struct SkipInitialSpace<R> {
    inner: R,
    after_delimiter: bool,
    in_quotes: bool,
}

impl<R> SkipInitialSpace<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            after_delimiter: false,
            in_quotes: false,
        }
    }
}

impl<R: Read> Read for SkipInitialSpace<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let n = self.inner.read(buf)?;
            if n == 0 {
                return Ok(0);
            }
            let mut kept = 0;
            for i in 0..n {
                let byte = buf[i];
                if self.after_delimiter && (byte == b' ' || byte == b'\t') {
                    continue;
                }
                self.after_delimiter = false;
                match byte {
                    b'"' => self.in_quotes = !self.in_quotes,
                    b',' if !self.in_quotes => self.after_delimiter = true,
                    _ => {}
                }
                buf[kept] = byte;
                kept += 1;
            }
            // A read made only of skipped whitespace must not look like EOF.
            if kept > 0 {
                return Ok(kept);
            }
        }
    }
}

/// Parse feed records from any reader.
pub fn read_feed<R: Read>(reader: R, layout: FeedLayout) -> Result<SentimentSeries, FeedError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quote(b'"')
        .trim(csv::Trim::All)
        .from_reader(SkipInitialSpace::new(reader));

    let mut records = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        // Blank lines come through as a single empty field.
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        let raw_ts = record
            .get(layout.timestamp_column())
            .ok_or(FeedError::MissingColumn {
                line,
                column: "timestamp",
            })?;
        let ts: i64 = raw_ts.parse().map_err(|_| FeedError::InvalidTimestamp {
            line,
            value: raw_ts.to_string(),
        })?;

        // A short row has no sentiment; that is `unknown`, not an error.
        let label = record
            .get(layout.sentiment_column())
            .map(SentimentLabel::parse)
            .unwrap_or(SentimentLabel::Unknown);

        records.push((line, ts, label));
    }

    SentimentSeries::from_raw(records)
}
