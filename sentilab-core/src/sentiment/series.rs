//! Timestamp-indexed sentiment observations with windowed lookup.

use chrono::{DateTime, Utc};

use crate::domain::{LabelCounts, SentimentLabel, SentimentObservation};

use super::feed::FeedError;

/// Raw epoch values below this are seconds; at or above it, milliseconds.
pub const SECONDS_THRESHOLD: i64 = 10_000_000_000;

/// Normalize a raw feed timestamp to epoch milliseconds.
pub fn normalize_timestamp_ms(raw: i64) -> i64 {
    if raw < SECONDS_THRESHOLD {
        raw.saturating_mul(1000)
    } else {
        raw
    }
}

/// Ordered sentiment observations. Read-only after construction.
#[derive(Debug, Clone, Default)]
pub struct SentimentSeries {
    observations: Vec<SentimentObservation>,
}

impl SentimentSeries {
    /// Build a series, sorting by timestamp.
    ///
    /// The sort is stable: observations sharing a timestamp keep feed order, so
    /// the last one in the feed is the one a window lookup resolves to.
    pub fn new(mut observations: Vec<SentimentObservation>) -> Self {
        observations.sort_by_key(|o| o.timestamp);
        Self { observations }
    }

    /// Build a series from raw `(line, epoch, label)` records, epoch in seconds
    /// or milliseconds. `line` is the source line, reported on range errors.
    pub fn from_raw<I>(records: I) -> Result<Self, FeedError>
    where
        I: IntoIterator<Item = (u64, i64, SentimentLabel)>,
    {
        let observations = records
            .into_iter()
            .map(|(line, raw, label)| {
                let ms = normalize_timestamp_ms(raw);
                DateTime::from_timestamp_millis(ms)
                    .map(|timestamp| SentimentObservation::new(timestamp, label))
                    .ok_or(FeedError::TimestampOutOfRange { line, value: raw })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(observations))
    }

    /// Observations in `(open_exclusive, close_inclusive]`, ascending.
    pub fn observations_in(
        &self,
        open_exclusive: DateTime<Utc>,
        close_inclusive: DateTime<Utc>,
    ) -> &[SentimentObservation] {
        let start = self
            .observations
            .partition_point(|o| o.timestamp <= open_exclusive);
        let end = self
            .observations
            .partition_point(|o| o.timestamp <= close_inclusive);
        if start >= end {
            &[]
        } else {
            &self.observations[start..end]
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.observations.first().map(|o| o.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.observations.last().map(|o| o.timestamp)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SentimentObservation> {
        self.observations.iter()
    }

    pub fn label_counts(&self) -> LabelCounts {
        let mut counts = LabelCounts::default();
        for obs in &self.observations {
            counts.record(obs.label);
        }
        counts
    }
}
