//! Sentiment data — feed loading, the ordered series, and window resolution.
//!
//! The series is immutable after load. Resolution never errors: an empty
//! window is a first-class `NotFound` outcome that the decision layer maps to
//! `unknown`.

pub mod feed;
pub mod resolver;
pub mod series;

pub use feed::{load_feed, read_feed, FeedError, FeedLayout};
pub use resolver::{Resolution, SentimentWindowResolver};
pub use series::{normalize_timestamp_ms, SentimentSeries, SECONDS_THRESHOLD};
