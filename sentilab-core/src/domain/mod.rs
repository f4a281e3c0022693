//! Domain types for SentiLab

pub mod kline;
pub mod order;
pub mod sentiment;

pub use kline::{Kline, KlineInterval, UnknownInterval};
pub use order::{IntentCounts, OrderIntent, OrderRequest, OrderSide};
pub use sentiment::{LabelCounts, SentimentLabel, SentimentObservation};
