//! SentiLab Core — the sentiment-to-order decision engine.
//!
//! This crate contains:
//! - Domain types (klines, sentiment observations, order intents)
//! - Sentiment feed loading and the immutable, timestamp-ordered series
//! - Window resolution: latest sentiment in `(previous bar, current bar]`
//! - Simple and accumulating decision engines behind one trait
//! - The execution boundary trait the engines submit through
//!
//! Nothing here performs fills, tracks cash, or reads configuration files.

pub mod domain;
pub mod execution;
pub mod sentiment;
pub mod strategy;
