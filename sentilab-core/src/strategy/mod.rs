//! Decision engines — map a resolved sentiment label to an order intent.
//!
//! Two variants share the same sentiment-resolution substrate:
//! - `SimpleDecisionEngine`: single-shot all-in/all-out, remembers the last side
//! - `AccumulatingDecisionEngine`: buys in fixed units up to a quantity ceiling,
//!   liquidates fully on bearish sentiment
//!
//! Engines are built from already-parsed `EngineParams`. They never touch files
//! or configuration themselves.

pub mod accumulating;
pub mod driver;
pub mod simple;

pub use accumulating::AccumulatingDecisionEngine;
pub use driver::{SentimentStrategy, StepOutcome};
pub use simple::SimpleDecisionEngine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::{OrderIntent, SentimentLabel};
use crate::sentiment::FeedLayout;

// ─── Error type ──────────────────────────────────────────────────────

/// Invalid engine parameters. Always fatal at construction.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("order_quantity must be a positive finite number, got {0}")]
    InvalidOrderQuantity(f64),
    #[error("total_quantity_limit must be a positive finite number, got {0}")]
    InvalidQuantityCeiling(f64),
    #[error("total_quantity_limit ({ceiling}) is below order_quantity ({unit}); no buy could ever be placed")]
    CeilingBelowOrderUnit { ceiling: f64, unit: f64 },
    #[error("the accumulating strategy requires total_quantity_limit")]
    MissingQuantityCeiling,
    #[error("unknown strategy kind '{0}' (expected 'simple' or 'accumulating')")]
    UnknownKind(String),
}

// ─── Step context ────────────────────────────────────────────────────

/// Everything an engine sees for one time step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepContext {
    /// Open time of the current bar.
    pub timestamp: DateTime<Utc>,
    /// Resolved sentiment (`Unknown` when nothing was found).
    pub label: SentimentLabel,
    /// Net position from the execution boundary. Read-only to the engine.
    pub net_size: f64,
}

/// A sentiment-driven decision engine.
///
/// # Invariants
/// - `decide()` is called once per step, in ascending timestamp order
/// - only the engine mutates its own state
/// - every posted intent has a strictly positive quantity
pub trait DecisionEngine: Send + Sync {
    /// Human-readable name (e.g., "simple", "accumulating").
    fn name(&self) -> &str;

    fn decide(&mut self, ctx: &StepContext) -> OrderIntent;

    /// Return to the initial state. Required before reusing an engine for a new run.
    fn reset(&mut self);
}

// ─── Strategy selection ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Simple,
    Accumulating,
}

impl StrategyKind {
    /// The feed layout each strategy was designed against.
    pub fn default_feed_layout(&self) -> FeedLayout {
        match self {
            Self::Simple => FeedLayout::Timestamped,
            Self::Accumulating => FeedLayout::Sourced,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Simple => f.write_str("simple"),
            Self::Accumulating => f.write_str("accumulating"),
        }
    }
}

impl FromStr for StrategyKind {
    type Err = StrategyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "accumulating" | "successive" => Ok(Self::Accumulating),
            other => Err(StrategyError::UnknownKind(other.to_string())),
        }
    }
}

/// Validated engine parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineParams {
    /// Passed through for logging; not used in decisions.
    pub symbol: String,
    order_quantity: f64,
    quantity_ceiling: Option<f64>,
}

impl EngineParams {
    pub fn new(
        symbol: impl Into<String>,
        order_quantity: f64,
        quantity_ceiling: Option<f64>,
    ) -> Result<Self, StrategyError> {
        if !order_quantity.is_finite() || order_quantity <= 0.0 {
            return Err(StrategyError::InvalidOrderQuantity(order_quantity));
        }
        if let Some(ceiling) = quantity_ceiling {
            if !ceiling.is_finite() || ceiling <= 0.0 {
                return Err(StrategyError::InvalidQuantityCeiling(ceiling));
            }
            if ceiling < order_quantity {
                return Err(StrategyError::CeilingBelowOrderUnit {
                    ceiling,
                    unit: order_quantity,
                });
            }
        }
        Ok(Self {
            symbol: symbol.into(),
            order_quantity,
            quantity_ceiling,
        })
    }

    pub fn order_quantity(&self) -> f64 {
        self.order_quantity
    }

    pub fn quantity_ceiling(&self) -> Option<f64> {
        self.quantity_ceiling
    }
}

/// Create a decision engine of the given kind.
pub fn build_engine(
    kind: StrategyKind,
    params: &EngineParams,
) -> Result<Box<dyn DecisionEngine>, StrategyError> {
    match kind {
        StrategyKind::Simple => Ok(Box::new(SimpleDecisionEngine::new(params.order_quantity))),
        StrategyKind::Accumulating => {
            let ceiling = params
                .quantity_ceiling
                .ok_or(StrategyError::MissingQuantityCeiling)?;
            Ok(Box::new(AccumulatingDecisionEngine::new(
                params.order_quantity,
                ceiling,
            )))
        }
    }
}
