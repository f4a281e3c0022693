//! Order intents — the decision engine's output.
//!
//! An intent is either a fully specified order or an explicit skip. Intents are
//! not orders: the execution boundary decides whether and how they fill.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("buy"),
            Self::Sell => f.write_str("sell"),
        }
    }
}

/// A concrete order the engine wants placed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub side: OrderSide,
    /// Base-asset quantity. Always strictly positive.
    pub quantity: f64,
    /// Liquidate the whole position rather than sell a fixed size.
    pub closes_position: bool,
}

/// Output of one decision step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum OrderIntent {
    PostOrder(OrderRequest),
    SkipOrder,
}

impl OrderIntent {
    pub fn buy(quantity: f64) -> Self {
        debug_assert!(quantity > 0.0, "order quantity must be positive");
        Self::PostOrder(OrderRequest {
            side: OrderSide::Buy,
            quantity,
            closes_position: false,
        })
    }

    pub fn sell(quantity: f64) -> Self {
        debug_assert!(quantity > 0.0, "order quantity must be positive");
        Self::PostOrder(OrderRequest {
            side: OrderSide::Sell,
            quantity,
            closes_position: false,
        })
    }

    /// Sell the full held quantity.
    pub fn close(held_quantity: f64) -> Self {
        debug_assert!(held_quantity > 0.0, "order quantity must be positive");
        Self::PostOrder(OrderRequest {
            side: OrderSide::Sell,
            quantity: held_quantity,
            closes_position: true,
        })
    }

    pub fn skip() -> Self {
        Self::SkipOrder
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, Self::SkipOrder)
    }

    pub fn side(&self) -> Option<OrderSide> {
        self.order().map(|o| o.side)
    }

    pub fn quantity(&self) -> Option<f64> {
        self.order().map(|o| o.quantity)
    }

    pub fn order(&self) -> Option<&OrderRequest> {
        match self {
            Self::PostOrder(order) => Some(order),
            Self::SkipOrder => None,
        }
    }
}

/// Running tally of intents emitted over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentCounts {
    pub buy: usize,
    pub sell: usize,
    pub skip: usize,
}

impl IntentCounts {
    pub fn record(&mut self, intent: &OrderIntent) {
        match intent.side() {
            Some(OrderSide::Buy) => self.buy += 1,
            Some(OrderSide::Sell) => self.sell += 1,
            None => self.skip += 1,
        }
    }

    pub fn posted(&self) -> usize {
        self.buy + self.sell
    }
}
