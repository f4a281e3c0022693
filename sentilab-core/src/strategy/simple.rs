//! Simple engine — all-in on bullish, all-out on bearish.
//!
//! State is only the side of the last posted order:
//!
//! | label   | last side | action                         |
//! |---------|-----------|--------------------------------|
//! | bullish | not buy   | buy `order_quantity`, last=buy |
//! | bullish | buy       | skip                           |
//! | bearish | buy       | close position, last=sell      |
//! | bearish | sell/none | skip                           |
//! | unknown | any       | skip                           |
//!
//! Bearish with no order ever placed is a no-op: nothing has been opened.

use crate::domain::{OrderIntent, OrderSide, SentimentLabel};

use super::{DecisionEngine, StepContext};

#[derive(Debug, Clone)]
pub struct SimpleDecisionEngine {
    order_quantity: f64,
    last_order_side: Option<OrderSide>,
}

impl SimpleDecisionEngine {
    pub fn new(order_quantity: f64) -> Self {
        Self {
            order_quantity,
            last_order_side: None,
        }
    }

    pub fn last_order_side(&self) -> Option<OrderSide> {
        self.last_order_side
    }
}

impl DecisionEngine for SimpleDecisionEngine {
    fn name(&self) -> &str {
        "simple"
    }

    fn decide(&mut self, ctx: &StepContext) -> OrderIntent {
        match (ctx.label, self.last_order_side) {
            (SentimentLabel::Bullish, last) if last != Some(OrderSide::Buy) => {
                self.last_order_side = Some(OrderSide::Buy);
                OrderIntent::buy(self.order_quantity)
            }
            (SentimentLabel::Bearish, Some(OrderSide::Buy)) => {
                self.last_order_side = Some(OrderSide::Sell);
                // The buy may have been rejected downstream; closing nothing is a skip.
                if ctx.net_size > 0.0 {
                    OrderIntent::close(ctx.net_size)
                } else {
                    OrderIntent::skip()
                }
            }
            _ => OrderIntent::skip(),
        }
    }

    fn reset(&mut self) {
        self.last_order_side = None;
    }
}
