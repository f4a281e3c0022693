//! Execution boundary — how decisions leave the core.
//!
//! The execution engine (paper broker, exchange adapter) owns the position.
//! The core only reads the net size and forwards at most one action per step.
//! Rejections downstream are invisible to the core by construction: none of
//! the submit methods return anything.

use crate::domain::{OrderIntent, OrderSide};

/// Narrow interface the decision engine uses to reach the execution engine.
pub trait ExecutionBoundary {
    /// Signed net position in base-asset units (positive = long).
    fn current_position_size(&self) -> f64;

    fn submit_buy(&mut self, quantity: f64);

    fn submit_sell(&mut self, quantity: f64);

    /// Liquidate the whole position.
    fn close_position(&mut self);
}

/// Forward an intent to the boundary. Calls exactly one method, or none for a skip.
pub fn dispatch<B: ExecutionBoundary + ?Sized>(intent: &OrderIntent, boundary: &mut B) {
    let Some(order) = intent.order() else {
        return;
    };
    if order.closes_position {
        boundary.close_position();
        return;
    }
    match order.side {
        OrderSide::Buy => boundary.submit_buy(order.quantity),
        OrderSide::Sell => boundary.submit_sell(order.quantity),
    }
}
