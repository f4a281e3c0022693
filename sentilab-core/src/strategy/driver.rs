//! Per-step driver: resolve sentiment, decide, forward to the execution boundary.

use chrono::{DateTime, Utc};

use crate::domain::{OrderIntent, SentimentLabel};
use crate::execution::{dispatch, ExecutionBoundary};
use crate::sentiment::{SentimentSeries, SentimentWindowResolver};

use super::{DecisionEngine, StepContext};

/// What happened on one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub label: SentimentLabel,
    pub intent: OrderIntent,
}

/// A decision engine bound to its sentiment feed.
pub struct SentimentStrategy {
    symbol: String,
    series: SentimentSeries,
    engine: Box<dyn DecisionEngine>,
}

impl SentimentStrategy {
    pub fn new(
        symbol: impl Into<String>,
        series: SentimentSeries,
        engine: Box<dyn DecisionEngine>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            series,
            engine,
        }
    }

    pub fn series(&self) -> &SentimentSeries {
        &self.series
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Run one step. The boundary sees at most one call, after the intent is computed.
    pub fn on_step<B: ExecutionBoundary + ?Sized>(
        &mut self,
        previous_step: Option<DateTime<Utc>>,
        current_step: DateTime<Utc>,
        boundary: &mut B,
    ) -> StepOutcome {
        let resolution =
            SentimentWindowResolver::resolve(previous_step, current_step, &self.series);
        if !resolution.is_found() {
            tracing::trace!(at = %current_step, "no sentiment in window");
        }
        let label = resolution.label();
        let ctx = StepContext {
            timestamp: current_step,
            label,
            net_size: boundary.current_position_size(),
        };
        let intent = self.engine.decide(&ctx);

        match intent.order() {
            Some(order) => tracing::info!(
                symbol = %self.symbol,
                side = %order.side,
                quantity = order.quantity,
                close = order.closes_position,
                "Placing {} order at {}",
                order.side,
                current_step
            ),
            None => tracing::trace!(%label, at = %current_step, "skip"),
        }

        dispatch(&intent, boundary);
        StepOutcome { label, intent }
    }

    /// Reset engine state before replaying a new run.
    pub fn reset(&mut self) {
        self.engine.reset();
    }
}
