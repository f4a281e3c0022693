//! Accumulating engine — graduated buys up to a ceiling, full liquidation on bearish.
//!
//! Each bullish step buys one `order_unit` while `cumulative_bought` stays at
//! or under `quantity_ceiling`. A bearish step sells the whole long position
//! reported by the execution boundary and restarts ceiling tracking.
//!
//! Ceiling arithmetic runs on integer micro-units (`QUANTITY_SCALE`), so
//! decimal sizes like 0.1 + 0.1 + 0.1 land exactly on a 0.3 ceiling.

use crate::domain::{OrderIntent, SentimentLabel};

use super::{DecisionEngine, StepContext};

/// Base-asset quantities are tracked in millionths of a unit.
pub const QUANTITY_SCALE: f64 = 1_000_000.0;

fn to_micro_units(quantity: f64) -> i64 {
    (quantity * QUANTITY_SCALE).round() as i64
}

fn from_micro_units(units: i64) -> f64 {
    units as f64 / QUANTITY_SCALE
}

#[derive(Debug, Clone)]
pub struct AccumulatingDecisionEngine {
    order_unit: f64,
    unit_micros: i64,
    ceiling_micros: i64,
    cumulative_micros: i64,
}

impl AccumulatingDecisionEngine {
    pub fn new(order_unit: f64, quantity_ceiling: f64) -> Self {
        Self {
            order_unit,
            unit_micros: to_micro_units(order_unit),
            ceiling_micros: to_micro_units(quantity_ceiling),
            cumulative_micros: 0,
        }
    }

    pub fn cumulative_bought(&self) -> f64 {
        from_micro_units(self.cumulative_micros)
    }

    /// The ceiling as the engine enforces it, rounded to a micro-unit.
    pub fn quantity_ceiling(&self) -> f64 {
        from_micro_units(self.ceiling_micros)
    }

    pub fn order_unit(&self) -> f64 {
        self.order_unit
    }
}

impl DecisionEngine for AccumulatingDecisionEngine {
    fn name(&self) -> &str {
        "accumulating"
    }

    fn decide(&mut self, ctx: &StepContext) -> OrderIntent {
        match ctx.label {
            SentimentLabel::Bullish => {
                let next = self.cumulative_micros + self.unit_micros;
                if next <= self.ceiling_micros {
                    self.cumulative_micros = next;
                    OrderIntent::buy(self.order_unit)
                } else {
                    tracing::debug!(
                        cumulative = self.cumulative_bought(),
                        ceiling = self.quantity_ceiling(),
                        "quantity ceiling reached, skipping buy"
                    );
                    OrderIntent::skip()
                }
            }
            SentimentLabel::Bearish if ctx.net_size > 0.0 => {
                self.cumulative_micros = 0;
                OrderIntent::sell(ctx.net_size)
            }
            SentimentLabel::Bearish | SentimentLabel::Unknown => OrderIntent::skip(),
        }
    }

    fn reset(&mut self) {
        self.cumulative_micros = 0;
    }
}
