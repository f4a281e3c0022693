//! Property tests for decision engine invariants.
//!
//! Uses proptest to verify:
//! 1. Ceiling — accumulated quantity never exceeds the ceiling, and every
//!    unit that fits under it is bought
//! 2. No repeated side — the simple engine never posts two buys or two sells in a row
//! 3. Positive quantity — every posted intent has quantity > 0
//! 4. Resolution — idempotent, and always inside the requested window

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use sentilab_core::domain::{OrderSide, SentimentLabel, SentimentObservation};
use sentilab_core::sentiment::{Resolution, SentimentSeries, SentimentWindowResolver};
use sentilab_core::strategy::{
    AccumulatingDecisionEngine, DecisionEngine, SimpleDecisionEngine, StepContext,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_label() -> impl Strategy<Value = SentimentLabel> {
    prop_oneof![
        Just(SentimentLabel::Bullish),
        Just(SentimentLabel::Bearish),
        Just(SentimentLabel::Unknown),
    ]
}

fn arb_quantity() -> impl Strategy<Value = f64> {
    (1.0..100.0_f64).prop_map(|q| (q * 100.0).round() / 100.0)
}

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
}

fn arb_series() -> impl Strategy<Value = SentimentSeries> {
    prop::collection::vec((0i64..10_000, arb_label()), 0..60).prop_map(|raw| {
        SentimentSeries::new(
            raw.into_iter()
                .map(|(s, label)| SentimentObservation::new(base() + Duration::seconds(s), label))
                .collect(),
        )
    })
}

/// Applies fills immediately so net size tracks the engine's orders.
fn replay(
    engine: &mut dyn DecisionEngine,
    labels: &[SentimentLabel],
) -> Vec<(Option<OrderSide>, Option<f64>, f64)> {
    let mut held = 0.0_f64;
    let mut out = Vec::new();
    for &label in labels {
        let intent = engine.decide(&StepContext {
            timestamp: base(),
            label,
            net_size: held,
        });
        match (intent.side(), intent.quantity()) {
            (Some(OrderSide::Buy), Some(q)) => held += q,
            (Some(OrderSide::Sell), Some(q)) => held = (held - q).max(0.0),
            _ => {}
        }
        out.push((intent.side(), intent.quantity(), held));
    }
    out
}

// ── 1. Ceiling ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn cumulative_never_exceeds_ceiling(
        unit in arb_quantity(),
        extra in 0.0..500.0_f64,
        labels in prop::collection::vec(arb_label(), 0..200),
    ) {
        let ceiling = unit + extra;
        let mut engine = AccumulatingDecisionEngine::new(unit, ceiling);
        let mut held = 0.0_f64;
        for label in labels {
            let intent = engine.decide(&StepContext { timestamp: base(), label, net_size: held });
            match (intent.side(), intent.quantity()) {
                (Some(OrderSide::Buy), Some(q)) => held += q,
                (Some(OrderSide::Sell), Some(q)) => held -= q,
                _ => {}
            }
            prop_assert!(engine.cumulative_bought() <= engine.quantity_ceiling());
            prop_assert!(held >= -1e-9);
        }
    }
}

proptest! {
    #[test]
    fn every_unit_that_fits_is_bought(
        unit_micros in 1i64..5_000_000,
        fits in 1usize..12,
    ) {
        // Decimal sizes such as 0.1 with a 0.3 ceiling must yield exactly `fits` buys.
        let unit = unit_micros as f64 / 1e6;
        let ceiling = (unit_micros * fits as i64) as f64 / 1e6;
        let mut engine = AccumulatingDecisionEngine::new(unit, ceiling);
        let labels = vec![SentimentLabel::Bullish; fits + 1];
        let buys = replay(&mut engine, &labels)
            .into_iter()
            .filter(|(side, _, _)| *side == Some(OrderSide::Buy))
            .count();
        prop_assert_eq!(buys, fits);
    }
}

// ── 2. No repeated side ──────────────────────────────────────────────

proptest! {
    #[test]
    fn simple_engine_alternates_sides(
        qty in arb_quantity(),
        labels in prop::collection::vec(arb_label(), 0..200),
    ) {
        let mut engine = SimpleDecisionEngine::new(qty);
        let posted: Vec<OrderSide> = replay(&mut engine, &labels)
            .into_iter()
            .filter_map(|(side, _, _)| side)
            .collect();
        for pair in posted.windows(2) {
            prop_assert_ne!(pair[0], pair[1]);
        }
        if let Some(first) = posted.first() {
            prop_assert_eq!(*first, OrderSide::Buy);
        }
    }
}

// ── 3. Positive quantity ─────────────────────────────────────────────

proptest! {
    #[test]
    fn posted_quantities_are_positive(
        unit in arb_quantity(),
        labels in prop::collection::vec(arb_label(), 0..200),
    ) {
        let mut simple = SimpleDecisionEngine::new(unit);
        let mut acc = AccumulatingDecisionEngine::new(unit, unit * 3.0);
        for (_, qty, _) in replay(&mut simple, &labels).into_iter().chain(replay(&mut acc, &labels)) {
            if let Some(q) = qty {
                prop_assert!(q > 0.0);
            }
        }
    }
}

// ── 4. Resolution ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn resolution_is_idempotent(
        series in arb_series(),
        prev in 0i64..10_000,
        width in 0i64..2_000,
    ) {
        let previous = base() + Duration::seconds(prev);
        let current = previous + Duration::seconds(width);
        let a = SentimentWindowResolver::resolve(Some(previous), current, &series);
        let b = SentimentWindowResolver::resolve(Some(previous), current, &series);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn resolution_matches_last_in_window(
        series in arb_series(),
        prev in 0i64..10_000,
        width in 0i64..2_000,
    ) {
        let previous = base() + Duration::seconds(prev);
        let current = previous + Duration::seconds(width);
        let expected = series
            .iter()
            .filter(|o| o.timestamp > previous && o.timestamp <= current)
            .last()
            .map(|o| Resolution::Found(o.label))
            .unwrap_or(Resolution::NotFound);
        prop_assert_eq!(
            SentimentWindowResolver::resolve(Some(previous), current, &series),
            expected
        );
    }

    #[test]
    fn absent_previous_step_is_always_not_found(series in arb_series(), cur in 0i64..10_000) {
        let current = base() + Duration::seconds(cur);
        prop_assert_eq!(
            SentimentWindowResolver::resolve(None, current, &series),
            Resolution::NotFound
        );
    }
}
