//! Property tests for the paper broker and the bar loop.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use sentilab_core::domain::{Kline, KlineInterval, SentimentLabel, SentimentObservation};
use sentilab_core::execution::ExecutionBoundary;
use sentilab_core::sentiment::SentimentSeries;
use sentilab_runner::config::BacktestConfig;
use sentilab_runner::data_loader::{compute_dataset_hash, LoadedKlines};
use sentilab_runner::paper::PaperBroker;
use sentilab_runner::runner::run_backtest;

// ── Strategies (proptest) ────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Action {
    Buy(f64),
    Sell(f64),
    Close,
    Wait,
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        (0.1..5.0f64).prop_map(Action::Buy),
        (0.1..5.0f64).prop_map(Action::Sell),
        Just(Action::Close),
        Just(Action::Wait),
    ]
}

fn arb_prices(n: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(50.0..150.0f64, n)
}

fn arb_label() -> impl Strategy<Value = SentimentLabel> {
    prop_oneof![
        Just(SentimentLabel::Bullish),
        Just(SentimentLabel::Bearish),
        Just(SentimentLabel::Unknown),
    ]
}

fn bar(i: usize, price: f64) -> Kline {
    Kline {
        open_time: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i as i64),
        open: price,
        high: price,
        low: price,
        close: price,
        volume: 1.0,
    }
}

// ── Properties ───────────────────────────────────────────────────────

proptest! {
    #[test]
    fn broker_never_goes_short_or_overdrawn(
        actions in prop::collection::vec(arb_action(), 1..60),
        prices in arb_prices(61),
        commission in 0.0..0.01f64,
    ) {
        let mut broker = PaperBroker::new(500.0, commission);
        for (i, action) in actions.iter().enumerate() {
            broker.on_bar_open(&bar(i, prices[i]));
            match *action {
                Action::Buy(q) => broker.submit_buy(q),
                Action::Sell(q) => broker.submit_sell(q),
                Action::Close => broker.close_position(),
                Action::Wait => {}
            }
            prop_assert!(broker.position() >= 0.0);
            prop_assert!(broker.cash() >= -1e-6);
        }
    }

    #[test]
    fn frictionless_pnl_reconciles_with_cash(
        actions in prop::collection::vec(arb_action(), 1..60),
        prices in arb_prices(61),
    ) {
        let mut broker = PaperBroker::new(10_000.0, 0.0);
        for (i, action) in actions.iter().enumerate() {
            broker.on_bar_open(&bar(i, prices[i]));
            match *action {
                Action::Buy(q) => broker.submit_buy(q),
                Action::Sell(q) => broker.submit_sell(q),
                Action::Close => broker.close_position(),
                Action::Wait => {}
            }
        }
        let last = prices[actions.len()];
        broker.close_position();
        broker.on_bar_open(&bar(actions.len(), last));

        let realized: f64 = broker.trades().iter().map(|t| t.net_pnl).sum();
        prop_assert!((broker.cash() - 10_000.0 - realized).abs() < 1e-6);
        prop_assert_eq!(broker.position(), 0.0);
    }

    #[test]
    fn accumulating_run_never_holds_more_than_ceiling(
        labels in prop::collection::vec(arb_label(), 1..80),
        ceiling_units in 1u32..6,
    ) {
        let n = labels.len() + 1;
        let klines: Vec<Kline> = (0..n).map(|i| bar(i, 100.0)).collect();
        let series = SentimentSeries::new(
            labels
                .iter()
                .enumerate()
                .map(|(i, &l)| SentimentObservation::new(bar(i, 0.0).open_time + Duration::minutes(30), l))
                .collect(),
        );
        let config = BacktestConfig::from_toml(&format!(
            r#"
[backtest]
symbol = "BTCUSDT"
kline_interval = "1h"
start_date = "2023-01-01"
end_date = "2023-01-04"
start_balance = 1000000.0

[strategy]
kind = "accumulating"
order_quantity = 1.0
total_quantity_limit = {ceiling_units}.0
sentiment_data = "unused.csv"
"#
        ))
        .unwrap();
        let data = LoadedKlines {
            symbol: "BTCUSDT".into(),
            interval: KlineInterval::H1,
            dataset_hash: compute_dataset_hash("BTCUSDT", &klines),
            klines,
            has_synthetic: false,
            missing_days: Vec::new(),
        };

        let result = run_backtest(&config, &data, series).unwrap();
        let held = result.open_position.map(|p| p.quantity).unwrap_or(0.0);
        prop_assert!(held <= ceiling_units as f64 + 1e-9);
        prop_assert_eq!(result.intents.buy + result.intents.sell + result.intents.skip, n);
        prop_assert_eq!(result.rejected_orders, 0);
    }
}
