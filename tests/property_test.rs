//! Property tests over generated candle windows.

use proptest::prelude::*;
use trendscout::domain::candle::Candle;
use trendscout::domain::candle_store::CandleStore;
use trendscout::domain::config::TradingConfiguration;
use trendscout::domain::error::EngineError;
use trendscout::domain::indicator::MIN_CANDLES;
use trendscout::domain::scorer::{self, clamp_risk_reward};
use trendscout::domain::signal::{Direction, MomentumOverride};

const MINUTE_MS: i64 = 60_000;

/// A random walk of well-formed contiguous bars starting near 10000.
fn walk(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<Candle>> {
    prop::collection::vec((-15.0f64..15.0, 0.0f64..5.0, 1.0f64..500.0), len).prop_map(|steps| {
        let mut price = 10_000.0;
        steps
            .into_iter()
            .enumerate()
            .map(|(i, (step, wick, volume))| {
                let open = price;
                let close = open + step;
                price = close;
                Candle {
                    open_time: i as i64 * MINUTE_MS,
                    open,
                    high: open.max(close) + wick,
                    low: open.min(close) - wick,
                    close,
                    volume,
                }
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn confidence_and_risk_reward_stay_clamped(candles in walk(50..160)) {
        let signal = scorer::evaluate("BTCUSDT", &candles, &TradingConfiguration::default()).unwrap();
        prop_assert!((20..=95).contains(&signal.confidence));
        prop_assert!(signal.risk_reward >= 0.1 && signal.risk_reward <= 10.0);
        prop_assert!(signal.conditions_met <= 6);
    }

    #[test]
    fn direction_follows_the_larger_side(candles in walk(50..160)) {
        let signal = scorer::evaluate("BTCUSDT", &candles, &TradingConfiguration::default()).unwrap();
        let flipped = matches!(signal.momentum_override, Some(MomentumOverride::Flipped { .. }));
        let (l, s) = (signal.long_conditions, signal.short_conditions);
        let expected = if flipped {
            None
        } else if l > s {
            Some(Direction::Long)
        } else if s > l {
            Some(Direction::Short)
        } else {
            None
        };
        if let Some(direction) = expected {
            prop_assert_eq!(signal.direction, direction);
        }
        let chosen = match signal.direction {
            Direction::Long => l,
            Direction::Short => s,
        };
        prop_assert_eq!(signal.conditions_met, chosen);
        prop_assert_eq!(signal.forced, l.max(s) < 2);
    }

    #[test]
    fn evaluation_is_idempotent(candles in walk(50..120)) {
        let config = TradingConfiguration::default();
        let a = scorer::evaluate("BTCUSDT", &candles, &config).unwrap();
        let b = scorer::evaluate("BTCUSDT", &candles, &config).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn short_windows_never_produce_a_signal(candles in walk(0..50)) {
        let result = scorer::evaluate("BTCUSDT", &candles, &TradingConfiguration::default());
        let is_insufficient = matches!(
            result,
            Err(EngineError::InsufficientData { need: MIN_CANDLES, .. })
        );
        prop_assert!(is_insufficient);
    }

    #[test]
    fn clamped_risk_reward_is_in_range(ratio in prop::num::f64::ANY) {
        let clamped = clamp_risk_reward(ratio);
        prop_assert!((0.1..=10.0).contains(&clamped));
    }

    #[test]
    fn store_keeps_the_newest_bars(candles in walk(1..300), capacity in 0usize..250) {
        let mut store = CandleStore::new("BTCUSDT", MINUTE_MS, capacity);
        for c in &candles {
            store.append(*c).unwrap();
        }
        let expected = candles.len().min(capacity.max(MIN_CANDLES));
        prop_assert_eq!(store.len(), expected);
        prop_assert_eq!(store.last(), candles.last());
        prop_assert!(store.window().windows(2).all(|w| w[1].open_time - w[0].open_time == MINUTE_MS));
    }

    #[test]
    fn batch_ingest_is_idempotent(candles in walk(1..120)) {
        let mut store = CandleStore::new("BTCUSDT", MINUTE_MS, 200);
        store.ingest(&candles).unwrap();
        let before = store.window().to_vec();
        let report = store.ingest(&candles).unwrap();
        prop_assert_eq!(report.appended, 0);
        prop_assert_eq!(report.already_stored, candles.len());
        prop_assert_eq!(store.window(), &before[..]);
    }
}
