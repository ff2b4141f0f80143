//! Multi-factor signal scorer.
//!
//! Six boolean conditions are evaluated for each side (RSI, MACD, volume,
//! level rejection, swing structure, immediate momentum). The side with more
//! conditions wins; ties go to the sign of the three-bar move. The scorer never
//! answers "no signal": weak cases are marked through [`QualityFlags`],
//! `forced` and `actionable`.

use tracing::debug;

use crate::domain::candle::{Candle, CandleBias};
use crate::domain::config::TradingConfiguration;
use crate::domain::error::EngineError;
use crate::domain::indicator::{
    compute_snapshot, BodySize, IndicatorSnapshot, MacdCross, RsiMomentum, TrendState,
};
use crate::domain::signal::{Direction, MomentumOverride, QualityFlags, Signal};

pub const MIN_CONFIDENCE: i32 = 20;
pub const MAX_CONFIDENCE: i32 = 95;
pub const MIN_RISK_REWARD: f64 = 0.1;
pub const MAX_RISK_REWARD: f64 = 10.0;
/// Smallest distance (percent) used for either leg of the risk/reward ratio.
pub const RISK_REWARD_FLOOR_PCT: f64 = 0.3;

const VOLUME_FILTER_RATIO: f64 = 1.2;
const VOLUME_BONUS_RATIO: f64 = 1.5;
const LOW_VOLUME_PENALTY: i32 = 20;
const HIGH_VOLUME_BONUS: i32 = 5;
const VERY_LARGE_CANDLE_PENALTY: i32 = 30;
const LARGE_CANDLE_PENALTY: i32 = 15;
const MACD_EXTREME_PCT: f64 = 0.5;

/// Conditions met on one side, with the tag for each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SideConditions {
    pub tags: Vec<&'static str>,
}

impl SideConditions {
    fn check(&mut self, met: bool, tag: &'static str) {
        if met {
            self.tags.push(tag);
        }
    }

    pub fn count(&self) -> u8 {
        self.tags.len() as u8
    }
}

pub fn short_conditions(s: &IndicatorSnapshot) -> SideConditions {
    let mut side = SideConditions::default();
    let momentum = s.rsi_momentum();

    side.check(
        s.rsi > 70.0 || (s.rsi > 60.0 && momentum == RsiMomentum::Falling),
        if s.rsi > 70.0 {
            "RSI_OVERBOUGHT"
        } else {
            "RSI_FALLING"
        },
    );
    side.check(
        s.macd_cross() == MacdCross::Bearish
            || (s.macd_pct() > MACD_EXTREME_PCT && s.macd < s.macd_previous),
        if s.macd_cross() == MacdCross::Bearish {
            "MACD_BEARISH_CROSS"
        } else {
            "MACD_TURNING_DOWN"
        },
    );
    side.check(
        s.volume_ratio > VOLUME_FILTER_RATIO
            && s.momentum.last_bias == CandleBias::Bearish
            && s.momentum.change_pct < 0.0,
        "VOLUME_SELLING",
    );
    side.check(
        s.near_resistance() && s.patterns.bearish_reversal(),
        "RESISTANCE_REJECTION",
    );
    side.check(s.structure.falling(), "LOWER_HIGHS");
    side.check(
        s.momentum.bias() == CandleBias::Bearish,
        "BEARISH_MOMENTUM",
    );
    side
}

pub fn long_conditions(s: &IndicatorSnapshot) -> SideConditions {
    let mut side = SideConditions::default();
    let momentum = s.rsi_momentum();

    side.check(
        s.rsi < 30.0 || (s.rsi < 40.0 && momentum == RsiMomentum::Rising),
        if s.rsi < 30.0 {
            "RSI_OVERSOLD"
        } else {
            "RSI_RISING"
        },
    );
    side.check(
        s.macd_cross() == MacdCross::Bullish
            || (s.macd_pct() < -MACD_EXTREME_PCT && s.macd > s.macd_previous),
        if s.macd_cross() == MacdCross::Bullish {
            "MACD_BULLISH_CROSS"
        } else {
            "MACD_TURNING_UP"
        },
    );
    side.check(
        s.volume_ratio > VOLUME_FILTER_RATIO
            && s.momentum.last_bias == CandleBias::Bullish
            && s.momentum.change_pct > 0.0,
        "VOLUME_BUYING",
    );
    side.check(
        s.near_support() && s.patterns.bullish_reversal(),
        "SUPPORT_BOUNCE",
    );
    side.check(s.structure.rising(), "HIGHER_LOWS");
    side.check(
        s.momentum.bias() == CandleBias::Bullish,
        "BULLISH_MOMENTUM",
    );
    side
}

pub fn base_confidence(conditions: u8) -> i32 {
    match conditions {
        5.. => 92,
        4 => 85,
        3 => 65,
        2 => 45,
        _ => 25,
    }
}

/// Reward distance over risk distance, both in percent of `price`.
///
/// LONG targets resistance with the stop at support; SHORT is inverted.
pub fn risk_reward(direction: Direction, price: f64, support: f64, resistance: f64) -> f64 {
    if price <= 0.0 {
        return MIN_RISK_REWARD;
    }
    let (target, stop) = match direction {
        Direction::Long => (resistance - price, price - support),
        Direction::Short => (price - support, resistance - price),
    };
    let reward = (target / price * 100.0).max(RISK_REWARD_FLOOR_PCT);
    let risk = (stop / price * 100.0).max(RISK_REWARD_FLOOR_PCT);
    clamp_risk_reward(reward / risk)
}

pub fn clamp_risk_reward(ratio: f64) -> f64 {
    if ratio.is_nan() {
        return MIN_RISK_REWARD;
    }
    ratio.clamp(MIN_RISK_REWARD, MAX_RISK_REWARD)
}

fn tie_break(change_pct: f64) -> Direction {
    if change_pct < 0.0 {
        Direction::Short
    } else {
        Direction::Long
    }
}

fn is_counter_trend(direction: Direction, trend: TrendState) -> bool {
    matches!(
        (direction, trend),
        (Direction::Long, TrendState::StrongDowntrend)
            | (Direction::Short, TrendState::StrongUptrend)
    )
}

/// Score one snapshot. Pure: the same inputs always give the same signal.
pub fn score(snapshot: &IndicatorSnapshot, config: &TradingConfiguration) -> Signal {
    let long = long_conditions(snapshot);
    let short = short_conditions(snapshot);
    let (l, s) = (long.count(), short.count());

    let mut direction = if l > s {
        Direction::Long
    } else if s > l {
        Direction::Short
    } else {
        tie_break(snapshot.momentum.change_pct)
    };
    let forced = l.max(s) < 2;

    let count_for = |d: Direction| match d {
        Direction::Long => l,
        Direction::Short => s,
    };

    let mut tags: Vec<String> = Vec::new();

    let volume_adjustment = if config.volume_filter_enabled
        && snapshot.volume_ratio < VOLUME_FILTER_RATIO
    {
        tags.push("LOW_VOLUME".to_string());
        -LOW_VOLUME_PENALTY
    } else if snapshot.volume_ratio >= VOLUME_BONUS_RATIO {
        tags.push("HIGH_VOLUME".to_string());
        HIGH_VOLUME_BONUS
    } else {
        0
    };

    let mut actionable = true;
    let mut momentum_override = None;
    let mut penalty = 0;
    let against = snapshot.momentum.last_bias == direction.opposite().favourable_bias();
    if against {
        match snapshot.momentum.body_size() {
            BodySize::VeryLarge if count_for(direction.opposite()) >= 2 => {
                momentum_override = Some(MomentumOverride::Flipped { from: direction });
                direction = direction.opposite();
                tags.push("MOMENTUM_FLIP".to_string());
            }
            BodySize::VeryLarge => {
                momentum_override = Some(MomentumOverride::Penalized);
                penalty = VERY_LARGE_CANDLE_PENALTY;
                actionable = false;
                tags.push("MOMENTUM_AGAINST".to_string());
            }
            BodySize::Large => {
                momentum_override = Some(MomentumOverride::LargeCandlePenalty);
                penalty = LARGE_CANDLE_PENALTY;
                tags.push("LARGE_CANDLE_AGAINST".to_string());
            }
            BodySize::Normal => {}
        }
    }

    let conditions_met = count_for(direction);
    let side_tags = match direction {
        Direction::Long => &long.tags,
        Direction::Short => &short.tags,
    };
    let mut indicator_tags: Vec<String> = side_tags.iter().map(|t| t.to_string()).collect();
    indicator_tags.append(&mut tags);
    if forced {
        indicator_tags.push("FORCED".to_string());
    }

    let confidence = (base_confidence(conditions_met) + volume_adjustment - penalty)
        .clamp(MIN_CONFIDENCE, MAX_CONFIDENCE) as u8;

    let price = snapshot.last_close;
    let rr = risk_reward(
        direction,
        price,
        snapshot.levels.support,
        snapshot.levels.resistance,
    );

    let counter_trend = is_counter_trend(direction, snapshot.trend());
    if counter_trend {
        indicator_tags.push("COUNTER_TREND".to_string());
    }

    let quality = QualityFlags {
        meets_min_confidence: confidence >= config.min_confidence,
        meets_min_risk_reward: rr >= config.min_risk_reward,
        passes_volume_filter: !config.volume_filter_enabled
            || snapshot.volume_ratio >= VOLUME_FILTER_RATIO,
        passes_trend_filter: !config.trend_filter_enabled || !counter_trend,
    };

    let sign = match direction {
        Direction::Long => 1.0,
        Direction::Short => -1.0,
    };
    let suggested_take_profit = config
        .take_profit_enabled
        .then(|| price * (1.0 + sign * config.take_profit_percent / 100.0));
    let suggested_stop_loss = config
        .stop_loss_enabled
        .then(|| price * (1.0 - sign * config.stop_loss_percent / 100.0));

    Signal {
        direction,
        confidence,
        conditions_met,
        long_conditions: l,
        short_conditions: s,
        risk_reward: rr,
        quality,
        actionable,
        forced,
        indicator_tags,
        reference_price: price,
        suggested_take_profit,
        suggested_stop_loss,
        short_term_bias: snapshot.momentum.bias(),
        momentum_override,
    }
}

/// Compute the snapshot for `candles` and score it.
///
/// Fails with `InsufficientData` below the minimum window; no signal is
/// produced in that case.
pub fn evaluate(
    instrument: &str,
    candles: &[Candle],
    config: &TradingConfiguration,
) -> Result<Signal, EngineError> {
    let snapshot = compute_snapshot(instrument, candles)?;
    let signal = score(&snapshot, config);
    debug!(
        instrument,
        direction = %signal.direction,
        confidence = signal.confidence,
        long = signal.long_conditions,
        short = signal.short_conditions,
        quality = signal.is_quality(),
        "signal evaluated"
    );
    Ok(signal)
}
