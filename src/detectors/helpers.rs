//! Common helper functions for pattern detection
//!
//! Thresholds and trend checks shared across all detector modules.

use crate::OHLCV;

// ============================================================
// THRESHOLDS
// ============================================================

/// Each crow's body must cover at least this share of its high-low range
pub const CROWS_MIN_BODY_RATIO: f64 = 0.5;
/// Dark cloud close must fall below this share of the previous body (0.5 = midpoint)
pub const DARK_CLOUD_PENETRATION: f64 = 0.5;
/// Inferred open on an up day sits this factor below the implied previous close
pub const OPEN_DISCOUNT_UP_DAY: f64 = 0.995;
/// Inferred open on a down day sits this factor above the implied previous close
pub const OPEN_PREMIUM_DOWN_DAY: f64 = 1.005;
/// Strength added when a trend candle exists and confirms the prior move
pub const TREND_CONFIRMED_BONUS: f64 = 0.1;

// ============================================================
// TREND CHECKS
// ============================================================

/// Prior uptrend: the trend candle closed below `close`. A missing trend candle passes.
#[inline]
pub fn confirms_uptrend<T: OHLCV>(trend: Option<&T>, close: f64) -> bool {
    trend.map_or(true, |t| t.close() < close)
}

/// Prior downtrend: the trend candle closed above `close`. A missing trend candle passes.
#[inline]
pub fn confirms_downtrend<T: OHLCV>(trend: Option<&T>, close: f64) -> bool {
    trend.map_or(true, |t| t.close() > close)
}

/// Bonus for a trend confirmed by data rather than by absence of data.
#[inline]
pub fn trend_bonus<T: OHLCV>(trend: Option<&T>) -> f64 {
    if trend.is_some() {
        TREND_CONFIRMED_BONUS
    } else {
        0.0
    }
}

/// Strength bonus (0.0..=0.2) for how far the engulfing body exceeds the engulfed one.
#[inline]
pub fn engulf_bonus(engulfing_body: f64, engulfed_body: f64) -> f64 {
    if engulfed_body <= f64::EPSILON {
        return 0.2;
    }
    let excess = engulfing_body / engulfed_body - 1.0;
    (excess / 2.0).clamp(0.0, 1.0) * 0.2
}

/// True when every value is strictly negative.
#[inline]
pub fn all_negative(changes: &[f64]) -> bool {
    changes.iter().all(|c| *c < 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stock::Candle;

    #[test]
    fn test_missing_trend_passes_both_checks() {
        assert!(confirms_uptrend::<Candle>(None, 10.0));
        assert!(confirms_downtrend::<Candle>(None, 10.0));
        assert_eq!(trend_bonus::<Candle>(None), 0.0);
    }

    #[test]
    fn test_trend_checks_are_strict() {
        let trend = Candle::new(9.0, 10.5, 8.5, 10.0, 0.0);
        assert!(confirms_uptrend(Some(&trend), 10.5));
        assert!(!confirms_uptrend(Some(&trend), 10.0));
        assert!(confirms_downtrend(Some(&trend), 9.5));
        assert!(!confirms_downtrend(Some(&trend), 10.0));
    }

    #[test]
    fn test_engulf_bonus_bounds() {
        assert_eq!(engulf_bonus(1.0, 1.0), 0.0);
        assert!((engulf_bonus(2.0, 1.0) - 0.1).abs() < 1e-12);
        assert_eq!(engulf_bonus(10.0, 1.0), 0.2);
        assert_eq!(engulf_bonus(1.0, 0.0), 0.2);
    }
}
