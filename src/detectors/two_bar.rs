//! Two-bar candlestick pattern detectors
//!
//! Patterns: Bearish Engulfing, Bullish Engulfing, Dark Cloud Cover.
//! Roles: `bars[0]` current, `bars[1]` previous, `bars[2]` optional trend candle.

use std::collections::HashMap;

use super::helpers::{self, confirms_downtrend, confirms_uptrend, engulf_bonus, trend_bonus};
use crate::{
    params::{get_ratio, ParamMeta, ParameterizedDetector},
    Direction, OHLCVExt, PatternDetector, PatternId, PatternMatch, QuoteContext, Ratio, Result,
    OHLCV,
};

impl_with_defaults!(
    BearishEngulfingDetector,
    BullishEngulfingDetector,
    DarkCloudCoverDetector,
);

// ============================================================
// ENGULFING PATTERNS
// ============================================================

/// Bearish Engulfing - a bearish body fully engulfs the previous bullish body after an advance
#[derive(Debug, Clone, Default)]
pub struct BearishEngulfingDetector;

impl PatternDetector for BearishEngulfingDetector {
    fn id(&self) -> PatternId {
        PatternId("BEARISH_ENGULFING")
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(&self, bars: &[T], _quote: &QuoteContext) -> Option<PatternMatch> {
        let curr = bars.first()?;
        let prev = bars.get(1)?;
        let trend = bars.get(2);

        if !prev.is_bullish() || !curr.is_bearish() {
            return None;
        }
        // Full-body engulf: opens above the previous close, closes below the previous open
        if curr.open() <= prev.close() || curr.close() >= prev.open() {
            return None;
        }
        if !confirms_uptrend(trend, prev.close()) {
            return None;
        }

        Some(PatternMatch {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Bearish,
            strength: 0.6 + engulf_bonus(curr.body(), prev.body()) + trend_bonus(trend),
            start_index: if trend.is_some() { 2 } else { 1 },
            end_index: 0,
        })
    }
}

/// Bullish Engulfing - a bullish body fully engulfs the previous bearish body after a decline
#[derive(Debug, Clone, Default)]
pub struct BullishEngulfingDetector;

impl PatternDetector for BullishEngulfingDetector {
    fn id(&self) -> PatternId {
        PatternId("BULLISH_ENGULFING")
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(&self, bars: &[T], _quote: &QuoteContext) -> Option<PatternMatch> {
        let curr = bars.first()?;
        let prev = bars.get(1)?;
        let trend = bars.get(2);

        if !prev.is_bearish() || !curr.is_bullish() {
            return None;
        }
        if curr.open() >= prev.close() || curr.close() <= prev.open() {
            return None;
        }
        if !confirms_downtrend(trend, prev.close()) {
            return None;
        }

        Some(PatternMatch {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Bullish,
            strength: 0.6 + engulf_bonus(curr.body(), prev.body()) + trend_bonus(trend),
            start_index: if trend.is_some() { 2 } else { 1 },
            end_index: 0,
        })
    }
}

// ============================================================
// DARK CLOUD COVER
// ============================================================

/// Dark Cloud Cover - opens above the previous bullish close, closes deep into its body
#[derive(Debug, Clone)]
pub struct DarkCloudCoverDetector {
    /// Share of the previous body the close must fall through (0.5 = below the midpoint)
    pub penetration: Ratio,
}

impl Default for DarkCloudCoverDetector {
    fn default() -> Self {
        Self {
            penetration: Ratio::new_const(helpers::DARK_CLOUD_PENETRATION),
        }
    }
}

impl PatternDetector for DarkCloudCoverDetector {
    fn id(&self) -> PatternId {
        PatternId("DARK_CLOUD_COVER")
    }

    fn min_bars(&self) -> usize {
        2
    }

    fn detect<T: OHLCV>(&self, bars: &[T], _quote: &QuoteContext) -> Option<PatternMatch> {
        let curr = bars.first()?;
        let prev = bars.get(1)?;
        let trend = bars.get(2);

        if !prev.is_bullish() || !curr.is_bearish() {
            return None;
        }
        if curr.open() <= prev.close() {
            return None;
        }

        // At the default 0.5 this is the previous body's midpoint
        let threshold = prev.body_midpoint() + prev.body() * (0.5 - self.penetration.get());
        if curr.close() >= threshold {
            return None;
        }
        if !confirms_uptrend(trend, prev.close()) {
            return None;
        }

        // How far into the previous body the close reached, 0..=1
        let depth = ((prev.close() - curr.close()) / prev.body()).clamp(0.0, 1.0);

        Some(PatternMatch {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Bearish,
            strength: 0.5 + 0.2 * depth + trend_bonus(trend),
            start_index: if trend.is_some() { 2 } else { 1 },
            end_index: 0,
        })
    }
}

impl ParameterizedDetector for DarkCloudCoverDetector {
    fn param_meta() -> &'static [ParamMeta] {
        static PARAMS: [ParamMeta; 1] = [ParamMeta::new(
            "penetration",
            helpers::DARK_CLOUD_PENETRATION,
            (0.3, 0.7),
            "Share of the previous body the bearish close must fall through",
        )];
        &PARAMS
    }

    fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
        Ok(Self {
            penetration: get_ratio(params, &Self::param_meta()[0])?,
        })
    }

    fn pattern_id_str() -> &'static str {
        "DARK_CLOUD_COVER"
    }
}
