//! Three-bar candlestick pattern detectors
//!
//! Patterns: Three Black Crows.
//! Roles: `bars[0..3]` the crows (newest first), `bars[3]` optional trend candle.

use std::collections::HashMap;

use super::helpers::{self, confirms_uptrend, trend_bonus};
use crate::{
  params::{get_ratio, ParamMeta, ParameterizedDetector},
  Direction, OHLCVExt, PatternDetector, PatternId, PatternMatch, QuoteContext, Ratio, Result, OHLCV,
};

// ============================================================
// THREE BLACK CROWS
// ============================================================

/// Three Black Crows - three long bearish bodies with successively lower closes
#[derive(Debug, Clone)]
pub struct ThreeBlackCrowsDetector {
  /// Minimum body / (high - low) for each crow
  pub min_body_ratio: Ratio,
}

impl Default for ThreeBlackCrowsDetector {
  fn default() -> Self {
    Self { min_body_ratio: Ratio::new_const(helpers::CROWS_MIN_BODY_RATIO) }
  }
}

impl ThreeBlackCrowsDetector {
  pub fn with_defaults() -> Self {
    Self::default()
  }

  fn is_significant<T: OHLCV>(&self, bar: &T) -> bool {
    bar.body_ratio().is_some_and(|r| r >= self.min_body_ratio.get())
  }
}

impl PatternDetector for ThreeBlackCrowsDetector {
  fn id(&self) -> PatternId {
    PatternId("THREE_BLACK_CROWS")
  }

  fn min_bars(&self) -> usize {
    3
  }

  fn detect<T: OHLCV>(&self, bars: &[T], _quote: &QuoteContext) -> Option<PatternMatch> {
    let third = bars.first()?;
    let second = bars.get(1)?;
    let first = bars.get(2)?;
    let prior = bars.get(3);

    if !first.is_bearish() || !second.is_bearish() || !third.is_bearish() {
      return None;
    }

    // Most recent close is the lowest
    if third.close() >= second.close() || second.close() >= first.close() {
      return None;
    }

    if !self.is_significant(first) || !self.is_significant(second) || !self.is_significant(third) {
      return None;
    }

    if !confirms_uptrend(prior, first.close()) {
      return None;
    }

    Some(PatternMatch {
      pattern_id:  PatternDetector::id(self),
      direction:   Direction::Bearish,
      strength:    0.8 + trend_bonus(prior),
      start_index: if prior.is_some() { 3 } else { 2 },
      end_index:   0,
    })
  }
}

impl ParameterizedDetector for ThreeBlackCrowsDetector {
  fn param_meta() -> &'static [ParamMeta] {
    static PARAMS: [ParamMeta; 1] = [ParamMeta::new(
      "min_body_ratio",
      helpers::CROWS_MIN_BODY_RATIO,
      (0.3, 0.8),
      "Minimum body share of the high-low range for each crow",
    )];
    &PARAMS
  }

  fn with_params(params: &HashMap<&str, f64>) -> Result<Self> {
    Ok(Self {
      min_body_ratio: get_ratio(params, &Self::param_meta()[0])?,
    })
  }

  fn pattern_id_str() -> &'static str {
    "THREE_BLACK_CROWS"
  }
}
