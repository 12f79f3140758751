//! Percentage-change momentum heuristics
//!
//! These read the raw, broker-reported `percentage_change` of the three most
//! recent candles and never need inferred opens.

use super::helpers::all_negative;
use crate::{Direction, PatternDetector, PatternId, PatternMatch, QuoteContext, OHLCV};

impl_with_defaults!(CallOptionDetector, PutOptionDetector);

/// Three straight down days while the session high still trades above the
/// close of three days ago. Flags a candidate for buying calls into a rebound.
#[derive(Debug, Clone, Default)]
pub struct CallOptionDetector;

impl PatternDetector for CallOptionDetector {
    fn id(&self) -> PatternId {
        PatternId("CALL_OPTION")
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn needs_inferred_open(&self) -> bool {
        false
    }

    fn detect<T: OHLCV>(&self, bars: &[T], quote: &QuoteContext) -> Option<PatternMatch> {
        let oldest = bars.get(2)?;
        let changes = [
            bars[0].percentage_change(),
            bars[1].percentage_change(),
            oldest.percentage_change(),
        ];

        if quote.high <= oldest.close() || !all_negative(&changes) {
            return None;
        }

        Some(PatternMatch {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Bullish,
            strength: 0.5,
            start_index: 2,
            end_index: 0,
        })
    }
}

/// Two down days, the latest sharper than the one before, following an up day
/// larger in magnitude than the middle decline.
#[derive(Debug, Clone, Default)]
pub struct PutOptionDetector;

impl PatternDetector for PutOptionDetector {
    fn id(&self) -> PatternId {
        PatternId("PUT_OPTION")
    }

    fn min_bars(&self) -> usize {
        3
    }

    fn needs_inferred_open(&self) -> bool {
        false
    }

    fn detect<T: OHLCV>(&self, bars: &[T], _quote: &QuoteContext) -> Option<PatternMatch> {
        let third = bars.get(2)?.percentage_change();
        let first = bars[0].percentage_change();
        let second = bars[1].percentage_change();

        let matched = first < 0.0
            && second < 0.0
            && third > 0.0
            && first < second
            && third.abs() > second.abs();
        if !matched {
            return None;
        }

        Some(PatternMatch {
            pattern_id: PatternDetector::id(self),
            direction: Direction::Bearish,
            strength: 0.5,
            start_index: 2,
            end_index: 0,
        })
    }
}
