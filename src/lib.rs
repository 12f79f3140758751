//! # tradedesk
//!
//! Candlestick screening and trade reconciliation for broker quote and trade feeds.
//!
//! Quote snapshots arrive as JSON, are validated at the boundary, and are screened
//! for short price-action patterns on their most-recent-first candle history.
//! Executed trade legs are reconciled BUY against SELL into realized profit/loss.
//!
//! ## Quick Start
//!
//! ```rust
//! use tradedesk::prelude::*;
//!
//! let payload = serde_json::json!([
//!     {
//!         "name": "ACME",
//!         "instrumentKey": "NSE_EQ|ACME",
//!         "percentageChange": -2.1,
//!         "high": 104.0,
//!         "low": 97.0,
//!         "data": [
//!             { "open": 103.0, "high": 104.0, "low": 97.0, "close": 98.0, "percentageChange": -2.1 },
//!             { "open": 99.0, "high": 102.5, "low": 98.5, "close": 102.0, "percentageChange": 2.9 }
//!         ]
//!     }
//! ]);
//!
//! let batch = parse_stocks(&payload).unwrap();
//! let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
//! let matches = engine.screen(&batch.stocks);
//! assert_eq!(matches[0].patterns[0].pattern_id, PatternId("BEARISH_ENGULFING"));
//! ```

pub mod detectors;
pub mod params;
pub mod session;
pub mod stock;
pub mod trade;

pub mod prelude {
    pub use crate::{
        // Detectors
        detectors::*,
        // Classifiers
        filter_call_options,
        filter_put_options,
        find_bearish_engulfing,
        find_bullish_engulfing,
        find_dark_cloud_cover,
        find_three_black_crows,
        // Parameters
        params::{get_ratio, ParamMeta, ParameterizedDetector},
        // Parallel
        screen_parallel,
        // Session state
        session::{SelectedStocks, SessionStore, Subscription},
        // Stocks
        stock::{
            continuous_streak, infer_open_price, parse_stocks, search_by_name, sort_by_streak,
            validate_stocks, Candle, MarketMovers, SortMode, StockSnapshot, StreakDirection,
            ValidatedStocks,
        },
        // Trades
        trade::{
            aggregate_metrics, compute_profit_loss, find_unmatched_buys, match_sell_to_buy,
            parse_trade_legs, LegKey, MatchRule, Metrics, ProfitLoss, Reconciler,
            ReconcilerConfig, TradeLeg, TransactionType,
        },
        // Engine
        BuiltinDetector,
        Direction,
        // Core traits
        DynPatternDetector,
        EngineBuilder,
        OHLCVExt,
        PatternDetector,
        PatternId,
        PatternMatch,
        QuoteContext,
        Ratio,
        Result,
        ScanError,
        ScreenEngine,
        StockMatches,
        // Errors
        TradeDeskError,
        OHLCV,
    };
}

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, TradeDeskError>;

/// Errors surfaced by the library.
///
/// Only [`TradeDeskError::InvalidInput`] escapes the batch entry points; per-record
/// problems are reported as [`TradeDeskError::InvalidRecord`] and counted, not raised.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TradeDeskError {
    #[error("Invalid input: expected {expected}, found {found}")]
    InvalidInput {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Invalid record field `{field}`: {reason}")]
    InvalidRecord { field: &'static str, reason: String },

    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// JSON type name used in [`TradeDeskError::InvalidInput`] messages.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Normalized value in range 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Ratio(f64);

impl Ratio {
    /// Create a new Ratio, validating the value is in [0.0, 1.0]
    pub fn new(value: f64) -> Result<Self> {
        if value.is_nan() || value.is_infinite() {
            return Err(TradeDeskError::InvalidValue(
                "Ratio cannot be NaN or infinite",
            ));
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(TradeDeskError::OutOfRange {
                field: "Ratio",
                value,
                min: 0.0,
                max: 1.0,
            });
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: f64) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }
}

impl serde::Serialize for Ratio {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Ratio {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = f64::deserialize(d)?;
        Ratio::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// OHLCV TRAITS
// ============================================================

/// One trading-period price sample as seen by the detectors.
///
/// Unlike exchange bar feeds, broker snapshots report a day-over-day
/// percentage change per candle instead of volume.
pub trait OHLCV {
    fn open(&self) -> f64;
    fn high(&self) -> f64;
    fn low(&self) -> f64;
    fn close(&self) -> f64;
    fn percentage_change(&self) -> f64;
}

/// Extension trait with computed properties for OHLCV data
pub trait OHLCVExt: OHLCV {
    #[inline]
    fn body(&self) -> f64 {
        (self.close() - self.open()).abs()
    }

    #[inline]
    fn range(&self) -> f64 {
        self.high() - self.low()
    }

    /// Midpoint of the real body
    #[inline]
    fn body_midpoint(&self) -> f64 {
        (self.open() + self.close()) / 2.0
    }

    #[inline]
    fn is_bullish(&self) -> bool {
        self.close() > self.open()
    }

    #[inline]
    fn is_bearish(&self) -> bool {
        self.close() < self.open()
    }

    /// Body as ratio of range. Returns None if range ≈ 0
    #[inline]
    fn body_ratio(&self) -> Option<f64> {
        let range = self.range();
        (range > f64::EPSILON).then(|| self.body() / range)
    }

    /// Close of the preceding period implied by this candle's percentage change.
    ///
    /// A change of -100% yields an infinite (or NaN) value; callers clamp it.
    #[inline]
    fn implied_previous_close(&self) -> f64 {
        self.close() / (1.0 + self.percentage_change() / 100.0)
    }
}

impl<T: OHLCV> OHLCVExt for T {}

// ============================================================
// PATTERN MATCH
// ============================================================

/// Unique identifier for a pattern type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct PatternId(pub &'static str);

impl std::fmt::Display for PatternId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

/// Direction/bias of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Bullish,
    Neutral,
    Bearish,
}

/// Result of pattern detection on one stock.
///
/// Indices refer to the most-recent-first candle series: `end_index` is the
/// newest candle of the pattern (normally 0), `start_index` the oldest.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PatternMatch {
    pub pattern_id: PatternId,
    pub direction: Direction,
    /// Quality/confidence score 0.0..=1.0
    pub strength: f64,
    pub start_index: usize,
    pub end_index: usize,
}

// ============================================================
// QUOTE CONTEXT
// ============================================================

/// Snapshot-level quote fields available to detectors alongside the candles.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuoteContext {
    pub high: f64,
    pub low: f64,
    pub percentage_change: f64,
}

impl From<&stock::StockSnapshot> for QuoteContext {
    fn from(stock: &stock::StockSnapshot) -> Self {
        Self {
            high: stock.high,
            low: stock.low,
            percentage_change: stock.percentage_change,
        }
    }
}

// ============================================================
// PATTERN DETECTOR TRAITS
// ============================================================

/// Generic pattern detector trait - for concrete types
///
/// `bars` is most-recent-first. The engine only calls `detect` when
/// `bars.len() >= min_bars()`, but detectors must still return `None`
/// instead of panicking on shorter input.
pub trait PatternDetector: Send + Sync {
    fn id(&self) -> PatternId;
    fn min_bars(&self) -> usize;
    fn detect<T: OHLCV>(&self, bars: &[T], quote: &QuoteContext) -> Option<PatternMatch>;

    /// Whether candles must go through open-price inference first.
    fn needs_inferred_open(&self) -> bool {
        true
    }

    fn validate_config(&self) -> Result<()> {
        Ok(())
    }
}

/// Object-safe pattern detector trait - for custom detectors
pub trait DynPatternDetector: Send + Sync {
    fn id(&self) -> PatternId;
    fn min_bars(&self) -> usize;
    fn needs_inferred_open(&self) -> bool;
    fn detect(&self, bars: &[stock::Candle], quote: &QuoteContext) -> Option<PatternMatch>;
    fn validate_config(&self) -> Result<()>;
}

impl<D: PatternDetector> DynPatternDetector for D {
    fn id(&self) -> PatternId {
        PatternDetector::id(self)
    }

    fn min_bars(&self) -> usize {
        PatternDetector::min_bars(self)
    }

    fn needs_inferred_open(&self) -> bool {
        PatternDetector::needs_inferred_open(self)
    }

    fn detect(&self, bars: &[stock::Candle], quote: &QuoteContext) -> Option<PatternMatch> {
        PatternDetector::detect(self, bars, quote)
    }

    fn validate_config(&self) -> Result<()> {
        PatternDetector::validate_config(self)
    }
}

// ============================================================
// BUILTIN DETECTORS - generated via macro
// ============================================================

use detectors::*;
use stock::{infer_open_price, Candle, StockSnapshot};

/// Macro to generate BuiltinDetector enum without boilerplate
macro_rules! define_builtin_detectors {
    (
        $(
            $variant:ident($detector:ty)
        ),* $(,)?
    ) => {
        /// All builtin detectors - fast path via enum dispatch
        #[derive(Debug, Clone)]
        pub enum BuiltinDetector {
            $($variant($detector)),*
        }

        impl BuiltinDetector {
            #[inline]
            pub fn detect<T: OHLCV>(&self, bars: &[T], quote: &QuoteContext) -> Option<PatternMatch> {
                match self {
                    $(Self::$variant(d) => PatternDetector::detect(d, bars, quote)),*
                }
            }

            #[inline]
            pub fn id(&self) -> PatternId {
                match self {
                    $(Self::$variant(d) => PatternDetector::id(d)),*
                }
            }

            #[inline]
            pub fn min_bars(&self) -> usize {
                match self {
                    $(Self::$variant(d) => PatternDetector::min_bars(d)),*
                }
            }

            #[inline]
            pub fn needs_inferred_open(&self) -> bool {
                match self {
                    $(Self::$variant(d) => PatternDetector::needs_inferred_open(d)),*
                }
            }

            pub fn validate_config(&self) -> Result<()> {
                match self {
                    $(Self::$variant(d) => PatternDetector::validate_config(d)),*
                }
            }
        }
    };
}

define_builtin_detectors! {
    // Candlestick (4)
    BearishEngulfing(BearishEngulfingDetector),
    BullishEngulfing(BullishEngulfingDetector),
    DarkCloudCover(DarkCloudCoverDetector),
    ThreeBlackCrows(ThreeBlackCrowsDetector),

    // Momentum heuristics (2)
    CallOption(CallOptionDetector),
    PutOption(PutOptionDetector),
}

// ============================================================
// SCREEN ENGINE
// ============================================================

/// Engine configuration
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub min_strength: Option<f64>,
    pub pattern_filter: Option<Vec<PatternId>>,
}

/// Patterns found on one stock
#[derive(Debug, Clone, serde::Serialize)]
pub struct StockMatches {
    pub instrument_key: String,
    pub name: String,
    pub patterns: Vec<PatternMatch>,
}

/// Screens quote snapshots against a set of detectors.
pub struct ScreenEngine {
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn DynPatternDetector>>,
    config: EngineConfig,
}

impl ScreenEngine {
    /// Detect every configured pattern on a single stock.
    ///
    /// Open inference runs at most once per stock and only when a detector needs it.
    pub fn screen_stock(&self, stock: &StockSnapshot) -> Vec<PatternMatch> {
        let quote = QuoteContext::from(stock);
        let mut inferred: Option<Vec<Candle>> = None;
        let mut results = Vec::new();

        // Fast path: builtin detectors (enum dispatch, no vtable)
        for detector in &self.builtin {
            if stock.data.len() < detector.min_bars() {
                continue;
            }
            let bars: &[Candle] = if detector.needs_inferred_open() {
                inferred.get_or_insert_with(|| infer_open_price(&stock.data))
            } else {
                &stock.data
            };
            if let Some(m) = detector.detect(bars, &quote) {
                if self.should_include(&m) {
                    results.push(m);
                }
            }
        }

        // Slow path: custom detectors (vtable)
        for detector in &self.custom {
            if stock.data.len() < detector.min_bars() {
                continue;
            }
            let bars: &[Candle] = if detector.needs_inferred_open() {
                inferred.get_or_insert_with(|| infer_open_price(&stock.data))
            } else {
                &stock.data
            };
            if let Some(m) = detector.detect(bars, &quote) {
                if self.should_include(&m) {
                    results.push(m);
                }
            }
        }

        results
    }

    /// Screen all stocks, returning only those with at least one pattern.
    pub fn screen(&self, stocks: &[StockSnapshot]) -> Vec<StockMatches> {
        stocks
            .iter()
            .filter_map(|stock| self.stock_matches(stock))
            .collect()
    }

    /// Stocks on which the given pattern fires, in input order.
    pub fn classify<'a>(&self, id: PatternId, stocks: &'a [StockSnapshot]) -> Vec<&'a StockSnapshot> {
        stocks
            .iter()
            .filter(|stock| self.screen_stock(stock).iter().any(|m| m.pattern_id == id))
            .collect()
    }

    /// Group stocks into one bucket per pattern id. A stock may land in several buckets.
    pub fn bucket<'a>(
        &self,
        stocks: &'a [StockSnapshot],
    ) -> std::collections::BTreeMap<PatternId, Vec<&'a StockSnapshot>> {
        let mut buckets: std::collections::BTreeMap<PatternId, Vec<&'a StockSnapshot>> =
            std::collections::BTreeMap::new();
        for stock in stocks {
            for m in self.screen_stock(stock) {
                buckets.entry(m.pattern_id).or_default().push(stock);
            }
        }
        buckets
    }

    /// Ids of all configured detectors
    pub fn pattern_ids(&self) -> Vec<PatternId> {
        self.builtin
            .iter()
            .map(BuiltinDetector::id)
            .chain(self.custom.iter().map(|d| d.id()))
            .collect()
    }

    fn stock_matches(&self, stock: &StockSnapshot) -> Option<StockMatches> {
        let patterns = self.screen_stock(stock);
        (!patterns.is_empty()).then(|| StockMatches {
            instrument_key: stock.instrument_key.clone(),
            name: stock.name.clone(),
            patterns,
        })
    }

    fn should_include(&self, m: &PatternMatch) -> bool {
        if let Some(min) = self.config.min_strength {
            if m.strength < min {
                return false;
            }
        }
        if let Some(ref filter) = self.config.pattern_filter {
            if !filter.contains(&m.pattern_id) {
                return false;
            }
        }
        true
    }

    fn validate(&self) -> Result<()> {
        for d in &self.builtin {
            d.validate_config()?;
        }
        for d in &self.custom {
            d.validate_config()?;
        }
        if let Some(min) = self.config.min_strength {
            Ratio::new(min).map_err(|_| {
                TradeDeskError::InvalidConfig(format!("min_strength {min} outside [0, 1]"))
            })?;
        }
        Ok(())
    }
}

// ============================================================
// CLASSIFIERS
// ============================================================

/// Stocks matching a single detector, with opens inferred when the detector needs them.
pub fn classify_with<'a, D: PatternDetector>(
    detector: &D,
    stocks: &'a [StockSnapshot],
) -> Vec<&'a StockSnapshot> {
    stocks
        .iter()
        .filter(|stock| {
            if stock.data.len() < PatternDetector::min_bars(detector) {
                return false;
            }
            let quote = QuoteContext::from(*stock);
            if PatternDetector::needs_inferred_open(detector) {
                PatternDetector::detect(detector, &infer_open_price(&stock.data), &quote).is_some()
            } else {
                PatternDetector::detect(detector, &stock.data, &quote).is_some()
            }
        })
        .collect()
}

pub fn find_bearish_engulfing(stocks: &[StockSnapshot]) -> Vec<&StockSnapshot> {
    classify_with(&BearishEngulfingDetector::default(), stocks)
}

pub fn find_bullish_engulfing(stocks: &[StockSnapshot]) -> Vec<&StockSnapshot> {
    classify_with(&BullishEngulfingDetector::default(), stocks)
}

pub fn find_three_black_crows(stocks: &[StockSnapshot]) -> Vec<&StockSnapshot> {
    classify_with(&ThreeBlackCrowsDetector::default(), stocks)
}

pub fn find_dark_cloud_cover(stocks: &[StockSnapshot]) -> Vec<&StockSnapshot> {
    classify_with(&DarkCloudCoverDetector::default(), stocks)
}

pub fn filter_call_options(stocks: &[StockSnapshot]) -> Vec<&StockSnapshot> {
    classify_with(&CallOptionDetector::default(), stocks)
}

pub fn filter_put_options(stocks: &[StockSnapshot]) -> Vec<&StockSnapshot> {
    classify_with(&PutOptionDetector::default(), stocks)
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for creating ScreenEngine instances
#[derive(Default)]
pub struct EngineBuilder {
    builtin: Vec<BuiltinDetector>,
    custom: Vec<Box<dyn DynPatternDetector>>,
    config: EngineConfig,
}

/// Generate an array of `BuiltinDetector` variants using `Default::default()` for each inner type.
macro_rules! builtin_defaults {
  ($($variant:ident),* $(,)?) => {
    [$(BuiltinDetector::$variant(Default::default())),*]
  };
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add all builtin patterns with default configurations
    pub fn with_all_defaults(self) -> Self {
        self.with_candlestick_defaults().with_momentum_defaults()
    }

    /// Add the four candlestick patterns with defaults
    pub fn with_candlestick_defaults(mut self) -> Self {
        self.builtin.extend(builtin_defaults![
            BearishEngulfing,
            BullishEngulfing,
            DarkCloudCover,
            ThreeBlackCrows,
        ]);
        self
    }

    /// Add the call/put percentage-change heuristics
    pub fn with_momentum_defaults(mut self) -> Self {
        self.builtin
            .extend(builtin_defaults![CallOption, PutOption]);
        self
    }

    /// Add a builtin detector
    #[allow(clippy::should_implement_trait)]
    pub fn add(mut self, detector: BuiltinDetector) -> Self {
        self.builtin.push(detector);
        self
    }

    /// Add with config validation
    pub fn add_checked(mut self, detector: BuiltinDetector) -> Result<Self> {
        detector.validate_config()?;
        self.builtin.push(detector);
        Ok(self)
    }

    /// Add a custom detector (slow path)
    pub fn add_custom<D: DynPatternDetector + 'static>(mut self, detector: D) -> Self {
        self.custom.push(Box::new(detector));
        self
    }

    /// Set minimum strength filter
    pub fn min_strength(mut self, strength: f64) -> Self {
        self.config.min_strength = Some(strength);
        self
    }

    /// Filter to specific patterns only
    pub fn only_patterns(mut self, ids: impl IntoIterator<Item = PatternId>) -> Self {
        self.config.pattern_filter = Some(ids.into_iter().collect());
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<ScreenEngine> {
        let engine = ScreenEngine {
            builtin: self.builtin,
            custom: self.custom,
            config: self.config,
        };
        engine.validate()?;
        Ok(engine)
    }
}

// ============================================================
// PARALLEL SCREENING
// ============================================================

use rayon::prelude::*;

/// A raw record that failed validation during parallel screening
#[derive(Debug)]
pub struct ScanError {
    /// Position of the record in the input batch
    pub index: usize,
    pub error: TradeDeskError,
}

/// Validate and screen a batch of raw JSON records in parallel.
///
/// Records failing validation are returned as errors rather than dropped, so
/// callers can report them. Output order follows input order.
pub fn screen_parallel(
    engine: &ScreenEngine,
    records: &[serde_json::Value],
) -> (Vec<StockMatches>, Vec<ScanError>) {
    let results: Vec<_> = records
        .par_iter()
        .enumerate()
        .map(|(index, record)| {
            StockSnapshot::from_value(record)
                .map(|stock| engine.stock_matches(&stock))
                .map_err(|error| ScanError { index, error })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(Some(r)) => successes.push(r),
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        tracing::debug!(
            dropped = errors.len(),
            total = records.len(),
            "skipped invalid stock records during parallel screen"
        );
    }

    (successes, errors)
}

// ============================================================
// TESTS
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candle(o: f64, h: f64, l: f64, c: f64, pct: f64) -> Candle {
        Candle::new(o, h, l, c, pct)
    }

    fn stock(key: &str, data: Vec<Candle>) -> StockSnapshot {
        StockSnapshot {
            name: key.to_string(),
            instrument_key: key.to_string(),
            percentage_change: data.first().map_or(0.0, |c| c.percentage_change),
            high: data.first().map_or(0.0, |c| c.high),
            low: data.first().map_or(0.0, |c| c.low),
            data,
        }
    }

    /// Bearish engulfing after an up day, most recent first
    fn bearish_engulfing_stock() -> StockSnapshot {
        stock(
            "BEAR",
            vec![
                candle(103.0, 104.0, 97.0, 98.0, -3.9),
                candle(99.0, 102.5, 98.5, 102.0, 2.0),
                candle(98.0, 100.5, 97.5, 100.0, 1.0),
            ],
        )
    }

    struct AlwaysDetector;

    impl PatternDetector for AlwaysDetector {
        fn id(&self) -> PatternId {
            PatternId("ALWAYS")
        }

        fn min_bars(&self) -> usize {
            1
        }

        fn detect<T: OHLCV>(&self, _bars: &[T], _quote: &QuoteContext) -> Option<PatternMatch> {
            Some(PatternMatch {
                pattern_id: PatternId("ALWAYS"),
                direction: Direction::Neutral,
                strength: 0.1,
                start_index: 0,
                end_index: 0,
            })
        }
    }

    #[test]
    fn test_ratio_validation() {
        assert!(Ratio::new(0.0).is_ok());
        assert!(Ratio::new(1.0).is_ok());
        assert!(Ratio::new(0.5).is_ok());
        assert!(Ratio::new(-0.1).is_err());
        assert!(Ratio::new(1.1).is_err());
        assert!(Ratio::new(f64::NAN).is_err());
        assert!(Ratio::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_ratio_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_value::<Ratio>(json!(0.25)).is_ok());
        assert!(serde_json::from_value::<Ratio>(json!(1.5)).is_err());
    }

    #[test]
    fn test_ohlcv_ext() {
        let bar = candle(100.0, 110.0, 90.0, 105.0, 5.0);
        assert_eq!(bar.body(), 5.0);
        assert_eq!(bar.range(), 20.0);
        assert_eq!(bar.body_midpoint(), 102.5);
        assert!(bar.is_bullish());
        assert!(!bar.is_bearish());
        assert!((bar.body_ratio().unwrap() - 0.25).abs() < 0.001);
        assert!((bar.implied_previous_close() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_engine_builder() {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
        assert_eq!(engine.pattern_ids().len(), 6);
    }

    #[test]
    fn test_invalid_min_strength_rejected() {
        let result = EngineBuilder::new().with_all_defaults().min_strength(1.5).build();
        assert!(matches!(result, Err(TradeDeskError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_screen() {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
        assert!(engine.screen(&[]).is_empty());
    }

    #[test]
    fn test_screen_bearish_engulfing() {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
        let stocks = vec![bearish_engulfing_stock()];
        let matches = engine.screen(&stocks);
        assert_eq!(matches.len(), 1);
        assert!(matches[0]
            .patterns
            .iter()
            .any(|m| m.pattern_id == PatternId("BEARISH_ENGULFING")));
    }

    #[test]
    fn test_short_history_is_excluded_not_fatal() {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
        let stocks = vec![stock("ONE", vec![candle(10.0, 11.0, 9.0, 10.5, 1.0)])];
        assert!(engine.screen(&stocks).is_empty());
    }

    #[test]
    fn test_min_strength_filter() {
        let engine = EngineBuilder::new()
            .with_all_defaults()
            .min_strength(0.99)
            .build()
            .unwrap();
        assert!(engine.screen(&[bearish_engulfing_stock()]).is_empty());
    }

    #[test]
    fn test_pattern_filter() {
        let engine = EngineBuilder::new()
            .with_all_defaults()
            .only_patterns([PatternId("BULLISH_ENGULFING")])
            .build()
            .unwrap();
        assert!(engine.screen(&[bearish_engulfing_stock()]).is_empty());
    }

    #[test]
    fn test_custom_detector() {
        let engine = EngineBuilder::new().add_custom(AlwaysDetector).build().unwrap();
        let matches = engine.screen(&[bearish_engulfing_stock()]);
        assert_eq!(matches[0].patterns[0].pattern_id, PatternId("ALWAYS"));
    }

    #[test]
    fn test_classify_and_bucket() {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
        let stocks = vec![
            bearish_engulfing_stock(),
            stock("FLAT", vec![candle(10.0, 10.0, 10.0, 10.0, 0.0); 3]),
        ];
        let bearish = engine.classify(PatternId("BEARISH_ENGULFING"), &stocks);
        assert_eq!(bearish.len(), 1);
        assert_eq!(bearish[0].instrument_key, "BEAR");

        let buckets = engine.bucket(&stocks);
        assert_eq!(buckets[&PatternId("BEARISH_ENGULFING")].len(), 1);
        assert!(!buckets.contains_key(&PatternId("BULLISH_ENGULFING")));
    }

    #[test]
    fn test_parallel_screen_matches_sequential() {
        let engine = EngineBuilder::new().with_all_defaults().build().unwrap();
        let records = vec![
            serde_json::to_value(bearish_engulfing_stock()).unwrap(),
            json!({ "name": "", "instrumentKey": "X", "percentageChange": 1.0, "high": 1.0, "low": 1.0 }),
        ];

        let (results, errors) = screen_parallel(&engine, &records);
        assert_eq!(results.len(), 1);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].index, 1);

        let sequential = engine.screen(&[bearish_engulfing_stock()]);
        assert_eq!(results[0].patterns, sequential[0].patterns);
    }
}
