//! Quote snapshots, candles and the operations that prepare them for screening.
//!
//! Snapshots arrive as loosely-shaped JSON. [`StockSnapshot::from_value`] is the
//! single validation point; batch helpers drop failing records and count them.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::detectors::helpers::{OPEN_DISCOUNT_UP_DAY, OPEN_PREMIUM_DOWN_DAY};
use crate::{json_kind, OHLCVExt, Result, TradeDeskError, OHLCV};

// ============================================================
// CANDLE
// ============================================================

/// One trading-period price sample. `open == 0.0` means the feed did not report it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candle {
    /// Feed timestamp: date text, or epoch milliseconds kept as decimal text.
    #[serde(
        default,
        deserialize_with = "timestamp_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub date: Option<String>,
    #[serde(default)]
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub percentage_change: f64,
}

impl Candle {
    pub fn new(open: f64, high: f64, low: f64, close: f64, percentage_change: f64) -> Self {
        Self {
            date: None,
            open,
            high,
            low,
            close,
            percentage_change,
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    #[inline]
    pub fn has_open(&self) -> bool {
        self.open != 0.0
    }
}

fn timestamp_text<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<String>, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected timestamp string or number, found {}",
            json_kind(&other)
        ))),
    }
}

impl OHLCV for Candle {
    fn open(&self) -> f64 {
        self.open
    }

    fn high(&self) -> f64 {
        self.high
    }

    fn low(&self) -> f64 {
        self.low
    }

    fn close(&self) -> f64 {
        self.close
    }

    fn percentage_change(&self) -> f64 {
        self.percentage_change
    }
}

// ============================================================
// STOCK SNAPSHOT
// ============================================================

/// A tradable instrument's current quote plus its recent candles, most recent first.
///
/// Deserializing goes through [`StockSnapshot::from_value`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "Value")]
pub struct StockSnapshot {
    pub name: String,
    pub instrument_key: String,
    pub percentage_change: f64,
    pub high: f64,
    pub low: f64,
    #[serde(default)]
    pub data: Vec<Candle>,
}

impl StockSnapshot {
    /// Validate one raw record.
    ///
    /// Requires a non-empty string `name`, an `instrumentKey` that is a
    /// non-empty string or a non-zero number, and numeric `percentageChange`,
    /// `high`, `low`. Booleans, objects and arrays are not keys even where a
    /// JavaScript feed would treat them as truthy.
    /// The candle history is lenient: a missing or non-array `data` yields no
    /// candles, and the series is cut at the first malformed candle so the
    /// most-recent-first prefix stays intact.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| TradeDeskError::InvalidRecord {
            field: "record",
            reason: format!("expected object, found {}", json_kind(value)),
        })?;

        let name = match obj.get("name") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::String(_)) => return Err(invalid("name", "empty string")),
            other => return Err(invalid("name", kind_of(other))),
        };

        let instrument_key = match obj.get("instrumentKey") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) if n.as_f64().is_some_and(|v| v != 0.0) => n.to_string(),
            other => return Err(invalid("instrumentKey", kind_of(other))),
        };

        let percentage_change = number_field(obj, "percentageChange")?;
        let high = number_field(obj, "high")?;
        let low = number_field(obj, "low")?;

        let data = match obj.get("data") {
            Some(Value::Array(items)) => parse_candles(items),
            _ => Vec::new(),
        };

        Ok(Self {
            name,
            instrument_key,
            percentage_change,
            high,
            low,
            data,
        })
    }

    /// Consecutive leading candles moving in `direction`.
    pub fn streak(&self, direction: StreakDirection) -> usize {
        continuous_streak(&self.data, direction)
    }
}

impl TryFrom<Value> for StockSnapshot {
    type Error = TradeDeskError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(&value)
    }
}

fn invalid(field: &'static str, reason: &str) -> TradeDeskError {
    TradeDeskError::InvalidRecord {
        field,
        reason: reason.to_string(),
    }
}

fn kind_of(value: Option<&Value>) -> &'static str {
    value.map_or("missing", json_kind)
}

fn number_field(obj: &serde_json::Map<String, Value>, field: &'static str) -> Result<f64> {
    match obj.get(field) {
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| invalid(field, "number out of f64 range")),
        other => Err(invalid(field, kind_of(other))),
    }
}

fn parse_candles(items: &[Value]) -> Vec<Candle> {
    let mut candles = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        match Candle::deserialize(item) {
            Ok(candle) => candles.push(candle),
            Err(e) => {
                tracing::debug!(index, error = %e, "truncating candle series at malformed entry");
                break;
            }
        }
    }
    candles
}

// ============================================================
// BATCH VALIDATION
// ============================================================

/// Outcome of validating a batch: the accepted snapshots and how many were dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedStocks {
    pub stocks: Vec<StockSnapshot>,
    pub dropped: usize,
}

/// Keep the records that pass [`StockSnapshot::from_value`], in input order.
pub fn validate_stocks(records: &[Value]) -> ValidatedStocks {
    let mut out = ValidatedStocks {
        stocks: Vec::with_capacity(records.len()),
        dropped: 0,
    };
    for (index, record) in records.iter().enumerate() {
        match StockSnapshot::from_value(record) {
            Ok(stock) => out.stocks.push(stock),
            Err(e) => {
                tracing::debug!(index, error = %e, "dropping invalid stock record");
                out.dropped += 1;
            }
        }
    }
    if out.dropped > 0 {
        tracing::debug!(
            kept = out.stocks.len(),
            dropped = out.dropped,
            "validated stock batch"
        );
    }
    out
}

/// Validate a JSON collection of stock records. Fails only when `value` is not an array.
pub fn parse_stocks(value: &Value) -> Result<ValidatedStocks> {
    match value {
        Value::Array(records) => Ok(validate_stocks(records)),
        other => Err(TradeDeskError::InvalidInput {
            expected: "array",
            found: json_kind(other),
        }),
    }
}

/// Gainers and losers lists from the companion backend payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MarketMovers {
    pub gainers: ValidatedStocks,
    pub losers: ValidatedStocks,
}

impl MarketMovers {
    /// Parse `{ "gainers": [...], "losers": [...] }`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let field = |name: &str| parse_stocks(value.get(name).unwrap_or(&Value::Null));
        Ok(Self {
            gainers: field("gainers")?,
            losers: field("losers")?,
        })
    }

    /// Search both lists and order them for display.
    ///
    /// Gainers rank by positive streak, losers by negative streak.
    pub fn view(&self, query: &str, mode: SortMode) -> (Vec<&StockSnapshot>, Vec<&StockSnapshot>) {
        let mut gainers = search_by_name(&self.gainers.stocks, query);
        let mut losers = search_by_name(&self.losers.stocks, query);
        if mode == SortMode::ContinuousChange {
            sort_by_streak(&mut gainers, StreakDirection::Positive);
            sort_by_streak(&mut losers, StreakDirection::Negative);
        }
        (gainers, losers)
    }
}

// ============================================================
// STREAKS
// ============================================================

/// Sign a streak counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreakDirection {
    Positive,
    Negative,
}

impl StreakDirection {
    #[inline]
    fn matches(self, change: f64) -> bool {
        match self {
            StreakDirection::Positive => change > 0.0,
            StreakDirection::Negative => change < 0.0,
        }
    }
}

/// Count leading candles whose change has the requested sign.
///
/// A zero change ends the streak. Empty input yields 0.
pub fn continuous_streak<T: OHLCV>(candles: &[T], direction: StreakDirection) -> usize {
    candles
        .iter()
        .take_while(|c| direction.matches(c.percentage_change()))
        .count()
}

// ============================================================
// SEARCH & SORT
// ============================================================

/// Ordering applied to movers lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortMode {
    /// Keep feed order
    #[default]
    Default,
    /// Longest streak first
    ContinuousChange,
}

/// Case-insensitive substring match on name. A blank query keeps everything.
pub fn search_by_name<'a>(stocks: &'a [StockSnapshot], query: &str) -> Vec<&'a StockSnapshot> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return stocks.iter().collect();
    }
    stocks
        .iter()
        .filter(|s| s.name.to_lowercase().contains(&needle))
        .collect()
}

/// Stable sort, longest streak in `direction` first.
pub fn sort_by_streak(stocks: &mut [&StockSnapshot], direction: StreakDirection) {
    stocks.sort_by_cached_key(|s| std::cmp::Reverse(s.streak(direction)));
}

// ============================================================
// OPEN-PRICE INFERENCE
// ============================================================

/// Fill in unreported opens (`open == 0.0`) with a directionally consistent estimate.
///
/// This is a heuristic so engulfing math has something to work with, not a
/// reconstruction of the real open:
///
/// - oldest candle with a newer neighbour: the neighbour's implied previous
///   close, clamped into this candle's `[low, high]`;
/// - oldest candle alone: the close;
/// - any other candle: from its own implied previous close, pulled just below
///   it on up days (capped at the close) and just above it on down days
///   (capped at the high).
///
/// Candles that already carry an open are returned unchanged.
pub fn infer_open_price(candles: &[Candle]) -> Vec<Candle> {
    let last = candles.len().saturating_sub(1);
    candles
        .iter()
        .enumerate()
        .map(|(index, candle)| {
            if candle.has_open() {
                return candle.clone();
            }

            let open = if index == last {
                match index.checked_sub(1).and_then(|i| candles.get(i)) {
                    Some(newer) => newer
                        .implied_previous_close()
                        .max(candle.low)
                        .min(candle.high),
                    None => candle.close,
                }
            } else {
                let prev_close = candle.implied_previous_close();
                if candle.percentage_change > 0.0 {
                    (prev_close * OPEN_DISCOUNT_UP_DAY)
                        .max(candle.low)
                        .min(candle.close)
                } else {
                    (prev_close * OPEN_PREMIUM_DOWN_DAY)
                        .max(candle.close)
                        .min(candle.high)
                }
            };

            Candle {
                open,
                ..candle.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pct(change: f64) -> Candle {
        Candle::new(10.0, 11.0, 9.0, 10.0, change)
    }

    fn record(name: Value, key: Value) -> Value {
        json!({
            "name": name,
            "instrumentKey": key,
            "percentageChange": 1.2,
            "high": 10.0,
            "low": 9.0,
            "data": []
        })
    }

    #[test]
    fn test_validate_accepts_well_formed_record() {
        let batch = validate_stocks(&[record(json!("ACME"), json!("NSE_EQ|ACME"))]);
        assert_eq!(batch.stocks.len(), 1);
        assert_eq!(batch.dropped, 0);
        assert_eq!(batch.stocks[0].instrument_key, "NSE_EQ|ACME");
    }

    #[test]
    fn test_validate_drops_and_counts() {
        let records = vec![
            record(json!(""), json!("K")),
            record(json!(42), json!("K")),
            record(json!("ACME"), json!("")),
            record(json!("ACME"), json!(0)),
            record(json!("ACME"), Value::Null),
            record(json!("ACME"), json!(true)),
            record(json!("ACME"), json!({ "exchange": "NSE" })),
            record(json!("ACME"), json!(["NSE_EQ|ACME"])),
            json!({ "name": "ACME", "instrumentKey": "K", "percentageChange": "1.2", "high": 1.0, "low": 1.0 }),
            json!({ "name": "ACME", "instrumentKey": "K", "percentageChange": 1.2, "low": 1.0 }),
            json!("not a record"),
            record(json!("ACME"), json!(123)),
        ];
        let batch = validate_stocks(&records);
        assert_eq!(batch.dropped, 11);
        assert_eq!(batch.stocks.len(), 1);
        assert_eq!(batch.stocks[0].instrument_key, "123");
    }

    #[test]
    fn test_parse_stocks_rejects_non_array() {
        let err = parse_stocks(&json!({ "data": [] })).unwrap_err();
        assert_eq!(
            err,
            TradeDeskError::InvalidInput {
                expected: "array",
                found: "object"
            }
        );
    }

    #[test]
    fn test_malformed_candle_truncates_series() {
        let value = json!({
            "name": "ACME",
            "instrumentKey": "K",
            "percentageChange": 1.0,
            "high": 10.0,
            "low": 9.0,
            "data": [
                { "high": 10.0, "low": 9.0, "close": 9.5, "percentageChange": 1.0 },
                { "high": 10.0, "low": 9.0 },
                { "high": 10.0, "low": 9.0, "close": 9.1, "percentageChange": -1.0 }
            ]
        });
        let stock = StockSnapshot::from_value(&value).unwrap();
        assert_eq!(stock.data.len(), 1);
        assert_eq!(stock.data[0].open, 0.0);
    }

    #[test]
    fn test_epoch_dates_keep_the_series() {
        // Opens unreported, most recent first; inference yields a bearish engulfing
        let value = json!([{
            "name": "ACME",
            "instrumentKey": "NSE_EQ|ACME",
            "percentageChange": -4.0,
            "high": 104.0,
            "low": 97.5,
            "data": [
                { "date": 1_736_380_800_000u64, "open": 0, "high": 104.0, "low": 97.5, "close": 98.0, "percentageChange": -4.0 },
                { "date": "2025-01-08", "open": 0, "high": 103.0, "low": 99.0, "close": 102.5, "percentageChange": 2.5 }
            ]
        }]);
        let batch = parse_stocks(&value).unwrap();
        let stock = &batch.stocks[0];
        assert_eq!(stock.data.len(), 2);
        assert_eq!(stock.data[0].date.as_deref(), Some("1736380800000"));
        assert_eq!(stock.data[1].date.as_deref(), Some("2025-01-08"));
        assert_eq!(crate::find_bearish_engulfing(&batch.stocks).len(), 1);

        // A date that is neither still cuts the series there
        let bad = json!({ "date": true, "high": 1.0, "low": 1.0, "close": 1.0 });
        assert!(Candle::deserialize(&bad).is_err());
    }

    #[test]
    fn test_deserialize_goes_through_validation() {
        let ok: StockSnapshot =
            serde_json::from_value(record(json!("ACME"), json!("NSE_EQ|ACME"))).unwrap();
        assert_eq!(ok, StockSnapshot::from_value(&record(json!("ACME"), json!("NSE_EQ|ACME"))).unwrap());

        let err = serde_json::from_value::<StockSnapshot>(record(json!(""), json!("K")));
        assert!(err.is_err());
        let err = serde_json::from_value::<StockSnapshot>(record(json!("ACME"), json!(0)));
        assert!(err.is_err());
    }

    #[test]
    fn test_streaks() {
        let empty: Vec<Candle> = Vec::new();
        assert_eq!(continuous_streak(&empty, StreakDirection::Positive), 0);

        let candles = vec![pct(2.0), pct(3.0), pct(-1.0)];
        assert_eq!(continuous_streak(&candles, StreakDirection::Positive), 2);
        assert_eq!(continuous_streak(&candles, StreakDirection::Negative), 0);

        let stalled = vec![pct(-1.0), pct(0.0), pct(-2.0)];
        assert_eq!(continuous_streak(&stalled, StreakDirection::Negative), 1);
    }

    #[test]
    fn test_infer_leaves_known_opens_untouched() {
        let candles = vec![pct(1.0), pct(-1.0)];
        assert_eq!(infer_open_price(&candles), candles);
    }

    #[test]
    fn test_infer_single_candle_uses_close() {
        let candles = vec![Candle::new(0.0, 11.0, 9.0, 10.0, 2.0)];
        assert_eq!(infer_open_price(&candles)[0].open, 10.0);
    }

    #[test]
    fn test_infer_oldest_from_newer_neighbour() {
        // Newer candle closed at 110 after +10% -> implied previous close 100
        let candles = vec![
            Candle::new(105.0, 111.0, 104.0, 110.0, 10.0),
            Candle::new(0.0, 101.0, 97.0, 99.0, -1.0),
        ];
        let inferred = infer_open_price(&candles);
        assert!((inferred[1].open - 100.0).abs() < 1e-9);

        // Clamped into the candle's range
        let narrow = vec![
            Candle::new(105.0, 111.0, 104.0, 110.0, 10.0),
            Candle::new(0.0, 99.5, 97.0, 99.0, -1.0),
        ];
        assert_eq!(infer_open_price(&narrow)[1].open, 99.5);
    }

    #[test]
    fn test_infer_up_and_down_days() {
        // Up day: prev close 100, biased to 99.5
        let up = vec![
            Candle::new(0.0, 111.0, 95.0, 110.0, 10.0),
            Candle::new(98.0, 101.0, 97.0, 100.0, 0.5),
        ];
        assert!((infer_open_price(&up)[0].open - 99.5).abs() < 1e-9);

        // Down day: prev close 100, biased to 100.5 but capped at the high
        let down = vec![
            Candle::new(0.0, 100.2, 89.0, 90.0, -10.0),
            Candle::new(98.0, 101.0, 97.0, 100.0, 0.5),
        ];
        assert!((infer_open_price(&down)[0].open - 100.2).abs() < 1e-9);
    }

    #[test]
    fn test_search_and_sort() {
        let mut a = StockSnapshot::from_value(&record(json!("Alpha Steel"), json!("A"))).unwrap();
        a.data = vec![pct(1.0), pct(-1.0)];
        let mut b = StockSnapshot::from_value(&record(json!("Beta Power"), json!("B"))).unwrap();
        b.data = vec![pct(1.0), pct(2.0), pct(3.0)];
        let stocks = vec![a, b];

        assert_eq!(search_by_name(&stocks, "  steel ").len(), 1);
        assert_eq!(search_by_name(&stocks, "   ").len(), 2);

        let mut view = search_by_name(&stocks, "");
        sort_by_streak(&mut view, StreakDirection::Positive);
        assert_eq!(view[0].instrument_key, "B");
    }

    #[test]
    fn test_market_movers() {
        let payload = json!({
            "gainers": [record(json!("Alpha"), json!("A"))],
            "losers": [record(json!("Beta"), json!("B")), json!(null)]
        });
        let movers = MarketMovers::from_value(&payload).unwrap();
        assert_eq!(movers.gainers.stocks.len(), 1);
        assert_eq!(movers.losers.dropped, 1);

        let (gainers, losers) = movers.view("beta", SortMode::ContinuousChange);
        assert!(gainers.is_empty());
        assert_eq!(losers.len(), 1);

        assert!(MarketMovers::from_value(&json!({ "gainers": [] })).is_err());
    }
}
