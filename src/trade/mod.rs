//! Executed trade legs and their reconciliation into realized profit/loss.
//!
//! Legs come from the broker's trade history as snake_case JSON. A SELL leg is
//! paired with BUY legs sharing its [`LegKey`]; how strictly is set by
//! [`MatchRule`].

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{json_kind, Result, TradeDeskError};

pub mod history;
pub mod metrics;
pub mod positions;
pub mod reconcile;

pub use history::{scrips, OrderHistoryQuery, SortOrder, TransactionFilter};
pub use metrics::{aggregate_metrics, aggregate_metrics_with, DailyValue, Metrics};
pub use positions::{
    summarize_daily, BrokerPosition, ClosedPosition, DailyTotals, DailyTradeSummary, PositionBook,
};
pub use reconcile::{
    compute_profit_loss, find_unmatched_buys, match_sell_to_buy, LotFill, OpenLot, ProfitLoss,
    RealizedTrade, Reconciler, ReconcilerConfig, Reconciliation,
};

// ============================================================
// TRADE LEG
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    #[serde(alias = "buy", alias = "Buy")]
    Buy,
    #[serde(alias = "sell", alias = "Sell")]
    Sell,
}

/// One executed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeLeg {
    #[serde(default, deserialize_with = "string_or_number")]
    pub trade_id: String,
    pub transaction_type: TransactionType,
    #[serde(deserialize_with = "string_or_number")]
    pub instrument_token: String,
    #[serde(default, deserialize_with = "number_or_numeric_string")]
    pub strike_price: f64,
    #[serde(default, deserialize_with = "string_or_number")]
    pub expiry: String,
    #[serde(default)]
    pub option_type: String,
    pub quantity: u64,
    pub price: f64,
    /// Expected to be about `price * quantity`; taken as reported.
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub trade_date: String,
    #[serde(default)]
    pub scrip_name: String,
    #[serde(default)]
    pub symbol: String,
}

impl TradeLeg {
    #[inline]
    pub fn is_buy(&self) -> bool {
        self.transaction_type == TransactionType::Buy
    }

    #[inline]
    pub fn is_sell(&self) -> bool {
        self.transaction_type == TransactionType::Sell
    }

    /// Calendar day of the trade, if `trade_date` is recognisable.
    pub fn trade_day(&self) -> Option<NaiveDate> {
        parse_trade_day(&self.trade_date)
    }
}

/// Accepts `YYYY-MM-DD`, `DD-MM-YYYY` and ISO timestamps.
pub fn parse_trade_day(date: &str) -> Option<NaiveDate> {
    let date = date.trim();
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date, "%d-%m-%Y"))
        .ok()
        .or_else(|| {
            date.get(..10)
                .and_then(|day| NaiveDate::parse_from_str(day, "%Y-%m-%d").ok())
        })
}

/// Chronological ordering for trade dates; unparseable dates sort last, by text.
pub(crate) fn date_order(date: &str) -> (bool, Option<NaiveDate>, &str) {
    let day = parse_trade_day(date);
    (day.is_none(), day, date)
}

fn string_or_number<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    match Value::deserialize(d)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, found {}",
            json_kind(&other)
        ))),
    }
}

/// Strikes arrive as numbers or numeric text; blank and null mean no strike.
fn number_or_numeric_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
    match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("number out of f64 range")),
        Value::String(s) if s.trim().is_empty() => Ok(0.0),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("non-numeric strike {s:?}"))),
        Value::Null => Ok(0.0),
        other => Err(serde::de::Error::custom(format!(
            "expected number or numeric string, found {}",
            json_kind(&other)
        ))),
    }
}

// ============================================================
// MATCHING KEYS
// ============================================================

/// Which fields a SELL must share with a BUY to close it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchRule {
    /// Instrument token, strike and expiry
    #[default]
    Loose,
    /// Loose plus equal quantity and option type
    Strict,
}

impl MatchRule {
    pub fn matches(self, a: &TradeLeg, b: &TradeLeg) -> bool {
        LegKey::new(a, self) == LegKey::new(b, self)
    }
}

/// Identity under which BUY and SELL legs are paired.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LegKey {
    pub instrument_token: String,
    strike_bits: u64,
    pub expiry: String,
    pub option_type: Option<String>,
    pub quantity: Option<u64>,
}

impl LegKey {
    pub fn new(leg: &TradeLeg, rule: MatchRule) -> Self {
        let strict = rule == MatchRule::Strict;
        Self {
            instrument_token: leg.instrument_token.clone(),
            strike_bits: normalized_bits(leg.strike_price),
            expiry: leg.expiry.clone(),
            option_type: strict.then(|| leg.option_type.clone()),
            quantity: strict.then_some(leg.quantity),
        }
    }

    pub fn strike_price(&self) -> f64 {
        f64::from_bits(self.strike_bits)
    }
}

impl From<&TradeLeg> for LegKey {
    fn from(leg: &TradeLeg) -> Self {
        LegKey::new(leg, MatchRule::Loose)
    }
}

fn normalized_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

// ============================================================
// JSON BOUNDARY
// ============================================================

/// Records that deserialized, and how many did not.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub dropped: usize,
}

/// Deserialize each element of a JSON array, dropping and counting failures.
pub fn parse_records<T: DeserializeOwned>(value: &Value) -> Result<Parsed<T>> {
    let items = value.as_array().ok_or(TradeDeskError::InvalidInput {
        expected: "array",
        found: json_kind(value),
    })?;

    let mut parsed = Parsed {
        records: Vec::with_capacity(items.len()),
        dropped: 0,
    };
    for (index, item) in items.iter().enumerate() {
        match T::deserialize(item) {
            Ok(record) => parsed.records.push(record),
            Err(e) => {
                tracing::debug!(index, error = %e, "dropping malformed record");
                parsed.dropped += 1;
            }
        }
    }
    Ok(parsed)
}

pub fn parse_trade_legs(value: &Value) -> Result<Parsed<TradeLeg>> {
    parse_records(value)
}

/// Round to cents for display.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
