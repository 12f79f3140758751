//! Order history filtering.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::reconcile::find_unmatched_buys;
use super::{date_order, TradeLeg, TransactionType};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionFilter {
    #[default]
    All,
    Buy,
    Sell,
}

impl TransactionFilter {
    fn accepts(self, kind: TransactionType) -> bool {
        match self {
            TransactionFilter::All => true,
            TransactionFilter::Buy => kind == TransactionType::Buy,
            TransactionFilter::Sell => kind == TransactionType::Sell,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filter and ordering applied to an order history listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderHistoryQuery {
    pub transaction: TransactionFilter,
    /// Exact `scrip_name`; `None` keeps every scrip
    pub scrip: Option<String>,
    /// Only BUY legs no SELL has closed
    pub unmatched_only: bool,
    /// By trade date; legs on the same date keep input order
    pub order: SortOrder,
}

impl OrderHistoryQuery {
    pub fn apply<'a>(&self, legs: &'a [TradeLeg]) -> Vec<&'a TradeLeg> {
        let candidates: Vec<&TradeLeg> = if self.unmatched_only {
            find_unmatched_buys(legs)
        } else {
            legs.iter().collect()
        };

        let mut out: Vec<&TradeLeg> = candidates
            .into_iter()
            .filter(|l| self.transaction.accepts(l.transaction_type))
            .filter(|l| self.scrip.as_deref().map_or(true, |s| l.scrip_name == s))
            .collect();

        match self.order {
            SortOrder::Asc => {
                out.sort_by(|a, b| date_order(&a.trade_date).cmp(&date_order(&b.trade_date)))
            }
            SortOrder::Desc => {
                out.sort_by(|a, b| date_order(&b.trade_date).cmp(&date_order(&a.trade_date)))
            }
        }
        out
    }
}

/// Distinct scrip names, sorted, for building a scrip filter.
pub fn scrips(legs: &[TradeLeg]) -> Vec<&str> {
    legs.iter()
        .map(|l| l.scrip_name.as_str())
        .filter(|s| !s.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
