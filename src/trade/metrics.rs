//! Portfolio-level figures over a reconciled trade history.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::reconcile::{Reconciler, Reconciliation};
use super::{date_order, round2, TradeLeg};

/// A value attached to one trade date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyValue<T> {
    pub date: String,
    pub value: T,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub total_profit_loss: f64,
    pub total_investment: f64,
    /// `None` when nothing was invested
    pub roi: Option<f64>,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// `None` when there are no trades
    pub win_percentage: Option<f64>,
    /// Legs of either side per trade date, dates ascending
    pub trade_frequency_by_date: Vec<DailyValue<usize>>,
    /// Running realized P/L, dates ascending
    pub cumulative_profit_loss_by_date: Vec<DailyValue<f64>>,
    pub profit_loss_by_instrument: BTreeMap<String, f64>,
}

/// Metrics under the default (loose, FIFO) reconciliation.
pub fn aggregate_metrics(legs: &[TradeLeg]) -> Metrics {
    aggregate_metrics_with(legs, &Reconciler::default())
}

pub fn aggregate_metrics_with(legs: &[TradeLeg], reconciler: &Reconciler) -> Metrics {
    let reconciliation = reconciler.reconcile(legs);
    Metrics::from_reconciliation(legs, &reconciliation)
}

impl Metrics {
    /// `legs` supplies the trade dates; `reconciliation` the realized P/L.
    pub fn from_reconciliation(legs: &[TradeLeg], reconciliation: &Reconciliation<'_>) -> Self {
        let mut m = Metrics::default();

        let mut daily_pl: HashMap<&str, f64> = HashMap::new();
        for trade in &reconciliation.realized {
            m.total_profit_loss += trade.profit_loss;
            m.total_investment += trade.buy_amount;
            m.total_trades += 1;
            if trade.is_win() {
                m.winning_trades += 1;
            } else if trade.is_loss() {
                m.losing_trades += 1;
            }
            *daily_pl.entry(trade.sell.trade_date.as_str()).or_default() += trade.profit_loss;
            *m.profit_loss_by_instrument
                .entry(trade.sell.scrip_name.clone())
                .or_default() += trade.profit_loss;
        }

        m.total_profit_loss = round2(m.total_profit_loss);
        m.roi = (m.total_investment > 0.0).then(|| m.total_profit_loss / m.total_investment * 100.0);
        m.win_percentage =
            (m.total_trades > 0).then(|| m.winning_trades as f64 / m.total_trades as f64 * 100.0);
        for value in m.profit_loss_by_instrument.values_mut() {
            *value = round2(*value);
        }

        let mut frequency: HashMap<&str, usize> = HashMap::new();
        for leg in legs {
            *frequency.entry(leg.trade_date.as_str()).or_default() += 1;
        }
        let mut dates: Vec<(&str, usize)> = frequency.into_iter().collect();
        dates.sort_by(|a, b| date_order(a.0).cmp(&date_order(b.0)));

        let mut running = 0.0;
        for (date, count) in dates {
            running += daily_pl.get(date).copied().unwrap_or(0.0);
            m.trade_frequency_by_date.push(DailyValue {
                date: date.to_string(),
                value: count,
            });
            m.cumulative_profit_loss_by_date.push(DailyValue {
                date: date.to_string(),
                value: round2(running),
            });
        }

        m
    }
}
