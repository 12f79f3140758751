//! Position views: per-BUY closing, broker-reported positions, and daily summaries.

use serde::{Deserialize, Serialize};

use super::{round2, MatchRule, TradeLeg};

// ============================================================
// POSITION BOOK
// ============================================================

/// A BUY closed by a SELL of the same instrument, option type and quantity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClosedPosition<'a> {
    pub buy: &'a TradeLeg,
    pub sell: &'a TradeLeg,
    /// `sell.amount - buy.amount`
    pub pl: f64,
    /// Relative to `buy.amount`; 0 when that is 0
    pub pl_percentage: f64,
}

/// BUY legs split into open, profitable and losing positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PositionBook<'a> {
    pub open: Vec<&'a TradeLeg>,
    pub profits: Vec<ClosedPosition<'a>>,
    /// Includes break-even positions
    pub losses: Vec<ClosedPosition<'a>>,
    pub total_profit: f64,
    /// Absolute value of the summed losses
    pub total_loss: f64,
}

impl<'a> PositionBook<'a> {
    /// Pair each BUY, in input order, with the first SELL not yet used that
    /// matches it strictly.
    pub fn from_legs(legs: &'a [TradeLeg]) -> Self {
        let mut used = vec![false; legs.len()];
        let mut book = PositionBook::default();

        for buy in legs.iter().filter(|l| l.is_buy()) {
            let closing = legs.iter().enumerate().find(|(i, sell)| {
                !used[*i] && sell.is_sell() && MatchRule::Strict.matches(buy, sell)
            });

            let Some((index, sell)) = closing else {
                book.open.push(buy);
                continue;
            };
            used[index] = true;

            let pl = sell.amount - buy.amount;
            let pl_percentage = if buy.amount == 0.0 {
                0.0
            } else {
                pl / buy.amount * 100.0
            };
            let position = ClosedPosition {
                buy,
                sell,
                pl,
                pl_percentage,
            };
            if pl > 0.0 {
                book.total_profit += pl;
                book.profits.push(position);
            } else {
                book.total_loss += pl.abs();
                book.losses.push(position);
            }
        }

        book.total_profit = round2(book.total_profit);
        book.total_loss = round2(book.total_loss);
        book
    }

    pub fn net(&self) -> f64 {
        round2(self.total_profit - self.total_loss)
    }
}

// ============================================================
// BROKER POSITIONS
// ============================================================

/// A position as reported by the broker's positions endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerPosition {
    pub trading_symbol: String,
    pub last_price: f64,
    pub close_price: f64,
    pub average_price: f64,
    pub quantity: i64,
    pub multiplier: f64,
    pub buy_price: f64,
    pub sell_price: f64,
    pub overnight_buy_quantity: i64,
}

impl BrokerPosition {
    /// A position with a recorded sell price has been squared off.
    pub fn is_closed(&self) -> bool {
        self.sell_price > 0.0
    }

    /// Realized P/L when closed, mark-to-market otherwise.
    pub fn profit_loss(&self) -> f64 {
        let pl = if self.is_closed() {
            (self.sell_price - self.buy_price) * self.overnight_buy_quantity as f64 * self.multiplier
        } else {
            (self.last_price - self.average_price) * self.quantity as f64 * self.multiplier
        };
        round2(pl)
    }

    pub fn profit_loss_percentage(&self) -> Option<f64> {
        let (exit, entry) = if self.is_closed() {
            (self.sell_price, self.buy_price)
        } else {
            (self.last_price, self.average_price)
        };
        (entry != 0.0).then(|| round2((exit - entry) / entry * 100.0))
    }
}

// ============================================================
// DAILY SUMMARIES
// ============================================================

/// One row of the backend's per-scrip daily profit/loss report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyTradeSummary {
    #[serde(default)]
    pub scrip_name: String,
    #[serde(default)]
    pub quantity: u64,
    #[serde(default)]
    pub buy_date: String,
    pub buy_amount: f64,
    pub sell_amount: f64,
}

impl DailyTradeSummary {
    pub fn profit_loss(&self) -> f64 {
        self.sell_amount - self.buy_amount
    }

    pub fn profit_loss_percentage(&self) -> Option<f64> {
        (self.buy_amount != 0.0).then(|| self.profit_loss() / self.buy_amount * 100.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DailyTotals {
    pub total_invested: f64,
    pub total_profit_loss: f64,
}

pub fn summarize_daily(rows: &[DailyTradeSummary]) -> DailyTotals {
    rows.iter().fold(DailyTotals::default(), |acc, row| DailyTotals {
        total_invested: acc.total_invested + row.buy_amount,
        total_profit_loss: acc.total_profit_loss + row.profit_loss(),
    })
}
