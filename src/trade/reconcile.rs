//! BUY/SELL pairing and realized profit/loss.
//!
//! The single-pair functions ([`match_sell_to_buy`], [`compute_profit_loss`])
//! are stateless: a BUY may pair with any number of SELLs. [`Reconciler`]
//! consumes BUY quantity first-in first-out, so no lot is ever counted twice.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};

use super::{date_order, round2, LegKey, MatchRule, TradeLeg};

// ============================================================
// SINGLE PAIR
// ============================================================

/// Realized result of one SELL against its BUY.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfitLoss {
    pub profit_loss: f64,
    pub buy_amount: f64,
}

/// First BUY in `candidates` that `sell` closes under `rule`.
pub fn match_sell_to_buy<'a>(
    sell: &TradeLeg,
    candidates: &'a [TradeLeg],
    rule: MatchRule,
) -> Option<&'a TradeLeg> {
    if !sell.is_sell() {
        return None;
    }
    candidates
        .iter()
        .find(|buy| buy.is_buy() && rule.matches(buy, sell))
}

/// `(sell.price - buy.price) * sell.quantity`, rounded to cents.
///
/// `None` when `sell` is not a SELL or there is no BUY to pair it with.
pub fn compute_profit_loss(sell: &TradeLeg, buy: Option<&TradeLeg>) -> Option<ProfitLoss> {
    let buy = buy.filter(|b| b.is_buy())?;
    if !sell.is_sell() {
        return None;
    }
    Some(ProfitLoss {
        profit_loss: round2((sell.price - buy.price) * sell.quantity as f64),
        buy_amount: buy.amount,
    })
}

/// BUY legs with no SELL anywhere in `legs` sharing their instrument, strike and expiry.
pub fn find_unmatched_buys(legs: &[TradeLeg]) -> Vec<&TradeLeg> {
    let sold: HashSet<LegKey> = legs
        .iter()
        .filter(|l| l.is_sell())
        .map(LegKey::from)
        .collect();
    legs.iter()
        .filter(|l| l.is_buy() && !sold.contains(&LegKey::from(*l)))
        .collect()
}

// ============================================================
// FIFO RECONCILER
// ============================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub rule: MatchRule,
}

/// Quantity taken from one BUY lot by a SELL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LotFill<'a> {
    pub buy: &'a TradeLeg,
    pub quantity: u64,
    /// Share of the BUY's `amount` attributable to `quantity`
    pub buy_amount: f64,
    pub profit_loss: f64,
}

/// A SELL that closed at least part of one BUY lot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RealizedTrade<'a> {
    pub sell: &'a TradeLeg,
    pub fills: Vec<LotFill<'a>>,
    pub profit_loss: f64,
    pub buy_amount: f64,
    /// SELL quantity left over once every matching lot was exhausted
    pub unmatched_quantity: u64,
}

impl RealizedTrade<'_> {
    pub fn matched_quantity(&self) -> u64 {
        self.fills.iter().map(|f| f.quantity).sum()
    }

    pub fn is_win(&self) -> bool {
        self.profit_loss > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.profit_loss < 0.0
    }
}

/// Unconsumed remainder of a BUY leg.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenLot<'a> {
    pub buy: &'a TradeLeg,
    pub remaining: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation<'a> {
    /// In the order SELLs were processed: by trade date, then input order
    pub realized: Vec<RealizedTrade<'a>>,
    pub unmatched_sells: Vec<&'a TradeLeg>,
    /// In BUY trade-date order
    pub open_lots: Vec<OpenLot<'a>>,
}

impl Reconciliation<'_> {
    pub fn total_profit_loss(&self) -> f64 {
        round2(self.realized.iter().map(|r| r.profit_loss).sum())
    }
}

struct Lot<'a> {
    order: usize,
    leg: &'a TradeLeg,
    remaining: u64,
}

/// Pairs SELLs with earlier BUY lots, consuming quantity first-in first-out.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig) -> Self {
        Self { config }
    }

    pub fn with_rule(rule: MatchRule) -> Self {
        Self::new(ReconcilerConfig { rule })
    }

    pub fn rule(&self) -> MatchRule {
        self.config.rule
    }

    pub fn reconcile<'a>(&self, legs: &'a [TradeLeg]) -> Reconciliation<'a> {
        let rule = self.config.rule;

        let mut buys: Vec<&TradeLeg> = legs.iter().filter(|l| l.is_buy()).collect();
        let mut sells: Vec<&TradeLeg> = legs.iter().filter(|l| l.is_sell()).collect();
        // Stable sorts keep input order within a day
        buys.sort_by(|a, b| date_order(&a.trade_date).cmp(&date_order(&b.trade_date)));
        sells.sort_by(|a, b| date_order(&a.trade_date).cmp(&date_order(&b.trade_date)));

        let mut book: HashMap<LegKey, VecDeque<Lot<'a>>> = HashMap::new();
        for (order, leg) in buys.into_iter().enumerate() {
            if leg.quantity == 0 {
                continue;
            }
            book.entry(LegKey::new(leg, rule)).or_default().push_back(Lot {
                order,
                leg,
                remaining: leg.quantity,
            });
        }

        let mut out = Reconciliation::default();
        for sell in sells {
            let lots = book.get_mut(&LegKey::new(sell, rule));
            match lots.map(|lots| fill(sell, lots)) {
                Some(trade) if !trade.fills.is_empty() => {
                    if trade.unmatched_quantity > 0 {
                        tracing::debug!(
                            instrument = %sell.instrument_token,
                            unmatched = trade.unmatched_quantity,
                            "sell exceeds open buy quantity"
                        );
                    }
                    out.realized.push(trade);
                }
                _ => {
                    tracing::debug!(
                        instrument = %sell.instrument_token,
                        trade_id = %sell.trade_id,
                        "no open buy lot for sell"
                    );
                    out.unmatched_sells.push(sell);
                }
            }
        }

        let mut open: Vec<Lot<'a>> = book.into_values().flatten().collect();
        open.sort_by_key(|lot| lot.order);
        out.open_lots = open
            .into_iter()
            .map(|lot| OpenLot {
                buy: lot.leg,
                remaining: lot.remaining,
            })
            .collect();
        out
    }
}

fn fill<'a>(sell: &'a TradeLeg, lots: &mut VecDeque<Lot<'a>>) -> RealizedTrade<'a> {
    let mut wanted = sell.quantity;
    let mut fills = Vec::new();

    while wanted > 0 {
        let Some(lot) = lots.front_mut() else { break };
        let take = wanted.min(lot.remaining);
        let buy_amount = lot.leg.amount * take as f64 / lot.leg.quantity as f64;
        fills.push(LotFill {
            buy: lot.leg,
            quantity: take,
            buy_amount,
            profit_loss: (sell.price - lot.leg.price) * take as f64,
        });
        lot.remaining -= take;
        wanted -= take;
        if lot.remaining == 0 {
            lots.pop_front();
        }
    }

    RealizedTrade {
        sell,
        profit_loss: round2(fills.iter().map(|f| f.profit_loss).sum()),
        buy_amount: fills.iter().map(|f| f.buy_amount).sum(),
        fills,
        unmatched_quantity: wanted,
    }
}
