//! Property tests for ordering, inference, validation and lot accounting.

use proptest::prelude::*;
use serde_json::json;
use tradedesk::prelude::{
    continuous_streak, find_bearish_engulfing, infer_open_price, validate_stocks,
    BearishEngulfingDetector, BullishEngulfingDetector, Candle, DarkCloudCoverDetector,
    PatternDetector, QuoteContext, Reconciler, StockSnapshot, StreakDirection,
    ThreeBlackCrowsDetector, TradeLeg, TransactionType,
};

fn quote() -> QuoteContext {
    QuoteContext::default()
}

/// Bullish candle followed by a bearish one that engulfs it, most recent first
fn bearish_engulfing(base: f64, prev_body: f64, extra_top: f64, extra_bottom: f64) -> Vec<Candle> {
    let prev_open = base;
    let prev_close = base + prev_body;
    let curr_open = prev_close + extra_top;
    let curr_close = prev_open - extra_bottom;
    vec![
        Candle::new(curr_open, curr_open + 0.5, curr_close - 0.5, curr_close, -1.0),
        Candle::new(prev_open, prev_close + 0.5, prev_open - 0.5, prev_close, 1.0),
    ]
}

/// Bearish candle followed by a bullish one that engulfs it, most recent first
fn bullish_engulfing(base: f64, prev_body: f64, extra_top: f64, extra_bottom: f64) -> Vec<Candle> {
    let prev_close = base;
    let prev_open = base + prev_body;
    let curr_open = prev_close - extra_bottom;
    let curr_close = prev_open + extra_top;
    vec![
        Candle::new(curr_open, curr_close + 0.5, curr_open - 0.5, curr_close, 1.0),
        Candle::new(prev_open, prev_open + 0.5, prev_close - 0.5, prev_close, -1.0),
    ]
}

/// Bullish candle, then a gap-up bearish one closing `depth` of the way into its body
fn dark_cloud(base: f64, prev_body: f64, gap: f64, depth: f64) -> Vec<Candle> {
    let prev_open = base;
    let prev_close = base + prev_body;
    let curr_open = prev_close + gap;
    let curr_close = prev_close - prev_body * depth;
    vec![
        Candle::new(curr_open, curr_open + 0.5, curr_close - 0.5, curr_close, -1.0),
        Candle::new(prev_open, prev_close + 0.5, prev_open - 0.5, prev_close, 1.0),
    ]
}

/// Snapshot whose candles carry no opens; inference turns them into a bearish engulfing.
///
/// `base` is the close implied before the latest session.
fn unreported_opens(base: f64, drop: f64, lift: f64) -> StockSnapshot {
    let close = base * (1.0 - drop / 100.0);
    let latest = Candle::new(0.0, base * 1.01, close * 0.99, close, -drop);
    let earlier = Candle::new(0.0, base * 1.01, base * 0.99, base * (1.0 + lift), 1.0);
    StockSnapshot {
        name: "X".to_string(),
        instrument_key: "NSE_EQ|X".to_string(),
        percentage_change: -drop,
        high: base * 1.01,
        low: close * 0.99,
        data: vec![latest, earlier],
    }
}

proptest! {
    #[test]
    fn reversed_engulfing_is_not_found(
        base in 10.0f64..1000.0,
        prev_body in 0.1f64..20.0,
        extra_top in 0.01f64..5.0,
        extra_bottom in 0.01f64..5.0,
    ) {
        let bars = bearish_engulfing(base, prev_body, extra_top, extra_bottom);
        prop_assert!(PatternDetector::detect(&BearishEngulfingDetector, &bars, &quote()).is_some());

        let reversed: Vec<Candle> = bars.iter().rev().cloned().collect();
        prop_assert!(PatternDetector::detect(&BearishEngulfingDetector, &reversed, &quote()).is_none());
    }

    #[test]
    fn reversed_bullish_engulfing_is_not_found(
        base in 10.0f64..1000.0,
        prev_body in 0.1f64..20.0,
        extra_top in 0.01f64..5.0,
        extra_bottom in 0.01f64..5.0,
    ) {
        let bars = bullish_engulfing(base, prev_body, extra_top, extra_bottom);
        prop_assert!(PatternDetector::detect(&BullishEngulfingDetector, &bars, &quote()).is_some());

        let reversed: Vec<Candle> = bars.iter().rev().cloned().collect();
        prop_assert!(PatternDetector::detect(&BullishEngulfingDetector, &reversed, &quote()).is_none());
    }

    #[test]
    fn reversed_dark_cloud_is_not_found(
        base in 10.0f64..1000.0,
        prev_body in 0.5f64..20.0,
        gap in 0.01f64..5.0,
        depth in 0.55f64..0.95,
    ) {
        let bars = dark_cloud(base, prev_body, gap, depth);
        let detector = DarkCloudCoverDetector::with_defaults();
        prop_assert!(PatternDetector::detect(&detector, &bars, &quote()).is_some());

        let reversed: Vec<Candle> = bars.iter().rev().cloned().collect();
        prop_assert!(PatternDetector::detect(&detector, &reversed, &quote()).is_none());
    }

    #[test]
    fn inferred_engulfing_depends_on_order(
        base in 20.0f64..2000.0,
        drop in 2.0f64..8.0,
        lift in 0.001f64..0.004,
    ) {
        let stock = unreported_opens(base, drop, lift);
        prop_assert_eq!(find_bearish_engulfing(std::slice::from_ref(&stock)).len(), 1);

        let mut reversed = stock.clone();
        reversed.data.reverse();
        prop_assert!(find_bearish_engulfing(&[reversed]).is_empty());
    }

    #[test]
    fn reversed_crows_are_not_found(
        base in 50.0f64..500.0,
        step in 0.5f64..5.0,
        body_share in 0.6f64..0.95,
    ) {
        let bars: Vec<Candle> = (0..3)
            .map(|i| {
                let open = base + step * (i as f64 + 1.0);
                let close = open - step;
                let range = step / body_share;
                let wick = (range - step) / 2.0;
                Candle::new(open, open + wick, close - wick, close, -1.0)
            })
            .collect();
        let detector = ThreeBlackCrowsDetector::with_defaults();
        prop_assert!(PatternDetector::detect(&detector, &bars, &quote()).is_some());

        let reversed: Vec<Candle> = bars.iter().rev().cloned().collect();
        prop_assert!(PatternDetector::detect(&detector, &reversed, &quote()).is_none());
    }

    #[test]
    fn inference_keeps_reported_opens(
        candles in prop::collection::vec(
            (1.0f64..500.0, 0.0f64..10.0, 0.0f64..10.0, 1.0f64..500.0, -9.0f64..9.0),
            0..12,
        ),
    ) {
        let candles: Vec<Candle> = candles
            .into_iter()
            .map(|(open, up, down, close, pct)| {
                Candle::new(open, open.max(close) + up, open.min(close) - down, close, pct)
            })
            .collect();
        prop_assert_eq!(infer_open_price(&candles), candles);
    }

    #[test]
    fn inferred_open_stays_within_range(
        candles in prop::collection::vec((50.0f64..150.0, 0.1f64..5.0, 0.1f64..5.0, -9.0f64..9.0), 1..8),
    ) {
        let candles: Vec<Candle> = candles
            .into_iter()
            .map(|(close, up, down, pct)| Candle::new(0.0, close + up, close - down, close, pct))
            .collect();
        for c in infer_open_price(&candles) {
            prop_assert!(c.open >= c.low - 1e-9 && c.open <= c.high + 1e-9);
        }
    }

    #[test]
    fn streak_never_exceeds_length(changes in prop::collection::vec(-5.0f64..5.0, 0..20)) {
        let candles: Vec<Candle> = changes.iter().map(|&p| Candle::new(1.0, 1.0, 1.0, 1.0, p)).collect();
        let up = continuous_streak(&candles, StreakDirection::Positive);
        let down = continuous_streak(&candles, StreakDirection::Negative);
        prop_assert!(up + down <= candles.len());
        prop_assert!(up == 0 || down == 0);
    }

    #[test]
    fn validation_follows_name_rule(name in ".{0,12}") {
        let record = json!({
            "name": name,
            "instrumentKey": "NSE_EQ|X",
            "percentageChange": 0.5,
            "high": 2.0,
            "low": 1.0
        });
        let batch = validate_stocks(&[record]);
        prop_assert_eq!(batch.stocks.len(), usize::from(!name.is_empty()));
        prop_assert_eq!(batch.dropped, usize::from(name.is_empty()));
    }

    #[test]
    fn fifo_conserves_buy_quantity(
        trades in prop::collection::vec((any::<bool>(), 0u64..3, 1u64..50, 1.0f64..100.0, 1u32..28), 0..40),
    ) {
        let legs: Vec<TradeLeg> = trades
            .iter()
            .enumerate()
            .map(|(i, &(is_buy, token, quantity, price, day))| TradeLeg {
                trade_id: i.to_string(),
                transaction_type: if is_buy { TransactionType::Buy } else { TransactionType::Sell },
                instrument_token: format!("T{token}"),
                strike_price: 100.0,
                expiry: "2025-01-30".to_string(),
                option_type: "CE".to_string(),
                quantity,
                price,
                amount: price * quantity as f64,
                trade_date: format!("2025-01-{day:02}"),
                scrip_name: String::new(),
                symbol: String::new(),
            })
            .collect();

        let rec = Reconciler::default().reconcile(&legs);

        let bought: u64 = legs.iter().filter(|l| l.is_buy()).map(|l| l.quantity).sum();
        let filled: u64 = rec.realized.iter().map(|r| r.matched_quantity()).sum();
        let open: u64 = rec.open_lots.iter().map(|l| l.remaining).sum();
        prop_assert_eq!(filled + open, bought);

        let sells = legs.iter().filter(|l| l.is_sell()).count();
        prop_assert_eq!(rec.realized.len() + rec.unmatched_sells.len(), sells);
    }
}
