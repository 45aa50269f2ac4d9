//! Order book implementation with sorted price levels.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use model::{LevelUpdate, PriceLevel, Side};
use rust_decimal::Decimal;

use crate::error::OrderBookError;

/// Local order book for one product.
///
/// Uses `BTreeMap` with `Decimal` keys for precise price level tracking.
/// - Bids use `Reverse<Decimal>` for descending order (highest first)
/// - Asks use `Decimal` directly for ascending order (lowest first)
///
/// `sequence` counts applied batches. It is local bookkeeping only and is not
/// compared against any upstream sequence number.
#[derive(Debug)]
pub struct OrderBook {
    instrument: String,
    sequence: u64,
    bids: BTreeMap<Reverse<Decimal>, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
}

impl OrderBook {
    /// Creates a new empty order book for the given product.
    pub fn new(instrument: impl Into<String>) -> Self {
        Self {
            instrument: instrument.into(),
            sequence: 0,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
        }
    }

    /// Returns the product this order book tracks.
    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    /// Number of batches applied so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Replaces both sides with `levels`, partitioned by side.
    ///
    /// Zero-quantity levels are skipped. The sequence counter is not reset.
    pub fn apply_snapshot(&mut self, levels: &[PriceLevel]) {
        self.bids.clear();
        self.asks.clear();

        for level in levels {
            if level.quantity.is_zero() {
                continue;
            }
            match level.side {
                Side::Bid => {
                    self.bids.insert(Reverse(level.price), level.quantity);
                }
                Side::Ask => {
                    self.asks.insert(level.price, level.quantity);
                }
            }
        }

        self.sequence += 1;
    }

    /// Applies changes in order. A zero quantity removes the level if present,
    /// anything else inserts or overwrites it.
    pub fn apply_update(&mut self, changes: &[LevelUpdate]) {
        for change in changes {
            match (change.side, change.is_removal()) {
                (Side::Bid, true) => {
                    self.bids.remove(&Reverse(change.price));
                }
                (Side::Bid, false) => {
                    self.bids.insert(Reverse(change.price), change.new_quantity);
                }
                (Side::Ask, true) => {
                    self.asks.remove(&change.price);
                }
                (Side::Ask, false) => {
                    self.asks.insert(change.price, change.new_quantity);
                }
            }
        }

        self.sequence += 1;
    }

    /// Returns the best (highest) bid price level.
    pub fn best_bid(&self) -> Result<PriceLevel, OrderBookError> {
        self.bids
            .first_key_value()
            .map(|(Reverse(price), qty)| PriceLevel::new(Side::Bid, *price, *qty))
            .ok_or_else(|| self.empty(Side::Bid))
    }

    /// Returns the best (lowest) ask price level.
    pub fn best_ask(&self) -> Result<PriceLevel, OrderBookError> {
        self.asks
            .first_key_value()
            .map(|(price, qty)| PriceLevel::new(Side::Ask, *price, *qty))
            .ok_or_else(|| self.empty(Side::Ask))
    }

    fn empty(&self, side: Side) -> OrderBookError {
        OrderBookError::EmptyBook {
            instrument: self.instrument.clone(),
            side,
        }
    }

    /// Returns the mid price (average of best bid and best ask).
    pub fn mid_price(&self) -> Option<Decimal> {
        let bid = self.best_bid().ok()?;
        let ask = self.best_ask().ok()?;
        Some((bid.price + ask.price) / Decimal::TWO)
    }

    /// Returns the spread (best ask - best bid).
    pub fn spread(&self) -> Option<Decimal> {
        let bid = self.best_bid().ok()?;
        let ask = self.best_ask().ok()?;
        Some(ask.price - bid.price)
    }

    /// Returns the top N bid price levels (highest to lowest).
    pub fn top_bids(&self, n: usize) -> Vec<PriceLevel> {
        self.bids
            .iter()
            .take(n)
            .map(|(Reverse(price), qty)| PriceLevel::new(Side::Bid, *price, *qty))
            .collect()
    }

    /// Returns the top N ask price levels (lowest to highest).
    pub fn top_asks(&self, n: usize) -> Vec<PriceLevel> {
        self.asks
            .iter()
            .take(n)
            .map(|(price, qty)| PriceLevel::new(Side::Ask, *price, *qty))
            .collect()
    }

    /// Quantity resting at `price` on `side`, if any.
    pub fn quantity_at(&self, side: Side, price: Decimal) -> Option<Decimal> {
        match side {
            Side::Bid => self.bids.get(&Reverse(price)).copied(),
            Side::Ask => self.asks.get(&price).copied(),
        }
    }

    /// Returns the total number of bid levels.
    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    /// Returns the total number of ask levels.
    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn bid(price: Decimal, qty: Decimal) -> PriceLevel {
        PriceLevel::new(Side::Bid, price, qty)
    }

    fn ask(price: Decimal, qty: Decimal) -> PriceLevel {
        PriceLevel::new(Side::Ask, price, qty)
    }

    fn change(side: Side, price: Decimal, qty: Decimal) -> LevelUpdate {
        LevelUpdate::new(side, price, qty)
    }

    fn assert_best_prices_are_extremes(book: &OrderBook) {
        if let Ok(best) = book.best_bid() {
            for level in book.top_bids(usize::MAX) {
                assert!(best.price >= level.price);
            }
        }
        if let Ok(best) = book.best_ask() {
            for level in book.top_asks(usize::MAX) {
                assert!(best.price <= level.price);
            }
        }
    }

    #[test]
    fn test_empty_book() {
        let book = OrderBook::new("BTC-USD");
        assert_eq!(book.instrument(), "BTC-USD");
        assert_eq!(book.sequence(), 0);
        assert_eq!(
            book.best_bid(),
            Err(OrderBookError::EmptyBook {
                instrument: "BTC-USD".into(),
                side: Side::Bid
            })
        );
        assert!(matches!(
            book.best_ask(),
            Err(OrderBookError::EmptyBook { side: Side::Ask, .. })
        ));
        assert!(book.mid_price().is_none());
        assert!(book.spread().is_none());
    }

    #[test]
    fn test_snapshot_then_remove_best_bid() {
        let mut book = OrderBook::new("BTC-USD");

        book.apply_snapshot(&[bid(dec!(100.00), dec!(1.5)), ask(dec!(101.00), dec!(2.0))]);

        let best_bid = book.best_bid().unwrap();
        assert_eq!(best_bid.price, dec!(100.00));
        assert_eq!(best_bid.quantity, dec!(1.5));
        let best_ask = book.best_ask().unwrap();
        assert_eq!(best_ask.price, dec!(101.00));
        assert_eq!(best_ask.quantity, dec!(2.0));
        assert_eq!(book.sequence(), 1);

        book.apply_update(&[change(Side::Bid, dec!(100.00), dec!(0))]);

        assert!(matches!(
            book.best_bid(),
            Err(OrderBookError::EmptyBook { side: Side::Bid, .. })
        ));
        assert_eq!(book.best_ask().unwrap().price, dec!(101.00));
        assert_eq!(book.sequence(), 2);
    }

    #[test]
    fn test_removal_falls_back_to_next_bid() {
        let mut book = OrderBook::new("BTC-USD");
        book.apply_snapshot(&[
            bid(dec!(100.0), dec!(1.0)),
            bid(dec!(99.0), dec!(2.0)),
            ask(dec!(101.0), dec!(1.0)),
        ]);

        book.apply_update(&[change(Side::Bid, dec!(100.0), dec!(0))]);

        assert_eq!(book.best_bid().unwrap().price, dec!(99.0));
        assert_eq!(book.bid_levels(), 1);
    }

    #[test]
    fn test_snapshot_replaces_both_sides() {
        let mut book = OrderBook::new("BTC-USD");
        book.apply_snapshot(&[bid(dec!(100), dec!(1)), ask(dec!(105), dec!(1))]);
        book.apply_snapshot(&[bid(dec!(90), dec!(3)), ask(dec!(95), dec!(4))]);

        assert_eq!(book.bid_levels(), 1);
        assert_eq!(book.ask_levels(), 1);
        assert_eq!(book.best_bid().unwrap().price, dec!(90));
        assert_eq!(book.best_ask().unwrap().price, dec!(95));
        assert_eq!(book.sequence(), 2);
    }

    #[test]
    fn test_snapshot_skips_zero_quantity() {
        let mut book = OrderBook::new("BTC-USD");
        book.apply_snapshot(&[bid(dec!(100), dec!(0)), bid(dec!(99), dec!(1))]);

        assert_eq!(book.bid_levels(), 1);
        assert_eq!(book.best_bid().unwrap().price, dec!(99));
    }

    #[test]
    fn test_removing_absent_level_is_noop() {
        let mut book = OrderBook::new("BTC-USD");
        book.apply_snapshot(&[bid(dec!(100), dec!(1)), ask(dec!(101), dec!(1))]);

        book.apply_update(&[
            change(Side::Bid, dec!(42), dec!(0)),
            change(Side::Ask, dec!(4242), dec!(0)),
        ]);

        assert_eq!(book.bid_levels(), 1);
        assert_eq!(book.ask_levels(), 1);
        assert!(book.quantity_at(Side::Bid, dec!(42)).is_none());
        assert!(book.quantity_at(Side::Ask, dec!(4242)).is_none());
        assert_eq!(book.sequence(), 2);
    }

    #[test]
    fn test_last_write_wins_within_batch() {
        let mut book = OrderBook::new("BTC-USD");
        book.apply_snapshot(&[]);

        book.apply_update(&[
            change(Side::Ask, dec!(101), dec!(1)),
            change(Side::Ask, dec!(101), dec!(3)),
            change(Side::Bid, dec!(99), dec!(2)),
            change(Side::Bid, dec!(99), dec!(0)),
        ]);

        assert_eq!(book.quantity_at(Side::Ask, dec!(101)), Some(dec!(3)));
        assert!(book.quantity_at(Side::Bid, dec!(99)).is_none());
    }

    #[test]
    fn test_reapplying_batch_is_idempotent() {
        let batch = [
            change(Side::Bid, dec!(99.5), dec!(2)),
            change(Side::Ask, dec!(100.5), dec!(0.7)),
            change(Side::Bid, dec!(98), dec!(0)),
        ];

        let mut once = OrderBook::new("BTC-USD");
        once.apply_snapshot(&[bid(dec!(98), dec!(1)), ask(dec!(101), dec!(1))]);
        once.apply_update(&batch);

        let mut twice = OrderBook::new("BTC-USD");
        twice.apply_snapshot(&[bid(dec!(98), dec!(1)), ask(dec!(101), dec!(1))]);
        twice.apply_update(&batch);
        twice.apply_update(&batch);

        assert_eq!(once.top_bids(10), twice.top_bids(10));
        assert_eq!(once.top_asks(10), twice.top_asks(10));
        // Only the counter differs.
        assert_eq!(twice.sequence(), once.sequence() + 1);
    }

    #[test]
    fn test_sequence_increments_once_per_batch() {
        let mut book = OrderBook::new("BTC-USD");
        assert_eq!(book.sequence(), 0);

        book.apply_snapshot(&[bid(dec!(1), dec!(1))]);
        assert_eq!(book.sequence(), 1);

        book.apply_update(&[
            change(Side::Bid, dec!(2), dec!(1)),
            change(Side::Bid, dec!(3), dec!(1)),
        ]);
        assert_eq!(book.sequence(), 2);

        book.apply_update(&[]);
        assert_eq!(book.sequence(), 3);
    }

    #[test]
    fn test_best_prices_are_extremes_after_each_batch() {
        let mut book = OrderBook::new("ETH-USD");
        book.apply_snapshot(&[
            bid(dec!(10.1), dec!(1)),
            bid(dec!(10.3), dec!(1)),
            bid(dec!(10.2), dec!(1)),
            ask(dec!(10.6), dec!(1)),
            ask(dec!(10.4), dec!(1)),
            ask(dec!(10.5), dec!(1)),
        ]);
        assert_best_prices_are_extremes(&book);
        assert_eq!(book.best_bid().unwrap().price, dec!(10.3));
        assert_eq!(book.best_ask().unwrap().price, dec!(10.4));

        let batches = vec![
            vec![change(Side::Bid, dec!(10.35), dec!(2))],
            vec![
                change(Side::Ask, dec!(10.4), dec!(0)),
                change(Side::Ask, dec!(10.38), dec!(1)),
            ],
            vec![
                change(Side::Bid, dec!(10.35), dec!(0)),
                change(Side::Bid, dec!(10.3), dec!(0)),
            ],
            vec![change(Side::Ask, dec!(9.99), dec!(5))],
        ];

        for batch in &batches {
            book.apply_update(batch);
            assert_best_prices_are_extremes(&book);
        }

        assert_eq!(book.best_bid().unwrap().price, dec!(10.2));
        assert_eq!(book.best_ask().unwrap().price, dec!(9.99));
    }

    #[test]
    fn test_top_levels_and_spread() {
        let mut book = OrderBook::new("BTC-USD");
        book.apply_snapshot(&[
            bid(dec!(100.0), dec!(1.0)),
            bid(dec!(99.0), dec!(2.0)),
            bid(dec!(98.0), dec!(3.0)),
            ask(dec!(101.0), dec!(1.5)),
            ask(dec!(102.0), dec!(2.5)),
        ]);

        let top_bids = book.top_bids(2);
        assert_eq!(top_bids.len(), 2);
        assert_eq!(top_bids[0].price, dec!(100.0));
        assert_eq!(top_bids[1].price, dec!(99.0));

        let top_asks = book.top_asks(5);
        assert_eq!(top_asks.len(), 2);
        assert_eq!(top_asks[0].price, dec!(101.0));

        assert_eq!(book.mid_price(), Some(dec!(100.5)));
        assert_eq!(book.spread(), Some(dec!(1.0)));
    }

    #[test]
    fn test_equal_prices_with_different_scale_share_a_level() {
        let mut book = OrderBook::new("BTC-USD");
        book.apply_snapshot(&[bid(dec!(100.0), dec!(1))]);

        book.apply_update(&[change(Side::Bid, dec!(100.00), dec!(4))]);
        assert_eq!(book.bid_levels(), 1);
        assert_eq!(book.best_bid().unwrap().quantity, dec!(4));

        book.apply_update(&[change(Side::Bid, dec!(100), dec!(0))]);
        assert_eq!(book.bid_levels(), 0);
    }

    #[test]
    fn test_prices_differing_in_low_digits_stay_distinct() {
        let mut book = OrderBook::new("SHIB-USD");

        let price1 = dec!(0.00000001);
        let price2 = dec!(0.00000002);
        let price3 = dec!(0.00000003);

        book.apply_snapshot(&[
            bid(price3, dec!(3.0)),
            bid(price2, dec!(2.0)),
            bid(price1, dec!(1.0)),
        ]);

        assert_eq!(book.bid_levels(), 3);

        let top = book.top_bids(3);
        assert_eq!(top[0].price, price3);
        assert_eq!(top[1].price, price2);
        assert_eq!(top[2].price, price1);
    }
}
