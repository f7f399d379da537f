//! Order-book, price-level and trade canonical types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::identity::{CanonicalSymbol, ExchangeId};

/// `(price, quantity)`, both strictly positive. A level carrying `quantity = 0`
/// in an incremental update means "delete this price" and never exists as a
/// stored `PriceLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }

    pub fn usd_notional(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// One incoming book mutation, venue-agnostic. `quantity = 0` deletes `price`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelUpdate {
    pub price: Decimal,
    pub quantity: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

/// A full or incremental order book snapshot for one `(exchange, venue_symbol)`.
///
/// Invariants: `bids` strictly descending by price, `asks`
/// strictly ascending by price, every stored level has `quantity > 0`, and
/// `best_bid < best_ask` whenever both sides are non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub exchange_id: ExchangeId,
    pub venue_symbol: String,
    pub canonical: CanonicalSymbol,
    pub timestamp: DateTime<Utc>,
    pub sequence_id: Option<u64>,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub is_snapshot: bool,
}

impl OrderBook {
    /// An empty book ready to receive a venue snapshot.
    pub fn empty(exchange_id: ExchangeId, venue_symbol: impl Into<String>) -> Self {
        let venue_symbol = venue_symbol.into();
        let canonical = CanonicalSymbol::from_venue_symbol(&venue_symbol);
        Self {
            exchange_id,
            venue_symbol,
            canonical,
            timestamp: Utc::now(),
            sequence_id: None,
            bids: Vec::new(),
            asks: Vec::new(),
            is_snapshot: true,
        }
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.first().copied()
    }

    /// `(best_ask - best_bid) / best_bid * 10_000`, `None` unless both sides
    /// are populated.
    pub fn spread_bps(&self) -> Option<Decimal> {
        let bid = self.best_bid()?.price;
        let ask = self.best_ask()?.price;
        if bid.is_zero() {
            return None;
        }
        Some((ask - bid) / bid * Decimal::from(10_000))
    }

    /// Sum of `price * quantity` over the top `n` levels of `side`. Used for
    /// the discovery engine's depth-USD computation.
    pub fn depth_usd(&self, side: Side, n: usize) -> Decimal {
        let levels = match side {
            Side::Bid => &self.bids,
            Side::Ask => &self.asks,
        };
        levels.iter().take(n).map(PriceLevel::usd_notional).sum()
    }

    /// Replace this book with a fresh full snapshot, already level-ordered.
    pub fn apply_snapshot(
        &mut self,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        sequence_id: Option<u64>,
        timestamp: DateTime<Utc>,
    ) {
        self.bids = sort_side(bids, Side::Bid);
        self.asks = sort_side(asks, Side::Ask);
        self.sequence_id = sequence_id;
        self.timestamp = timestamp;
        self.is_snapshot = true;
    }

    /// Apply a batch of incremental level mutations. A `quantity = 0` entry
    /// deletes that price (idempotent: deleting an absent key is a no-op);
    /// any other quantity replaces the stored quantity at that price.
    pub fn apply_deltas(
        &mut self,
        side: Side,
        updates: &[LevelUpdate],
        sequence_id: Option<u64>,
        timestamp: DateTime<Utc>,
    ) {
        let levels = match side {
            Side::Bid => &mut self.bids,
            Side::Ask => &mut self.asks,
        };

        for update in updates {
            let pos = levels.iter().position(|l| l.price == update.price);
            if update.quantity.is_zero() {
                if let Some(idx) = pos {
                    levels.remove(idx);
                }
                continue;
            }
            match pos {
                Some(idx) => levels[idx].quantity = update.quantity,
                None => levels.push(PriceLevel::new(update.price, update.quantity)),
            }
        }

        match side {
            Side::Bid => self.bids = sort_side(std::mem::take(&mut self.bids), Side::Bid),
            Side::Ask => self.asks = sort_side(std::mem::take(&mut self.asks), Side::Ask),
        }

        self.sequence_id = sequence_id;
        self.timestamp = timestamp;
        self.is_snapshot = false;
    }

    /// True once both sides carry at least one level with `best_bid < best_ask`.
    pub fn is_crossed_or_empty(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => b.price >= a.price,
            _ => true,
        }
    }
}

fn sort_side(mut levels: Vec<PriceLevel>, side: Side) -> Vec<PriceLevel> {
    match side {
        Side::Bid => levels.sort_by(|a, b| b.price.cmp(&a.price)),
        Side::Ask => levels.sort_by(|a, b| a.price.cmp(&b.price)),
    }
    levels
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub exchange_id: ExchangeId,
    pub venue_symbol: String,
    pub canonical: CanonicalSymbol,
    pub trade_id: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub side: TradeSide,
    pub timestamp_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn book() -> OrderBook {
        OrderBook::empty(ExchangeId::Okx, "BTC-USDT-SWAP")
    }

    #[test]
    fn snapshot_orders_both_sides_correctly() {
        let mut b = book();
        b.apply_snapshot(
            vec![
                PriceLevel::new(dec!(100), dec!(1)),
                PriceLevel::new(dec!(102), dec!(1)),
                PriceLevel::new(dec!(101), dec!(1)),
            ],
            vec![
                PriceLevel::new(dec!(105), dec!(1)),
                PriceLevel::new(dec!(103), dec!(1)),
                PriceLevel::new(dec!(104), dec!(1)),
            ],
            Some(1),
            Utc::now(),
        );
        assert_eq!(
            b.bids.iter().map(|l| l.price).collect::<Vec<_>>(),
            vec![dec!(102), dec!(101), dec!(100)]
        );
        assert_eq!(
            b.asks.iter().map(|l| l.price).collect::<Vec<_>>(),
            vec![dec!(103), dec!(104), dec!(105)]
        );
        assert!(b.best_bid().unwrap().price < b.best_ask().unwrap().price);
    }

    #[test]
    fn zero_quantity_delta_deletes_level() {
        let mut b = book();
        b.apply_snapshot(
            vec![PriceLevel::new(dec!(100), dec!(1))],
            vec![PriceLevel::new(dec!(101), dec!(1))],
            Some(1),
            Utc::now(),
        );
        b.apply_deltas(
            Side::Bid,
            &[LevelUpdate {
                price: dec!(100),
                quantity: dec!(0),
            }],
            Some(2),
            Utc::now(),
        );
        assert!(b.bids.is_empty());
    }

    #[test]
    fn deleting_absent_level_is_a_noop() {
        let mut b = book();
        b.apply_snapshot(
            vec![PriceLevel::new(dec!(100), dec!(1))],
            vec![],
            Some(1),
            Utc::now(),
        );
        // Apply the same delete twice: idempotent.
        for _ in 0..2 {
            b.apply_deltas(
                Side::Bid,
                &[LevelUpdate {
                    price: dec!(999),
                    quantity: dec!(0),
                }],
                Some(2),
                Utc::now(),
            );
        }
        assert_eq!(b.bids.len(), 1);
    }

    #[test]
    fn applying_same_delta_twice_is_idempotent() {
        let mut a = book();
        let mut c = book();
        let upd = LevelUpdate {
            price: dec!(100),
            quantity: dec!(5),
        };
        a.apply_deltas(Side::Bid, &[upd], Some(1), Utc::now());
        a.apply_deltas(Side::Bid, &[upd], Some(2), Utc::now());
        c.apply_deltas(Side::Bid, &[upd], Some(1), Utc::now());
        assert_eq!(a.bids, c.bids);
    }

    #[test]
    fn depth_usd_sums_top_n_levels() {
        let mut b = book();
        b.apply_snapshot(
            vec![],
            (1..=10)
                .map(|i| PriceLevel::new(Decimal::from(100 + i), dec!(1)))
                .collect(),
            Some(1),
            Utc::now(),
        );
        let top5: Decimal = (101..=105).map(Decimal::from).sum();
        assert_eq!(b.depth_usd(Side::Ask, 5), top5);
    }
}
