//! Per-canonical cross-venue fan-in and periodic publication tick
//!

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::cancel::CancelWatch;
use crate::model::{
    spread_id, CanonicalSymbol, ExchangeId, FundingRate, MarketEvent, OrderBook, Side,
    SpreadOpportunity,
};
use crate::publish::Publisher;

/// Top N levels per side summed for depth USD (GLOSSARY "Depth USD").
const DEPTH_LEVELS: usize = 5;

#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub min_spread_bps: f64,
    pub min_depth_usd_floor: f64,
    pub publish_interval: Duration,
    pub top_k: usize,
    pub freshness_window: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            min_spread_bps: 5.0,
            min_depth_usd_floor: 5_000.0,
            publish_interval: Duration::from_millis(500),
            top_k: 100,
            freshness_window: Duration::from_secs(3),
        }
    }
}

#[derive(Default)]
struct State {
    books: HashMap<CanonicalSymbol, HashMap<ExchangeId, OrderBook>>,
    funding: HashMap<CanonicalSymbol, HashMap<ExchangeId, FundingRate>>,
    spreads: HashMap<String, SpreadOpportunity>,
}

/// Owns the `books`/`funding`/`spreads` triple behind one lock, held only
/// for the duration of a single structured update.
pub struct DiscoveryEngine {
    state: Mutex<State>,
    config: DiscoveryConfig,
    publisher: Arc<dyn Publisher>,
}

impl DiscoveryEngine {
    pub fn new(config: DiscoveryConfig, publisher: Arc<dyn Publisher>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            config,
            publisher,
        }
    }

    /// Drains `events` and ticks the publication timer until `cancel` fires.
    pub async fn run(&self, mut events: mpsc::Receiver<MarketEvent>, mut cancel: CancelWatch) {
        let mut ticker = tokio::time::interval(self.config.publish_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = ticker.tick() => self.publish_tick().await,
                event = events.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => return,
                    }
                }
            }
        }
    }

    /// Feed a single event outside of `run()`'s channel loop. `run()` is
    /// this method's only caller in production; exposed directly so callers
    /// (and tests) can drive the engine without standing up a channel.
    pub fn ingest(&self, event: MarketEvent) {
        self.handle_event(event);
    }

    /// A sorted-by-score snapshot of every currently tracked opportunity,
    /// regardless of `top_k` (the tick applies that truncation at publish
    /// time, not at storage time).
    pub fn opportunities(&self) -> Vec<SpreadOpportunity> {
        let state = self.state.lock();
        let mut snapshot: Vec<SpreadOpportunity> = state.spreads.values().cloned().collect();
        snapshot.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        snapshot
    }

    fn handle_event(&self, event: MarketEvent) {
        match event {
            MarketEvent::OrderBook(book) => self.on_order_book(book),
            MarketEvent::FundingRate(rate) => self.on_funding_rate(rate),
            MarketEvent::Error(err) => warn!(error = %err, "connector error event"),
            MarketEvent::Connected { exchange_id } => debug!(%exchange_id, "connector connected"),
            MarketEvent::Disconnected { exchange_id } => debug!(%exchange_id, "connector disconnected"),
            MarketEvent::Trade(_) | MarketEvent::PriceTicker(_) | MarketEvent::AssetInfo(_) => {}
        }
    }

    fn on_order_book(&self, book: OrderBook) {
        let mut state = self.state.lock();
        let canonical = book.canonical.clone();
        let exchange_id = book.exchange_id;
        state
            .books
            .entry(canonical.clone())
            .or_default()
            .insert(exchange_id, book);

        let exchanges: Vec<ExchangeId> = state
            .books
            .get(&canonical)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default();

        for &long_id in &exchanges {
            for &short_id in &exchanges {
                if long_id == short_id {
                    continue;
                }
                self.check_spread(&mut state, &canonical, long_id, short_id);
            }
        }
    }

    fn on_funding_rate(&self, rate: FundingRate) {
        let mut state = self.state.lock();
        let canonical = rate.canonical.clone();
        let exchange_id = rate.exchange_id;
        state
            .funding
            .entry(canonical.clone())
            .or_default()
            .insert(exchange_id, rate);

        let exchanges: Vec<ExchangeId> = state
            .books
            .get(&canonical)
            .map(|m| m.keys().copied().collect())
            .unwrap_or_default();

        for &long_id in &exchanges {
            for &short_id in &exchanges {
                if long_id == short_id {
                    continue;
                }
                self.check_spread(&mut state, &canonical, long_id, short_id);
            }
        }
    }

    /// `checkSpread`: upserts `spreads[spread_id]` when both
    /// thresholds hold; otherwise leaves any existing entry untouched. A
    /// stale entry is dropped at publish time by `publish_tick`'s
    /// freshness-window filter rather than here, so a canonical symbol that
    /// stops updating entirely still ages out instead of being republished
    /// forever from its last observation.
    fn check_spread(
        &self,
        state: &mut State,
        canonical: &CanonicalSymbol,
        long_id: ExchangeId,
        short_id: ExchangeId,
    ) {
        let books = match state.books.get(canonical) {
            Some(b) => b,
            None => return,
        };
        let (long_ob, short_ob) = match (books.get(&long_id), books.get(&short_id)) {
            (Some(l), Some(s)) => (l, s),
            _ => return,
        };

        let long_ask = match long_ob.best_ask() {
            Some(level) if level.price.is_sign_positive() && !level.price.is_zero() => level,
            _ => return,
        };
        let short_bid = match short_ob.best_bid() {
            Some(level) if level.price.is_sign_positive() && !level.price.is_zero() => level,
            _ => return,
        };

        let long_ask_price = long_ask.price.to_f64().unwrap_or(0.0);
        let short_bid_price = short_bid.price.to_f64().unwrap_or(0.0);
        if long_ask_price <= 0.0 {
            return;
        }

        let spread_bps = (short_bid_price - long_ask_price) / long_ask_price * 10_000.0;
        if spread_bps < self.config.min_spread_bps {
            return;
        }

        let long_depth = long_ob.depth_usd(Side::Ask, DEPTH_LEVELS).to_f64().unwrap_or(0.0);
        let short_depth = short_ob.depth_usd(Side::Bid, DEPTH_LEVELS).to_f64().unwrap_or(0.0);
        let min_depth_usd = long_depth.min(short_depth);
        if min_depth_usd < self.config.min_depth_usd_floor {
            return;
        }

        let long_funding = state
            .funding
            .get(canonical)
            .and_then(|m| m.get(&long_id))
            .map(|f| f.funding_rate)
            .unwrap_or(0.0);
        let short_funding = state
            .funding
            .get(canonical)
            .and_then(|m| m.get(&short_id))
            .map(|f| f.funding_rate)
            .unwrap_or(0.0);
        let net_funding = short_funding - long_funding;

        let score = spread_bps * (min_depth_usd + 1.0).log10() * (1.0 + net_funding * 100.0);

        let opportunity = SpreadOpportunity {
            canonical: canonical.clone(),
            long_exchange: long_id,
            short_exchange: short_id,
            long_venue_symbol: long_ob.venue_symbol.clone(),
            short_venue_symbol: short_ob.venue_symbol.clone(),
            long_ask: long_ask_price,
            short_bid: short_bid_price,
            spread_bps,
            long_funding,
            short_funding,
            net_funding,
            long_depth_usd: long_depth,
            short_depth_usd: short_depth,
            min_depth_usd,
            score,
            updated_at: chrono::Utc::now(),
        };

        state.spreads.insert(opportunity.id(), opportunity);
    }

    async fn publish_tick(&self) {
        let now = chrono::Utc::now();
        let mut snapshot: Vec<SpreadOpportunity> = {
            let state = self.state.lock();
            state
                .spreads
                .values()
                .filter(|o| {
                    now.signed_duration_since(o.updated_at)
                        .to_std()
                        .map(|age| age <= self.config.freshness_window)
                        .unwrap_or(false)
                })
                .cloned()
                .collect()
        };
        snapshot.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        snapshot.truncate(self.config.top_k);

        for opportunity in &snapshot {
            let bytes = match serde_json::to_vec(opportunity) {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "failed to serialise spread opportunity");
                    continue;
                }
            };
            let spread_key = format!("spread:{}", opportunity.id());
            self.publisher.set_latest(&spread_key, bytes.clone()).await;
            self.publisher.publish(&spread_key, bytes.clone()).await;
            self.publisher
                .publish(&format!("spread:{}", opportunity.canonical), bytes)
                .await;
        }

        let top_10: Vec<&SpreadOpportunity> = snapshot.iter().take(10).collect();
        let summary = serde_json::json!({
            "timestamp": chrono::Utc::now(),
            "count": snapshot.len(),
            "top_10": top_10,
            "spreads": snapshot,
        });
        match serde_json::to_vec(&summary) {
            Ok(bytes) => {
                self.publisher.publish("spreads:summary", bytes.clone()).await;
                self.publisher.set_list(bytes).await;
            }
            Err(e) => warn!(error = %e, "failed to serialise spreads summary"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Identity, PriceLevel};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingPublisher {
        publishes: AtomicUsize,
    }

    #[async_trait]
    impl Publisher for CountingPublisher {
        async fn set_latest(&self, _key: &str, _bytes: Vec<u8>) {}
        async fn publish(&self, _channel: &str, _bytes: Vec<u8>) {
            self.publishes.fetch_add(1, Ordering::SeqCst);
        }
        async fn set_list(&self, _bytes: Vec<u8>) {}
    }

    fn book(exchange_id: ExchangeId, venue_symbol: &str, bid: &str, ask: &str) -> OrderBook {
        let identity = Identity::new(exchange_id, venue_symbol);
        let mut b = OrderBook::empty(identity.exchange_id, identity.venue_symbol);
        b.apply_snapshot(
            vec![PriceLevel::new(bid.parse().unwrap(), "1".parse().unwrap())],
            vec![PriceLevel::new(ask.parse().unwrap(), "1".parse().unwrap())],
            Some(1),
            chrono::Utc::now(),
        );
        // Top-5 depth uses only one level here; inflate quantity so depth
        // clears the default 5,000 USD floor.
        b.bids[0].quantity = "100".parse().unwrap();
        b.asks[0].quantity = "100".parse().unwrap();
        b
    }

    #[test]
    fn publishes_a_spread_once_both_sides_clear_the_thresholds() {
        let engine = DiscoveryEngine::new(DiscoveryConfig::default(), Arc::new(CountingPublisher::default()));
        engine.on_order_book(book(ExchangeId::Okx, "BTC-USDT", "59999", "60000"));
        engine.on_order_book(book(ExchangeId::GateIo, "BTC_USDT", "60030", "60031"));

        let state = engine.state.lock();
        let opp = state
            .spreads
            .values()
            .find(|o| o.long_exchange == ExchangeId::Okx && o.short_exchange == ExchangeId::GateIo)
            .expect("expected an okx-long/gateio-short opportunity");
        assert!(opp.spread_bps >= 5.0);
        assert!(opp.min_depth_usd >= 5_000.0);
    }

    #[test]
    fn rejects_a_spread_below_the_minimum_bps_threshold() {
        let engine = DiscoveryEngine::new(DiscoveryConfig::default(), Arc::new(CountingPublisher::default()));
        engine.on_order_book(book(ExchangeId::Okx, "BTC-USDT", "59999", "60000"));
        engine.on_order_book(book(ExchangeId::GateIo, "BTC_USDT", "60001", "60002"));

        let state = engine.state.lock();
        assert!(state
            .spreads
            .values()
            .all(|o| !(o.long_exchange == ExchangeId::Okx && o.short_exchange == ExchangeId::GateIo)));
    }

    #[tokio::test]
    async fn publish_tick_emits_per_opportunity_and_summary_messages() {
        let publisher = Arc::new(CountingPublisher::default());
        let engine = DiscoveryEngine::new(DiscoveryConfig::default(), publisher.clone());
        engine.on_order_book(book(ExchangeId::Okx, "BTC-USDT", "59999", "60000"));
        engine.on_order_book(book(ExchangeId::GateIo, "BTC_USDT", "60030", "60031"));

        engine.publish_tick().await;

        // 2 per-opportunity publishes (spread:<id>, spread:<canonical>) + 1 summary.
        assert_eq!(publisher.publishes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn publish_tick_drops_opportunities_older_than_the_freshness_window() {
        let mut config = DiscoveryConfig::default();
        config.freshness_window = Duration::from_secs(60);
        let publisher = Arc::new(CountingPublisher::default());
        let engine = DiscoveryEngine::new(config, publisher.clone());
        engine.on_order_book(book(ExchangeId::Okx, "BTC-USDT", "59999", "60000"));
        engine.on_order_book(book(ExchangeId::GateIo, "BTC_USDT", "60030", "60031"));

        {
            let mut state = engine.state.lock();
            for opportunity in state.spreads.values_mut() {
                opportunity.updated_at = chrono::Utc::now() - chrono::Duration::seconds(120);
            }
        }

        engine.publish_tick().await;

        // Only the summary publish fires; every opportunity aged out.
        assert_eq!(publisher.publishes.load(Ordering::SeqCst), 1);
    }
}
