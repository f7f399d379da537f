//! End-to-end discovery-engine scenarios, independent of any real socket.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal_macros::dec;

use spreadgrid::discovery::{DiscoveryConfig, DiscoveryEngine};
use spreadgrid::model::{
    ExchangeId, FundingRate, Identity, MarketEvent, OrderBook, PriceLevel, SpreadOpportunity,
};
use spreadgrid::publish::Publisher;

fn find_opportunity(
    engine: &DiscoveryEngine,
    long: ExchangeId,
    short: ExchangeId,
) -> Option<SpreadOpportunity> {
    engine
        .opportunities()
        .into_iter()
        .find(|o| o.long_exchange == long && o.short_exchange == short)
}

#[derive(Default)]
struct RecordingPublisher {
    publishes: AtomicUsize,
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn set_latest(&self, _key: &str, _bytes: Vec<u8>) {}
    async fn publish(&self, _channel: &str, _bytes: Vec<u8>) {
        self.publishes.fetch_add(1, Ordering::SeqCst);
    }
    async fn set_list(&self, _bytes: Vec<u8>) {}
}

fn book_with_depth(
    exchange_id: ExchangeId,
    venue_symbol: &str,
    bid: rust_decimal::Decimal,
    ask: rust_decimal::Decimal,
    depth_qty: rust_decimal::Decimal,
) -> OrderBook {
    let identity = Identity::new(exchange_id, venue_symbol);
    let mut book = OrderBook::empty(identity.exchange_id, identity.venue_symbol);
    book.apply_snapshot(
        vec![PriceLevel::new(bid, depth_qty)],
        vec![PriceLevel::new(ask, depth_qty)],
        Some(1),
        chrono::Utc::now(),
    );
    book
}

// Two venues quoting the same canonical via different spellings produce a
// 5.0 bps spread, with both sides clearing the default 5,000 USD depth floor.
#[test]
fn s1_cross_venue_spread_is_discovered_and_meets_thresholds() {
    let engine = DiscoveryEngine::new(
        DiscoveryConfig::default(),
        Arc::new(RecordingPublisher::default()),
    );

    engine.ingest(MarketEvent::OrderBook(book_with_depth(
        ExchangeId::Okx,
        "BTC_USDT",
        dec!(59999),
        dec!(60000),
        dec!(1),
    )));
    engine.ingest(MarketEvent::OrderBook(book_with_depth(
        ExchangeId::GateIo,
        "BTCUSDT",
        dec!(60030),
        dec!(60031),
        dec!(1),
    )));

    let opportunity = find_opportunity(&engine, ExchangeId::Okx, ExchangeId::GateIo)
        .expect("okx-long/gateio-short opportunity should be published");

    assert!((opportunity.spread_bps - 5.0).abs() < 0.01);
    assert!(opportunity.min_depth_usd >= 5_000.0);
}

// Funding-aware score: the score should land around 20.4 given the stated
// spread, depth and funding inputs.
#[test]
fn s5_score_accounts_for_net_funding() {
    let engine = DiscoveryEngine::new(
        DiscoveryConfig::default(),
        Arc::new(RecordingPublisher::default()),
    );

    // depth_qty chosen so depth_usd(top-5) ~= 10,000 on both sides.
    engine.ingest(MarketEvent::OrderBook(book_with_depth(
        ExchangeId::Okx,
        "ETH_USDT",
        dec!(2999),
        dec!(3000),
        dec!(3.333333),
    )));
    engine.ingest(MarketEvent::FundingRate(FundingRate {
        exchange_id: ExchangeId::Okx,
        canonical: Identity::new(ExchangeId::Okx, "ETH_USDT").canonical,
        funding_rate: 0.0001,
        next_funding_time: chrono::Utc::now(),
        interval_hours: 8,
        timestamp: chrono::Utc::now(),
    }));
    engine.ingest(MarketEvent::OrderBook(book_with_depth(
        ExchangeId::GateIo,
        "ETHUSDT",
        dec!(3001.5),
        dec!(3002.5),
        dec!(3.332223),
    )));
    engine.ingest(MarketEvent::FundingRate(FundingRate {
        exchange_id: ExchangeId::GateIo,
        canonical: Identity::new(ExchangeId::GateIo, "ETHUSDT").canonical,
        funding_rate: 0.0003,
        next_funding_time: chrono::Utc::now(),
        interval_hours: 8,
        timestamp: chrono::Utc::now(),
    }));

    let opportunity = find_opportunity(&engine, ExchangeId::Okx, ExchangeId::GateIo)
        .expect("okx-long/gateio-short opportunity should be published");

    assert!((opportunity.spread_bps - 5.0).abs() < 0.1);
    assert!((opportunity.net_funding - 0.0002).abs() < 1e-9);
    assert!(opportunity.score > 15.0 && opportunity.score < 25.0);
}

// Boundary: a spread below min_spread_bps must not be published.
#[test]
fn boundary_spread_just_under_threshold_is_rejected() {
    let engine = DiscoveryEngine::new(
        DiscoveryConfig::default(),
        Arc::new(RecordingPublisher::default()),
    );

    engine.ingest(MarketEvent::OrderBook(book_with_depth(
        ExchangeId::Okx,
        "BTC_USDT",
        dec!(59999),
        dec!(60000),
        dec!(1),
    )));
    engine.ingest(MarketEvent::OrderBook(book_with_depth(
        ExchangeId::GateIo,
        "BTCUSDT",
        dec!(60029.99),
        dec!(60030.99),
        dec!(1),
    )));

    assert!(find_opportunity(&engine, ExchangeId::Okx, ExchangeId::GateIo)
        .is_none());
}
