//! The generic connector façade every venue implements
//!
//! `async_trait` is pulled in here because, unlike `VenueRest`/`VenueWs`
//! (pure sync glue consumed by a single generic caller), `Connector` is
//! stored as a trait object in the supervisor and every method is genuinely
//! asynchronous I/O.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;

use crate::cancel::CancelWatch;
use crate::error::ConnectorResult;
use crate::model::{AssetInfo, ExchangeId, FundingRate, Instrument, MarketEvent, OrderBook, PriceTicker, SubscriptionKey};

/// One venue's full surface: REST snapshots plus a managed WS stream.
/// Implementors own their `RestClient` and `WsSession` internally; the
/// supervisor only ever sees this trait.
#[async_trait]
pub trait Connector: Send + Sync {
    fn exchange_id(&self) -> ExchangeId;

    /// Start the underlying WS session's reconnect loop. Returns once
    /// `cancel` fires; the supervisor spawns this as its own task.
    async fn run(&self, cancel: CancelWatch);

    async fn subscribe(&self, key: SubscriptionKey) -> ConnectorResult<()>;
    async fn unsubscribe(&self, key: SubscriptionKey) -> ConnectorResult<()>;

    /// Force the underlying WS session to drop and redial immediately,
    /// bypassing its normal backoff once. Called by the supervisor's health
    /// sweep when a session is found off `Subscribed` without having raised
    /// a transport error of its own (stuck dialing, or hung authenticating).
    fn reconnect(&self);

    async fn fetch_instruments(&self) -> ConnectorResult<Vec<Instrument>>;
    async fn fetch_orderbook_snapshot(&self, venue_symbol: &str, depth: u32) -> ConnectorResult<OrderBook>;
    async fn fetch_funding_rates(&self) -> ConnectorResult<Vec<FundingRate>>;
    async fn fetch_price_tickers(&self) -> ConnectorResult<Vec<PriceTicker>>;
    async fn fetch_asset_info(&self) -> ConnectorResult<Vec<AssetInfo>>;

    /// Whether the WS session most recently reported connected+subscribed
    ///
    fn is_healthy(&self) -> bool;
}

/// Shared polling cadence for REST-only surfaces (instruments/funding/asset
/// info aren't pushed over WS by any of the four venues in scope).
pub const REST_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Instrument metadata (tick size, lot size, listing state) changes far less
/// often than quotes do; a connector's `fetch_instruments` is cached behind
/// this TTL so the façade doesn't re-hit REST on every `subscribe` call.
pub const INSTRUMENT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Per-connector cache for `fetch_instruments`, keyed implicitly by whichever
/// connector owns it. Lazily populated on first use and refreshed once stale.
pub struct InstrumentCache {
    ttl: Duration,
    cached: AsyncMutex<Option<(Instant, Vec<Instrument>)>>,
}

impl InstrumentCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            cached: AsyncMutex::new(None),
        }
    }

    /// The cached instrument list, if one exists and is still within `ttl`.
    pub async fn get(&self) -> Option<Vec<Instrument>> {
        let guard = self.cached.lock().await;
        guard
            .as_ref()
            .filter(|(fetched_at, _)| fetched_at.elapsed() < self.ttl)
            .map(|(_, instruments)| instruments.clone())
    }

    pub async fn set(&self, instruments: Vec<Instrument>) {
        *self.cached.lock().await = Some((Instant::now(), instruments));
    }
}

/// The channel every connector forwards `MarketEvent`s into; owned by the
/// supervisor, cloned into each connector at construction.
pub type EventSink = mpsc::Sender<MarketEvent>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExchangeId, Identity, ListingState};
    use rust_decimal::Decimal;

    fn instrument(symbol: &str) -> Instrument {
        let identity = Identity::new(ExchangeId::Okx, symbol.to_string());
        Instrument {
            exchange_id: identity.exchange_id,
            venue_symbol: identity.venue_symbol,
            canonical: identity.canonical,
            tick_size: Decimal::new(1, 2),
            lot_size: Decimal::ONE,
            contract_multiplier: Decimal::ONE,
            min_size: Decimal::ONE,
            max_size: None,
            maker_fee: Decimal::ZERO,
            taker_fee: Decimal::ZERO,
            margin_currency: "USDT".to_string(),
            listing_state: ListingState::Trading,
        }
    }

    #[tokio::test]
    async fn a_fresh_cache_starts_empty() {
        let cache = InstrumentCache::new(Duration::from_secs(60));
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn set_then_get_returns_the_cached_list_within_the_ttl() {
        let cache = InstrumentCache::new(Duration::from_secs(60));
        cache.set(vec![instrument("BTC-USDT-SWAP")]).await;

        let cached = cache.get().await.expect("cache should be populated");
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].venue_symbol, "BTC-USDT-SWAP");
    }

    #[tokio::test]
    async fn an_entry_older_than_the_ttl_is_treated_as_absent() {
        let cache = InstrumentCache::new(Duration::from_millis(10));
        cache.set(vec![instrument("BTC-USDT-SWAP")]).await;

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(cache.get().await.is_none());
    }
}
