//! LBank connector façade

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::cancel::CancelWatch;
use crate::connector::{Connector, EventSink, InstrumentCache, INSTRUMENT_CACHE_TTL};
use crate::error::{ConnectorError, ConnectorResult};
use crate::model::{
    AssetInfo, ExchangeId, FundingRate, Identity, Instrument, ListingState, OrderBook, PriceLevel,
    PriceTicker, SubscriptionKey,
};
use crate::ratelimit::RateLimiter;
use crate::rest::RestClient;
use crate::venues::lbank::rest::{LBankCredentials, LBankRest};
use crate::venues::lbank::ws::LBankWs;
use crate::ws::{SessionConfig, WsSession};

pub struct LBankConnector {
    rest: RestClient,
    session: Arc<WsSession<LBankWs>>,
    instrument_cache: InstrumentCache,
}

impl LBankConnector {
    pub fn new(
        rest_base_url: impl Into<String>,
        ws_url: impl Into<String>,
        credentials: Option<LBankCredentials>,
        sink: EventSink,
        cancel: CancelWatch,
    ) -> Self {
        let rest_venue = Arc::new(LBankRest::new(rest_base_url, credentials.clone()));
        let rest = RestClient::new(rest_venue, RateLimiter::new(), Duration::from_secs(10));

        let ws_venue = Arc::new(LBankWs::new(ws_url, credentials));
        let session = Arc::new(WsSession::new(ws_venue, SessionConfig::default(), sink, cancel));

        Self {
            rest,
            session,
            instrument_cache: InstrumentCache::new(INSTRUMENT_CACHE_TTL),
        }
    }

    async fn fetch_instruments_uncached(&self) -> ConnectorResult<Vec<Instrument>> {
        let bytes = self
            .rest
            .do_request(
                Method::GET,
                "/v2/accuracy.do",
                &HashMap::new(),
                &[],
                None,
                false,
                std::future::pending(),
            )
            .await?;
        let contracts: Vec<LBankContract> =
            serde_json::from_slice(&bytes).map_err(|e| ConnectorError::protocol(e.to_string()))?;

        Ok(contracts
            .into_iter()
            .map(|c| {
                let identity = Identity::new(ExchangeId::LBank, c.symbol);
                Instrument {
                    exchange_id: identity.exchange_id,
                    venue_symbol: identity.venue_symbol,
                    canonical: identity.canonical,
                    tick_size: step(c.price_accuracy),
                    lot_size: step(c.quantity_accuracy),
                    contract_multiplier: Decimal::ONE,
                    min_size: dec(&c.min_tran_qua),
                    max_size: None,
                    maker_fee: Decimal::ZERO,
                    taker_fee: Decimal::ZERO,
                    margin_currency: "USDT".to_string(),
                    listing_state: ListingState::Trading,
                }
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct LBankContract {
    symbol: String,
    #[serde(rename = "minTranQua")]
    min_tran_qua: String,
    #[serde(rename = "priceAccuracy")]
    price_accuracy: i32,
    #[serde(rename = "quantityAccuracy")]
    quantity_accuracy: i32,
}

#[derive(Debug, Deserialize)]
struct LBankDepthResp {
    asks: Vec<(String, String)>,
    bids: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct LBankTickerWrapper {
    symbol: String,
    ticker: LBankTickerInner,
}

#[derive(Debug, Deserialize)]
struct LBankTickerInner {
    latest: String,
    vol: String,
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

fn step(accuracy: i32) -> Decimal {
    Decimal::new(1, accuracy.max(0) as u32)
}

#[async_trait]
impl Connector for LBankConnector {
    fn exchange_id(&self) -> ExchangeId {
        ExchangeId::LBank
    }

    async fn run(&self, _cancel: CancelWatch) {
        self.session.run().await;
    }

    async fn subscribe(&self, key: SubscriptionKey) -> ConnectorResult<()> {
        self.session.subscribe(key).await
    }

    async fn unsubscribe(&self, key: SubscriptionKey) -> ConnectorResult<()> {
        self.session.unsubscribe(key).await
    }

    fn reconnect(&self) {
        self.session.force_reconnect();
    }

    async fn fetch_instruments(&self) -> ConnectorResult<Vec<Instrument>> {
        if let Some(cached) = self.instrument_cache.get().await {
            return Ok(cached);
        }
        let instruments = self.fetch_instruments_uncached().await?;
        self.instrument_cache.set(instruments.clone()).await;
        Ok(instruments)
    }

    async fn fetch_orderbook_snapshot(&self, venue_symbol: &str, depth: u32) -> ConnectorResult<OrderBook> {
        let bytes = self
            .rest
            .do_request(
                Method::GET,
                "/v2/depth.do",
                &HashMap::new(),
                &[
                    ("symbol", venue_symbol.to_string()),
                    ("size", depth.to_string()),
                ],
                None,
                false,
                std::future::pending(),
            )
            .await?;
        let resp: LBankDepthResp =
            serde_json::from_slice(&bytes).map_err(|e| ConnectorError::protocol(e.to_string()))?;

        let mut book = OrderBook::empty(ExchangeId::LBank, venue_symbol);
        let bids = resp.bids.iter().map(|(p, q)| PriceLevel::new(dec(p), dec(q))).collect();
        let asks = resp.asks.iter().map(|(p, q)| PriceLevel::new(dec(p), dec(q))).collect();
        book.apply_snapshot(bids, asks, None, chrono::Utc::now());
        Ok(book)
    }

    async fn fetch_funding_rates(&self) -> ConnectorResult<Vec<FundingRate>> {
        // LBank's public API does not expose a funding-rate endpoint on the
        // spot/market-data surface this connector targets; perpetual
        // funding would live on their contract API, out of scope here.
        Ok(Vec::new())
    }

    async fn fetch_price_tickers(&self) -> ConnectorResult<Vec<PriceTicker>> {
        let bytes = self
            .rest
            .do_request(
                Method::GET,
                "/v2/ticker.do",
                &HashMap::new(),
                &[("symbol", "all".to_string())],
                None,
                false,
                std::future::pending(),
            )
            .await?;
        let tickers: Vec<LBankTickerWrapper> =
            serde_json::from_slice(&bytes).map_err(|e| ConnectorError::protocol(e.to_string()))?;

        Ok(tickers
            .into_iter()
            .map(|t| {
                let identity = Identity::new(ExchangeId::LBank, t.symbol);
                PriceTicker {
                    exchange_id: identity.exchange_id,
                    venue_symbol: identity.venue_symbol,
                    canonical: identity.canonical,
                    best_bid: dec(&t.ticker.latest),
                    best_ask: dec(&t.ticker.latest),
                    volume_24h: dec(&t.ticker.vol),
                    timestamp: chrono::Utc::now(),
                }
            })
            .collect())
    }

    async fn fetch_asset_info(&self) -> ConnectorResult<Vec<AssetInfo>> {
        Ok(Vec::new())
    }

    fn is_healthy(&self) -> bool {
        self.session.state() == crate::ws::SessionState::Subscribed
    }
}
