//! Gate.io connector façade

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
    PriceTicker, SubscriptionKey, DEFAULT_FUNDING_INTERVAL_HOURS,
};
use crate::ratelimit::RateLimiter;
use crate::rest::RestClient;
use crate::venues::gateio::rest::{GateIoCredentials, GateIoRest};
use crate::venues::gateio::ws::GateIoWs;
use crate::ws::{SessionConfig, WsSession};

pub struct GateIoConnector {
    rest: RestClient,
    session: Arc<WsSession<GateIoWs>>,
    settlement: String,
    instrument_cache: InstrumentCache,
}

impl GateIoConnector {
    pub fn new(
        rest_base_url: impl Into<String>,
        ws_url: impl Into<String>,
        settlement: impl Into<String>,
        credentials: Option<GateIoCredentials>,
        sink: EventSink,
        cancel: CancelWatch,
    ) -> Self {
        let settlement = settlement.into();
        let rest_venue = Arc::new(GateIoRest::new(rest_base_url, credentials.clone()));
        let rest = RestClient::new(rest_venue, RateLimiter::new(), Duration::from_secs(10));

        let ws_venue = Arc::new(GateIoWs::new(ws_url, settlement.clone(), credentials));
        let session = Arc::new(WsSession::new(ws_venue, SessionConfig::default(), sink, cancel));

        Self {
            rest,
            session,
            settlement,
            instrument_cache: InstrumentCache::new(INSTRUMENT_CACHE_TTL),
        }
    }

    fn contracts_path(&self) -> String {
        format!("/api/v4/futures/{}/contracts", self.settlement)
    }

    fn tickers_path(&self) -> String {
        format!("/api/v4/futures/{}/tickers", self.settlement)
    }

    fn order_book_path(&self) -> String {
        format!("/api/v4/futures/{}/order_book", self.settlement)
    }

    async fn fetch_instruments_uncached(&self) -> ConnectorResult<Vec<Instrument>> {
        let bytes = self
            .rest
            .do_request(
                Method::GET,
                &self.contracts_path(),
                &HashMap::new(),
                &[],
                None,
                false,
                std::future::pending(),
            )
            .await?;
        let contracts: Vec<GateContract> =
            serde_json::from_slice(&bytes).map_err(|e| ConnectorError::protocol(e.to_string()))?;

        Ok(contracts
            .into_iter()
            .map(|c| {
                let identity = Identity::new(ExchangeId::GateIo, c.name);
                Instrument {
                    exchange_id: identity.exchange_id,
                    venue_symbol: identity.venue_symbol,
                    canonical: identity.canonical,
                    tick_size: dec(&c.order_price_round),
                    lot_size: Decimal::ONE,
                    contract_multiplier: dec(&c.quanto_multiplier),
                    min_size: Decimal::from(c.order_size_min),
                    max_size: Some(Decimal::from(c.order_size_max)),
                    maker_fee: dec(&c.maker_fee_rate),
                    taker_fee: dec(&c.taker_fee_rate),
                    margin_currency: self.settlement.to_ascii_uppercase(),
                    listing_state: if c.in_delisting {
                        ListingState::Delisted
                    } else {
                        ListingState::Trading
                    },
                }
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct GateContract {
    name: String,
    #[serde(rename = "order_price_round")]
    order_price_round: String,
    #[serde(rename = "order_size_min")]
    order_size_min: i64,
    #[serde(rename = "order_size_max")]
    order_size_max: i64,
    #[serde(rename = "quanto_multiplier")]
    quanto_multiplier: String,
    #[serde(rename = "maker_fee_rate")]
    maker_fee_rate: String,
    #[serde(rename = "taker_fee_rate")]
    taker_fee_rate: String,
    #[serde(rename = "funding_rate")]
    funding_rate: String,
    #[serde(rename = "funding_next_apply")]
    funding_next_apply: i64,
    in_delisting: bool,
}

#[derive(Debug, Deserialize)]
struct GateTickerResp {
    contract: String,
    highest_bid: String,
    lowest_ask: String,
    volume_24h: String,
}

#[derive(Debug, Deserialize)]
struct GateOrderBookLevel {
    p: String,
    s: i64,
}

#[derive(Debug, Deserialize)]
struct GateOrderBookResp {
    asks: Vec<GateOrderBookLevel>,
    bids: Vec<GateOrderBookLevel>,
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

#[async_trait]
impl Connector for GateIoConnector {
    fn exchange_id(&self) -> ExchangeId {
        ExchangeId::GateIo
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
                &self.order_book_path(),
                &HashMap::new(),
                &[
                    ("contract", venue_symbol.to_string()),
                    ("limit", depth.to_string()),
                ],
                None,
                false,
                std::future::pending(),
            )
            .await?;
        let resp: GateOrderBookResp =
            serde_json::from_slice(&bytes).map_err(|e| ConnectorError::protocol(e.to_string()))?;

        let mut book = OrderBook::empty(ExchangeId::GateIo, venue_symbol);
        let bids = resp
            .bids
            .iter()
            .map(|l| PriceLevel::new(dec(&l.p), Decimal::from(l.s)))
            .collect();
        let asks = resp
            .asks
            .iter()
            .map(|l| PriceLevel::new(dec(&l.p), Decimal::from(l.s)))
            .collect();
        book.apply_snapshot(bids, asks, None, chrono::Utc::now());
        Ok(book)
    }

    async fn fetch_funding_rates(&self) -> ConnectorResult<Vec<FundingRate>> {
        let bytes = self
            .rest
            .do_request(
                Method::GET,
                &self.contracts_path(),
                &HashMap::new(),
                &[],
                None,
                false,
                std::future::pending(),
            )
            .await?;
        let contracts: Vec<GateContract> =
            serde_json::from_slice(&bytes).map_err(|e| ConnectorError::protocol(e.to_string()))?;

        Ok(contracts
            .into_iter()
            .map(|c| {
                let canonical = crate::model::CanonicalSymbol::from_venue_symbol(&c.name);
                FundingRate {
                    exchange_id: ExchangeId::GateIo,
                    canonical,
                    funding_rate: c.funding_rate.parse().unwrap_or(0.0),
                    next_funding_time: chrono::DateTime::from_timestamp(c.funding_next_apply, 0)
                        .unwrap_or_else(chrono::Utc::now),
                    interval_hours: DEFAULT_FUNDING_INTERVAL_HOURS,
                    timestamp: chrono::Utc::now(),
                }
            })
            .collect())
    }

    async fn fetch_price_tickers(&self) -> ConnectorResult<Vec<PriceTicker>> {
        let bytes = self
            .rest
            .do_request(
                Method::GET,
                &self.tickers_path(),
                &HashMap::new(),
                &[],
                None,
                false,
                std::future::pending(),
            )
            .await?;
        let tickers: Vec<GateTickerResp> =
            serde_json::from_slice(&bytes).map_err(|e| ConnectorError::protocol(e.to_string()))?;

        Ok(tickers
            .into_iter()
            .map(|t| {
                let identity = Identity::new(ExchangeId::GateIo, t.contract);
                PriceTicker {
                    exchange_id: identity.exchange_id,
                    venue_symbol: identity.venue_symbol,
                    canonical: identity.canonical,
                    best_bid: dec(&t.highest_bid),
                    best_ask: dec(&t.lowest_ask),
                    volume_24h: dec(&t.volume_24h),
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
