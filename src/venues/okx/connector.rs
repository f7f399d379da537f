//! OKX connector façade: wires the REST client and WS
//! session together behind the generic `Connector` trait.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tokio::sync::mpsc;

use crate::cancel::CancelWatch;
use crate::connector::{Connector, EventSink, InstrumentCache, INSTRUMENT_CACHE_TTL};
use crate::error::{ConnectorError, ConnectorResult};
use crate::model::{
    AssetInfo, ExchangeId, FundingRate, Identity, Instrument, ListingState, OrderBook, PriceLevel,
    PriceTicker, SubscriptionKey, DEFAULT_FUNDING_INTERVAL_HOURS,
};
use crate::ratelimit::RateLimiter;
use crate::rest::RestClient;
use crate::venues::okx::rest::{OkxCredentials, OkxRest};
use crate::venues::okx::ws::OkxWs;
use crate::ws::{SessionConfig, WsSession};

pub struct OkxConnector {
    rest: RestClient,
    session: Arc<WsSession<OkxWs>>,
    instrument_cache: InstrumentCache,
}

impl OkxConnector {
    pub fn new(
        rest_base_url: impl Into<String>,
        ws_url: impl Into<String>,
        credentials: Option<OkxCredentials>,
        sink: EventSink,
        cancel: CancelWatch,
    ) -> Self {
        let rest_venue = Arc::new(OkxRest::new(rest_base_url, credentials.clone()));
        let rest = RestClient::new(rest_venue, RateLimiter::new(), Duration::from_secs(10));

        let ws_venue = Arc::new(OkxWs::new(ws_url, credentials));
        let session = Arc::new(WsSession::new(
            ws_venue,
            SessionConfig::default(),
            sink,
            cancel,
        ));

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
                "/api/v5/public/instruments",
                &HashMap::new(),
                &[("instType", "SWAP".to_string())],
                None,
                false,
                std::future::pending(),
            )
            .await?;
        let envelope: OkxEnvelope<OkxInstrumentResp> = serde_json::from_slice(&bytes)
            .map_err(|e| ConnectorError::protocol(e.to_string()))?;

        Ok(envelope
            .data
            .into_iter()
            .map(|r| {
                let identity = Identity::new(ExchangeId::Okx, r.inst_id);
                Instrument {
                    exchange_id: identity.exchange_id,
                    venue_symbol: identity.venue_symbol,
                    canonical: identity.canonical,
                    tick_size: parse_decimal(&r.tick_sz),
                    lot_size: parse_decimal(&r.lot_sz),
                    contract_multiplier: r
                        .ct_mult
                        .map(|v| parse_decimal(&v))
                        .unwrap_or(Decimal::ONE),
                    min_size: parse_decimal(&r.min_sz),
                    max_size: r.max_mkt_sz.map(|v| parse_decimal(&v)),
                    maker_fee: Decimal::ZERO,
                    taker_fee: Decimal::ZERO,
                    margin_currency: "USDT".to_string(),
                    listing_state: listing_state(&r.state),
                }
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct OkxEnvelope<T> {
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct OkxInstrumentResp {
    #[serde(rename = "instId")]
    inst_id: String,
    #[serde(rename = "tickSz")]
    tick_sz: String,
    #[serde(rename = "lotSz")]
    lot_sz: String,
    #[serde(rename = "ctMult", default)]
    ct_mult: Option<String>,
    #[serde(rename = "minSz")]
    min_sz: String,
    #[serde(rename = "maxMktSz", default)]
    max_mkt_sz: Option<String>,
    state: String,
}

#[derive(Debug, Deserialize)]
struct OkxFundingResp {
    #[serde(rename = "instId")]
    inst_id: String,
    #[serde(rename = "fundingRate")]
    funding_rate: String,
    #[serde(rename = "fundingTime")]
    funding_time: String,
}

#[derive(Debug, Deserialize)]
struct OkxTickerResp {
    #[serde(rename = "instId")]
    inst_id: String,
    #[serde(rename = "askPx")]
    ask_px: String,
    #[serde(rename = "bidPx")]
    bid_px: String,
    #[serde(rename = "vol24h")]
    vol24h: String,
}

#[derive(Debug, Deserialize)]
struct OkxBookResp {
    asks: Vec<(String, String, String, String)>,
    bids: Vec<(String, String, String, String)>,
}

fn parse_decimal(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

fn listing_state(state: &str) -> ListingState {
    match state {
        "live" => ListingState::Trading,
        "preopen" => ListingState::PreLaunch,
        _ => ListingState::Delisted,
    }
}

#[async_trait]
impl Connector for OkxConnector {
    fn exchange_id(&self) -> ExchangeId {
        ExchangeId::Okx
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
                "/api/v5/market/books",
                &HashMap::new(),
                &[
                    ("instId", venue_symbol.to_string()),
                    ("sz", depth.to_string()),
                ],
                None,
                false,
                std::future::pending(),
            )
            .await?;
        let envelope: OkxEnvelope<OkxBookResp> = serde_json::from_slice(&bytes)
            .map_err(|e| ConnectorError::protocol(e.to_string()))?;
        let first = envelope
            .data
            .into_iter()
            .next()
            .ok_or_else(|| ConnectorError::protocol("empty orderbook response"))?;

        let mut book = OrderBook::empty(ExchangeId::Okx, venue_symbol);
        let bids = first
            .bids
            .iter()
            .map(|(p, q, ..)| PriceLevel::new(parse_decimal(p), parse_decimal(q)))
            .collect();
        let asks = first
            .asks
            .iter()
            .map(|(p, q, ..)| PriceLevel::new(parse_decimal(p), parse_decimal(q)))
            .collect();
        book.apply_snapshot(bids, asks, None, chrono::Utc::now());
        Ok(book)
    }

    async fn fetch_funding_rates(&self) -> ConnectorResult<Vec<FundingRate>> {
        let bytes = self
            .rest
            .do_request(
                Method::GET,
                "/api/v5/public/funding-rate",
                &HashMap::new(),
                &[("instType", "SWAP".to_string())],
                None,
                false,
                std::future::pending(),
            )
            .await?;
        let envelope: OkxEnvelope<OkxFundingResp> = serde_json::from_slice(&bytes)
            .map_err(|e| ConnectorError::protocol(e.to_string()))?;

        Ok(envelope
            .data
            .into_iter()
            .map(|r| {
                let identity = Identity::new(ExchangeId::Okx, r.inst_id);
                FundingRate {
                    exchange_id: identity.exchange_id,
                    canonical: identity.canonical,
                    funding_rate: r.funding_rate.parse().unwrap_or(0.0),
                    next_funding_time: r
                        .funding_time
                        .parse::<i64>()
                        .ok()
                        .and_then(chrono::DateTime::from_timestamp_millis)
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
                "/api/v5/market/tickers",
                &HashMap::new(),
                &[("instType", "SWAP".to_string())],
                None,
                false,
                std::future::pending(),
            )
            .await?;
        let envelope: OkxEnvelope<OkxTickerResp> = serde_json::from_slice(&bytes)
            .map_err(|e| ConnectorError::protocol(e.to_string()))?;

        Ok(envelope
            .data
            .into_iter()
            .map(|r| {
                let identity = Identity::new(ExchangeId::Okx, r.inst_id);
                PriceTicker {
                    exchange_id: identity.exchange_id,
                    venue_symbol: identity.venue_symbol,
                    canonical: identity.canonical,
                    best_bid: parse_decimal(&r.bid_px),
                    best_ask: parse_decimal(&r.ask_px),
                    volume_24h: parse_decimal(&r.vol24h),
                    timestamp: chrono::Utc::now(),
                }
            })
            .collect())
    }

    async fn fetch_asset_info(&self) -> ConnectorResult<Vec<AssetInfo>> {
        // OKX's currency endpoint is privileged; without credentials this
        // venue simply reports no asset info, which the discovery engine
        // treats as an empty but valid result.
        Ok(Vec::new())
    }

    fn is_healthy(&self) -> bool {
        self.session.state() == crate::ws::SessionState::Subscribed
    }
}
