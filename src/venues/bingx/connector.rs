//! BingX connector façade

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
use crate::venues::bingx::rest::{BingXCredentials, BingXRest};
use crate::venues::bingx::ws::BingXWs;
use crate::ws::{SessionConfig, WsSession};

pub struct BingXConnector {
    rest: RestClient,
    session: Arc<WsSession<BingXWs>>,
    instrument_cache: InstrumentCache,
}

impl BingXConnector {
    pub fn new(
        rest_base_url: impl Into<String>,
        ws_url: impl Into<String>,
        credentials: Option<BingXCredentials>,
        sink: EventSink,
        cancel: CancelWatch,
    ) -> Self {
        let rest_venue = Arc::new(BingXRest::new(rest_base_url, credentials));
        let rest = RestClient::new(rest_venue, RateLimiter::new(), Duration::from_secs(10));

        let ws_venue = Arc::new(BingXWs::new(ws_url));
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
                "/openApi/swap/v2/quote/contracts",
                &HashMap::new(),
                &[],
                None,
                false,
                std::future::pending(),
            )
            .await?;
        let envelope: BingXContractsEnvelope =
            serde_json::from_slice(&bytes).map_err(|e| ConnectorError::protocol(e.to_string()))?;

        Ok(envelope
            .data
            .into_iter()
            .map(|c| {
                let identity = Identity::new(ExchangeId::BingX, c.symbol);
                Instrument {
                    exchange_id: identity.exchange_id,
                    venue_symbol: identity.venue_symbol,
                    canonical: identity.canonical,
                    tick_size: step(c.price_precision),
                    lot_size: step(c.quantity_precision),
                    contract_multiplier: Decimal::ONE,
                    min_size: dec(&c.trade_min_quantity),
                    max_size: None,
                    maker_fee: dec(&c.maker_fee_rate),
                    taker_fee: dec(&c.taker_fee_rate),
                    margin_currency: "USDT".to_string(),
                    listing_state: if c.status == 1 {
                        ListingState::Trading
                    } else {
                        ListingState::Delisted
                    },
                }
            })
            .collect())
    }
}

#[derive(Debug, Deserialize)]
struct BingXContractsEnvelope {
    data: Vec<BingXContract>,
}

#[derive(Debug, Deserialize)]
struct BingXContract {
    symbol: String,
    #[serde(rename = "pricePrecision")]
    price_precision: u32,
    #[serde(rename = "quantityPrecision")]
    quantity_precision: u32,
    #[serde(rename = "tradeMinQuantity")]
    trade_min_quantity: String,
    #[serde(rename = "makerFeeRate")]
    maker_fee_rate: String,
    #[serde(rename = "takerFeeRate")]
    taker_fee_rate: String,
    status: i32,
}

#[derive(Debug, Deserialize)]
struct BingXDepthEnvelope {
    data: BingXDepthData,
}

#[derive(Debug, Deserialize)]
struct BingXDepthData {
    bids: Vec<(String, String)>,
    asks: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct BingXTickerEnvelope {
    data: Vec<BingXTickerResp>,
}

#[derive(Debug, Deserialize)]
struct BingXTickerResp {
    symbol: String,
    #[serde(rename = "bidPrice")]
    bid_price: String,
    #[serde(rename = "askPrice")]
    ask_price: String,
    #[serde(rename = "volume")]
    volume: String,
}

#[derive(Debug, Deserialize)]
struct BingXFundingEnvelope {
    data: Vec<BingXFundingResp>,
}

#[derive(Debug, Deserialize)]
struct BingXFundingResp {
    symbol: String,
    #[serde(rename = "lastFundingRate")]
    last_funding_rate: String,
    #[serde(rename = "nextFundingTime")]
    next_funding_time: i64,
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

fn step(precision: u32) -> Decimal {
    Decimal::new(1, precision)
}

#[async_trait]
impl Connector for BingXConnector {
    fn exchange_id(&self) -> ExchangeId {
        ExchangeId::BingX
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
                "/openApi/swap/v2/quote/depth",
                &HashMap::new(),
                &[
                    ("symbol", venue_symbol.to_string()),
                    ("limit", depth.to_string()),
                ],
                None,
                false,
                std::future::pending(),
            )
            .await?;
        let envelope: BingXDepthEnvelope =
            serde_json::from_slice(&bytes).map_err(|e| ConnectorError::protocol(e.to_string()))?;

        let mut book = OrderBook::empty(ExchangeId::BingX, venue_symbol);
        let bids = envelope.data.bids.iter().map(|(p, q)| PriceLevel::new(dec(p), dec(q))).collect();
        let asks = envelope.data.asks.iter().map(|(p, q)| PriceLevel::new(dec(p), dec(q))).collect();
        book.apply_snapshot(bids, asks, None, chrono::Utc::now());
        Ok(book)
    }

    async fn fetch_funding_rates(&self) -> ConnectorResult<Vec<FundingRate>> {
        let bytes = self
            .rest
            .do_request(
                Method::GET,
                "/openApi/swap/v2/quote/premiumIndex",
                &HashMap::new(),
                &[],
                None,
                false,
                std::future::pending(),
            )
            .await?;
        let envelope: BingXFundingEnvelope =
            serde_json::from_slice(&bytes).map_err(|e| ConnectorError::protocol(e.to_string()))?;

        Ok(envelope
            .data
            .into_iter()
            .map(|f| {
                let canonical = crate::model::CanonicalSymbol::from_venue_symbol(&f.symbol);
                FundingRate {
                    exchange_id: ExchangeId::BingX,
                    canonical,
                    funding_rate: f.last_funding_rate.parse().unwrap_or(0.0),
                    next_funding_time: chrono::DateTime::from_timestamp_millis(f.next_funding_time)
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
                "/openApi/swap/v2/quote/bookTicker",
                &HashMap::new(),
                &[],
                None,
                false,
                std::future::pending(),
            )
            .await?;
        let envelope: BingXTickerEnvelope =
            serde_json::from_slice(&bytes).map_err(|e| ConnectorError::protocol(e.to_string()))?;

        Ok(envelope
            .data
            .into_iter()
            .map(|t| {
                let identity = Identity::new(ExchangeId::BingX, t.symbol);
                PriceTicker {
                    exchange_id: identity.exchange_id,
                    venue_symbol: identity.venue_symbol,
                    canonical: identity.canonical,
                    best_bid: dec(&t.bid_price),
                    best_ask: dec(&t.ask_price),
                    volume_24h: dec(&t.volume),
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
