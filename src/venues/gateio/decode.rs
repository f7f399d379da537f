//! Gate.io WS payload decoding
//!
//! Gate.io's futures WS envelope is `{time, channel, event, result}` for
//! pushes and error frames carry `{error: {code, message}}`; order-book
//! pushes use `{t, s, a: [[price, size], ...], b: [...]}` on the update
//! channel and `{bids, asks}` on the full-snapshot channel.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::ConnectorError;
use crate::model::{
    CanonicalSymbol, ExchangeId, FundingRate, Identity, LevelUpdate, OrderBook, PriceLevel,
    PriceTicker, Trade, TradeSide,
};
use crate::ws::{BookDeltaFrame, Inbound};

#[derive(Debug, Deserialize)]
struct Envelope {
    channel: String,
    event: String,
    #[serde(default)]
    error: Option<GateError>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct GateError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct GateLevel(String, String);

#[derive(Debug, Deserialize)]
struct GateBookUpdate {
    s: String,
    #[serde(default)]
    a: Vec<GateLevel>,
    #[serde(default)]
    b: Vec<GateLevel>,
    t: i64,
    #[serde(rename = "U", default)]
    first_update_id: Option<i64>,
    #[serde(default)]
    u: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GateBookSnapshot {
    contract: String,
    asks: Vec<GateLevel>,
    bids: Vec<GateLevel>,
    #[serde(default)]
    id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct GateTicker {
    contract: String,
    #[serde(rename = "highest_bid")]
    highest_bid: String,
    #[serde(rename = "lowest_ask")]
    lowest_ask: String,
    volume_24h: String,
}

#[derive(Debug, Deserialize)]
struct GateTrade {
    contract: String,
    id: i64,
    price: String,
    size: f64,
    create_time_ms: i64,
}

#[derive(Debug, Deserialize)]
struct GateFunding {
    contract: String,
    #[serde(rename = "funding_rate")]
    funding_rate: String,
    #[serde(rename = "funding_next_apply")]
    funding_next_apply: i64,
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

pub fn decode(raw: &str) -> Inbound {
    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(e) => e,
        Err(_) => return Inbound::Ignored,
    };

    if let Some(err) = envelope.error {
        if envelope.channel.ends_with(".login") {
            return Inbound::LoginResult(Err(ConnectorError::auth(err.message)));
        }
        return Inbound::VenueError(ConnectorError::venue(err.code.to_string(), err.message));
    }

    if envelope.channel.ends_with(".login") && envelope.event == "login" {
        return Inbound::LoginResult(Ok(()));
    }

    if envelope.event != "update" {
        return Inbound::Ignored;
    }

    let Some(result) = envelope.result else {
        return Inbound::Ignored;
    };

    match envelope.channel.as_str() {
        "futures.order_book_update" => decode_book_update(&result),
        "futures.order_book" => decode_book_snapshot(&result),
        "futures.tickers" => decode_ticker(&result),
        "futures.trades" => decode_trade(&result),
        "futures.funding_rate" => decode_funding(&result),
        _ => Inbound::Ignored,
    }
}

fn decode_book_update(result: &serde_json::Value) -> Inbound {
    let Ok(u) = serde_json::from_value::<GateBookUpdate>(result.clone()) else {
        return Inbound::Ignored;
    };
    let identity = Identity::new(ExchangeId::GateIo, u.s);
    let timestamp = chrono::DateTime::from_timestamp_millis(u.t).unwrap_or_else(chrono::Utc::now);
    let bids: Vec<LevelUpdate> = u
        .b
        .iter()
        .map(|l| LevelUpdate { price: dec(&l.0), quantity: dec(&l.1) })
        .collect();
    let asks: Vec<LevelUpdate> = u
        .a
        .iter()
        .map(|l| LevelUpdate { price: dec(&l.0), quantity: dec(&l.1) })
        .collect();
    Inbound::BookDelta(BookDeltaFrame {
        venue_symbol: identity.venue_symbol,
        bids,
        asks,
        prev_sequence_id: u.first_update_id.map(|v| (v - 1).max(0) as u64),
        sequence_id: u.u.map(|v| v as u64),
        timestamp,
    })
}

fn decode_book_snapshot(result: &serde_json::Value) -> Inbound {
    let Ok(s) = serde_json::from_value::<GateBookSnapshot>(result.clone()) else {
        return Inbound::Ignored;
    };
    let identity = Identity::new(ExchangeId::GateIo, s.contract);
    let mut book = OrderBook::empty(identity.exchange_id, identity.venue_symbol);
    let bids = s.bids.iter().map(|l| PriceLevel::new(dec(&l.0), dec(&l.1))).collect();
    let asks = s.asks.iter().map(|l| PriceLevel::new(dec(&l.0), dec(&l.1))).collect();
    book.apply_snapshot(bids, asks, s.id.map(|v| v as u64), chrono::Utc::now());
    Inbound::Push(crate::model::MarketEvent::OrderBook(book))
}

fn decode_ticker(result: &serde_json::Value) -> Inbound {
    let Ok(t) = serde_json::from_value::<GateTicker>(result.clone()) else {
        return Inbound::Ignored;
    };
    let identity = Identity::new(ExchangeId::GateIo, t.contract);
    Inbound::Push(crate::model::MarketEvent::PriceTicker(PriceTicker {
        exchange_id: identity.exchange_id,
        venue_symbol: identity.venue_symbol,
        canonical: identity.canonical,
        best_bid: dec(&t.highest_bid),
        best_ask: dec(&t.lowest_ask),
        volume_24h: dec(&t.volume_24h),
        timestamp: chrono::Utc::now(),
    }))
}

fn decode_trade(result: &serde_json::Value) -> Inbound {
    let Ok(t) = serde_json::from_value::<GateTrade>(result.clone()) else {
        return Inbound::Ignored;
    };
    let identity = Identity::new(ExchangeId::GateIo, t.contract);
    // Gate.io signs trade size negative for sells.
    let side = if t.size < 0.0 { TradeSide::Sell } else { TradeSide::Buy };
    Inbound::Push(crate::model::MarketEvent::Trade(Trade {
        exchange_id: identity.exchange_id,
        venue_symbol: identity.venue_symbol,
        canonical: identity.canonical,
        trade_id: t.id.to_string(),
        price: dec(&t.price),
        quantity: Decimal::try_from(t.size.abs()).unwrap_or_default(),
        side,
        timestamp_ms: t.create_time_ms,
    }))
}

fn decode_funding(result: &serde_json::Value) -> Inbound {
    let Ok(f) = serde_json::from_value::<GateFunding>(result.clone()) else {
        return Inbound::Ignored;
    };
    let canonical = CanonicalSymbol::from_venue_symbol(&f.contract);
    Inbound::Push(crate::model::MarketEvent::FundingRate(FundingRate {
        exchange_id: ExchangeId::GateIo,
        canonical,
        funding_rate: f.funding_rate.parse().unwrap_or(0.0),
        next_funding_time: chrono::DateTime::from_timestamp(f.funding_next_apply, 0)
            .unwrap_or_else(chrono::Utc::now),
        interval_hours: crate::model::DEFAULT_FUNDING_INTERVAL_HOURS,
        timestamp: chrono::Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_ticker_update() {
        let raw = r#"{"time":1700000000,"channel":"futures.tickers","event":"update","result":{"contract":"BTC_USDT","last":"60000","change_percentage":"1","funding_rate":"0.0001","funding_rate_indicative":"0.0001","mark_price":"60000","index_price":"60000","total_size":"1","volume_24h":"100","volume_24h_btc":"1","volume_24h_usd":"1","quanto_base_rate":"","volume_24h_quote":"1","volume_24h_settle":"1","volume_24h_base":"1","low_24h":"59000","high_24h":"61000","highest_bid":"59999","lowest_ask":"60001"}}"#;
        match decode(raw) {
            Inbound::Push(crate::model::MarketEvent::PriceTicker(t)) => {
                assert_eq!(t.best_bid.to_string(), "59999");
            }
            _ => panic!("expected a ticker push"),
        }
    }

    #[test]
    fn decodes_a_book_update_as_a_delta_frame() {
        let raw = r#"{"time":1700000000,"channel":"futures.order_book_update","event":"update","result":{"t":1700000000100,"s":"BTC_USDT","U":101,"u":103,"b":[["59998","2"]],"a":[["60002","0"]]}}"#;
        match decode(raw) {
            Inbound::BookDelta(frame) => {
                assert_eq!(frame.prev_sequence_id, Some(100));
                assert_eq!(frame.sequence_id, Some(103));
                assert_eq!(frame.bids[0].quantity.to_string(), "2");
                assert!(frame.asks[0].quantity.is_zero());
            }
            _ => panic!("expected a book delta"),
        }
    }

    #[test]
    fn login_error_surfaces_as_authentication_failure() {
        let raw = r#"{"time":1,"channel":"futures.login","event":"api","error":{"code":2,"message":"invalid key"}}"#;
        match decode(raw) {
            Inbound::LoginResult(Err(ConnectorError::Authentication(_))) => {}
            _ => panic!("expected a login failure"),
        }
    }
}
