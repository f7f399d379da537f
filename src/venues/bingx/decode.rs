//! BingX WS payload decoding
//!
//! BingX's swap WS envelope is `{code, dataType, data}`; `dataType` carries
//! `"{symbol}@depth20"`, `"{symbol}@ticker"`, `"{symbol}@trade"`. Raw text
//! `"Ping"`/`"Pong"` frames are used for the transport-level heartbeat
//! instead of a JSON envelope.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::error::ConnectorError;
use crate::model::{ExchangeId, Identity, OrderBook, PriceLevel, PriceTicker, Trade, TradeSide};
use crate::ws::Inbound;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(rename = "dataType", default)]
    data_type: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct DepthPayload {
    bids: Vec<(String, String)>,
    asks: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct TickerPayload {
    #[serde(rename = "askPrice")]
    ask_price: String,
    #[serde(rename = "bidPrice")]
    bid_price: String,
    volume: String,
}

#[derive(Debug, Deserialize)]
struct TradePayload {
    #[serde(rename = "T")]
    t: i64,
    p: String,
    q: String,
    #[serde(rename = "m")]
    buyer_is_maker: bool,
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

/// `dataType` is `"{symbol}@{channel}"`; split off the symbol prefix.
fn split_data_type(data_type: &str) -> Option<(&str, &str)> {
    data_type.split_once('@')
}

pub fn decode(raw: &str) -> Inbound {
    if raw == "Ping" {
        return Inbound::Ignored;
    }
    if raw == "Pong" {
        return Inbound::Pong;
    }

    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(e) => e,
        Err(_) => return Inbound::Ignored,
    };

    if let Some(code) = envelope.code {
        if code != 0 {
            return Inbound::VenueError(ConnectorError::venue(
                code.to_string(),
                envelope.msg.unwrap_or_default(),
            ));
        }
    }

    let (Some(data_type), Some(data)) = (envelope.data_type, envelope.data) else {
        return Inbound::Ignored;
    };
    let Some((symbol, channel)) = split_data_type(&data_type) else {
        return Inbound::Ignored;
    };

    match channel {
        c if c.starts_with("depth") => decode_depth(symbol, &data),
        "ticker" => decode_ticker(symbol, &data),
        "trade" => decode_trade(symbol, &data),
        _ => Inbound::Ignored,
    }
}

fn decode_depth(symbol: &str, data: &serde_json::Value) -> Inbound {
    let Ok(d) = serde_json::from_value::<DepthPayload>(data.clone()) else {
        return Inbound::Ignored;
    };
    let identity = Identity::new(ExchangeId::BingX, symbol.to_string());
    let mut book = OrderBook::empty(identity.exchange_id, identity.venue_symbol);
    let bids = d.bids.iter().map(|(p, q)| PriceLevel::new(dec(p), dec(q))).collect();
    let asks = d.asks.iter().map(|(p, q)| PriceLevel::new(dec(p), dec(q))).collect();
    book.apply_snapshot(bids, asks, None, chrono::Utc::now());
    Inbound::Push(crate::model::MarketEvent::OrderBook(book))
}

fn decode_ticker(symbol: &str, data: &serde_json::Value) -> Inbound {
    let Ok(t) = serde_json::from_value::<TickerPayload>(data.clone()) else {
        return Inbound::Ignored;
    };
    let identity = Identity::new(ExchangeId::BingX, symbol.to_string());
    Inbound::Push(crate::model::MarketEvent::PriceTicker(PriceTicker {
        exchange_id: identity.exchange_id,
        venue_symbol: identity.venue_symbol,
        canonical: identity.canonical,
        best_bid: dec(&t.bid_price),
        best_ask: dec(&t.ask_price),
        volume_24h: dec(&t.volume),
        timestamp: chrono::Utc::now(),
    }))
}

fn decode_trade(symbol: &str, data: &serde_json::Value) -> Inbound {
    let Ok(t) = serde_json::from_value::<TradePayload>(data.clone()) else {
        return Inbound::Ignored;
    };
    let identity = Identity::new(ExchangeId::BingX, symbol.to_string());
    let side = if t.buyer_is_maker { TradeSide::Sell } else { TradeSide::Buy };
    Inbound::Push(crate::model::MarketEvent::Trade(Trade {
        exchange_id: identity.exchange_id,
        venue_symbol: identity.venue_symbol,
        canonical: identity.canonical,
        trade_id: format!("{symbol}-{}", t.t),
        price: dec(&t.p),
        quantity: dec(&t.q),
        side,
        timestamp_ms: t.t,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_depth_push() {
        let raw = r#"{"code":0,"dataType":"BTC-USDT@depth20","data":{"bids":[["59999","1"]],"asks":[["60001","1"]]}}"#;
        match decode(raw) {
            Inbound::Push(crate::model::MarketEvent::OrderBook(ob)) => {
                assert_eq!(ob.best_bid().unwrap().price.to_string(), "59999");
            }
            _ => panic!("expected a depth push"),
        }
    }

    #[test]
    fn text_pong_is_recognised() {
        assert!(matches!(decode("Pong"), Inbound::Pong));
    }

    #[test]
    fn nonzero_code_surfaces_as_a_venue_error() {
        let raw = r#"{"code":100001,"msg":"invalid subscription","dataType":"","data":null}"#;
        assert!(matches!(decode(raw), Inbound::VenueError(_)));
    }
}
