//! LBank WS payload decoding
//!
//! LBank's public WS envelope carries `{type, pair, ...}` with the payload
//! under a key matching `type` (`depth`, `tick`, `trade`); private channels
//! and `pong` frames surface as a bare `{action: "pong"/"ping", pong/ping}`.

use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;

use crate::model::{ExchangeId, Identity, OrderBook, PriceLevel, PriceTicker, Trade, TradeSide};
use crate::ws::Inbound;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    action: Option<String>,
    #[serde(rename = "type", default)]
    msg_type: Option<String>,
    #[serde(default)]
    pair: Option<String>,
    #[serde(default)]
    depth: Option<DepthPayload>,
    #[serde(default)]
    tick: Option<serde_json::Value>,
    #[serde(default)]
    trade: Option<TradePayload>,
    #[serde(default)]
    #[serde(rename = "TS")]
    ts: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DepthPayload {
    asks: Vec<(String, String)>,
    bids: Vec<(String, String)>,
}

#[derive(Debug, Deserialize)]
struct TickPayload {
    high: String,
    low: String,
    vol: String,
    latest: String,
}

#[derive(Debug, Deserialize)]
struct TradePayload {
    volume: String,
    price: String,
    direction: String,
    #[serde(rename = "TS")]
    ts: String,
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

pub fn decode(raw: &str) -> Inbound {
    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(e) => e,
        Err(_) => return Inbound::Ignored,
    };

    if envelope.action.as_deref() == Some("pong") {
        return Inbound::Pong;
    }
    if envelope.action.as_deref() == Some("ping") {
        return Inbound::Ignored;
    }

    let Some(pair) = envelope.pair.clone() else {
        return Inbound::Ignored;
    };

    match envelope.msg_type.as_deref() {
        Some("depth") => decode_depth(&pair, envelope.depth),
        Some("tick") => decode_tick(&pair, envelope.tick),
        Some("trade") => decode_trade(&pair, envelope.trade),
        _ => Inbound::Ignored,
    }
}

fn decode_depth(pair: &str, depth: Option<DepthPayload>) -> Inbound {
    let Some(depth) = depth else {
        return Inbound::Ignored;
    };
    let identity = Identity::new(ExchangeId::LBank, pair.to_string());
    let mut book = OrderBook::empty(identity.exchange_id, identity.venue_symbol);
    let bids = depth.bids.iter().map(|(p, q)| PriceLevel::new(dec(p), dec(q))).collect();
    let asks = depth.asks.iter().map(|(p, q)| PriceLevel::new(dec(p), dec(q))).collect();
    book.apply_snapshot(bids, asks, None, chrono::Utc::now());
    Inbound::Push(crate::model::MarketEvent::OrderBook(book))
}

fn decode_tick(pair: &str, tick: Option<serde_json::Value>) -> Inbound {
    let Some(tick) = tick else {
        return Inbound::Ignored;
    };
    let Ok(t) = serde_json::from_value::<TickPayload>(tick) else {
        return Inbound::Ignored;
    };
    let identity = Identity::new(ExchangeId::LBank, pair.to_string());
    // LBank's tick channel has no explicit bid/ask; latest trade price
    // stands in for both sides when a level-2 snapshot hasn't arrived yet.
    Inbound::Push(crate::model::MarketEvent::PriceTicker(PriceTicker {
        exchange_id: identity.exchange_id,
        venue_symbol: identity.venue_symbol,
        canonical: identity.canonical,
        best_bid: dec(&t.latest),
        best_ask: dec(&t.latest),
        volume_24h: dec(&t.vol),
        timestamp: chrono::Utc::now(),
    }))
}

fn decode_trade(pair: &str, trade: Option<TradePayload>) -> Inbound {
    let Some(t) = trade else {
        return Inbound::Ignored;
    };
    let identity = Identity::new(ExchangeId::LBank, pair.to_string());
    let side = if t.direction.contains("sell") { TradeSide::Sell } else { TradeSide::Buy };
    let timestamp_ms = chrono::DateTime::parse_from_rfc3339(&t.ts)
        .map(|dt| dt.timestamp_millis())
        .unwrap_or_else(|_| chrono::Utc::now().timestamp_millis());

    Inbound::Push(crate::model::MarketEvent::Trade(Trade {
        exchange_id: identity.exchange_id,
        venue_symbol: identity.venue_symbol,
        canonical: identity.canonical,
        trade_id: format!("{pair}-{timestamp_ms}"),
        price: dec(&t.price),
        quantity: dec(&t.volume),
        side,
        timestamp_ms,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_depth_snapshot() {
        let raw = r#"{"pair":"btc_usdt","type":"depth","depth":{"asks":[["60001","1"]],"bids":[["59999","1"]]},"TS":"2024-01-01T00:00:00.000"}"#;
        match decode(raw) {
            Inbound::Push(crate::model::MarketEvent::OrderBook(ob)) => {
                assert_eq!(ob.best_ask().unwrap().price.to_string(), "60001");
            }
            _ => panic!("expected a depth push"),
        }
    }

    #[test]
    fn pong_frame_is_recognised() {
        let raw = r#"{"action":"pong","pong":"abc-123"}"#;
        assert!(matches!(decode(raw), Inbound::Pong));
    }
}
