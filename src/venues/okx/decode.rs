//! OKX WS/REST payload decoding
//!
//! Wire shapes adapted from `OKXWebSocketEvent`/`OKXTickerMsg` in the
//! nautilus_trader OKX adapter: an outer envelope keyed by `event` for
//! control frames and by `arg`/`data` for channel pushes. Symbol, book and
//! ticker payload field names below mirror that adapter's struct fields.

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
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    arg: Option<Arg>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Arg {
    channel: String,
    #[serde(rename = "instId", default)]
    inst_id: String,
}

#[derive(Debug, Deserialize)]
struct BookLevel(String, String, String, String);

#[derive(Debug, Deserialize)]
struct BookPush {
    asks: Vec<BookLevel>,
    bids: Vec<BookLevel>,
    ts: String,
    #[serde(rename = "seqId", default)]
    seq_id: Option<i64>,
    #[serde(rename = "prevSeqId", default)]
    prev_seq_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct TickerPush {
    #[serde(rename = "instId")]
    inst_id: String,
    #[serde(rename = "askPx")]
    ask_px: String,
    #[serde(rename = "bidPx")]
    bid_px: String,
    #[serde(rename = "vol24h")]
    vol24h: String,
    ts: String,
}

#[derive(Debug, Deserialize)]
struct TradePush {
    #[serde(rename = "instId")]
    inst_id: String,
    #[serde(rename = "tradeId")]
    trade_id: String,
    px: String,
    sz: String,
    side: String,
    ts: String,
}

#[derive(Debug, Deserialize)]
struct FundingPush {
    #[serde(rename = "instId")]
    inst_id: String,
    #[serde(rename = "fundingRate")]
    funding_rate: String,
    #[serde(rename = "fundingTime")]
    funding_time: String,
}

fn parse_decimal(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

fn level(l: &BookLevel) -> LevelUpdate {
    LevelUpdate {
        price: parse_decimal(&l.0),
        quantity: parse_decimal(&l.1),
    }
}

/// Decode one OKX WS text frame into the venue-agnostic `Inbound` shape.
pub fn decode(raw: &str) -> Inbound {
    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(e) => e,
        Err(_) => return Inbound::Ignored,
    };

    if let Some(event) = envelope.event.as_deref() {
        return match event {
            "login" => {
                if envelope.code.as_deref() == Some("0") {
                    Inbound::LoginResult(Ok(()))
                } else {
                    Inbound::LoginResult(Err(ConnectorError::auth(
                        envelope.msg.unwrap_or_else(|| "login rejected".into()),
                    )))
                }
            }
            "error" => Inbound::VenueError(ConnectorError::venue(
                envelope.code.unwrap_or_default(),
                envelope.msg.unwrap_or_default(),
            )),
            "subscribe" | "unsubscribe" | "channel-conn-count" => Inbound::Ignored,
            _ => Inbound::Ignored,
        };
    }

    let (arg, data) = match (envelope.arg, envelope.data) {
        (Some(arg), Some(data)) => (arg, data),
        _ => return Inbound::Ignored,
    };

    match arg.channel.as_str() {
        "books" | "books5" | "bbo-tbt" => decode_book(&arg, &data, envelope.action.as_deref()),
        "tickers" => decode_ticker(&data),
        "trades" => decode_trade(&data),
        "funding-rate" => decode_funding(&data),
        _ => Inbound::Ignored,
    }
}

/// OKX marks the opening frame of a stream with `prevSeqId = -1`; treat any
/// non-negative value as a real sequence reference.
fn non_negative_seq(id: Option<i64>) -> Option<u64> {
    id.filter(|&s| s >= 0).map(|s| s as u64)
}

fn decode_book(arg: &Arg, data: &serde_json::Value, action: Option<&str>) -> Inbound {
    let pushes: Vec<BookPush> = match serde_json::from_value(data.clone()) {
        Ok(v) => v,
        Err(_) => return Inbound::Ignored,
    };
    let Some(push) = pushes.into_iter().next() else {
        return Inbound::Ignored;
    };

    let is_snapshot = action != Some("update");
    let identity = Identity::new(ExchangeId::Okx, arg.inst_id.clone());
    let timestamp = push
        .ts
        .parse::<i64>()
        .ok()
        .and_then(|ms| chrono::DateTime::from_timestamp_millis(ms))
        .unwrap_or_else(chrono::Utc::now);

    let bids: Vec<LevelUpdate> = push.bids.iter().map(level).collect();
    let asks: Vec<LevelUpdate> = push.asks.iter().map(level).collect();
    let sequence_id = non_negative_seq(push.seq_id);

    if is_snapshot {
        let bid_levels: Vec<PriceLevel> = bids
            .iter()
            .map(|l| PriceLevel {
                price: l.price,
                quantity: l.quantity,
            })
            .collect();
        let ask_levels: Vec<PriceLevel> = asks
            .iter()
            .map(|l| PriceLevel {
                price: l.price,
                quantity: l.quantity,
            })
            .collect();
        let mut book = OrderBook::empty(identity.exchange_id, identity.venue_symbol);
        book.apply_snapshot(bid_levels, ask_levels, sequence_id, timestamp);
        Inbound::Push(crate::model::MarketEvent::OrderBook(book))
    } else {
        Inbound::BookDelta(BookDeltaFrame {
            venue_symbol: identity.venue_symbol,
            bids,
            asks,
            prev_sequence_id: non_negative_seq(push.prev_seq_id),
            sequence_id,
            timestamp,
        })
    }
}

fn decode_ticker(data: &serde_json::Value) -> Inbound {
    let pushes: Vec<TickerPush> = match serde_json::from_value(data.clone()) {
        Ok(v) => v,
        Err(_) => return Inbound::Ignored,
    };
    let Some(t) = pushes.into_iter().next() else {
        return Inbound::Ignored;
    };
    let identity = Identity::new(ExchangeId::Okx, t.inst_id.clone());
    let timestamp = t
        .ts
        .parse::<i64>()
        .ok()
        .and_then(|ms| chrono::DateTime::from_timestamp_millis(ms))
        .unwrap_or_else(chrono::Utc::now);

    Inbound::Push(crate::model::MarketEvent::PriceTicker(PriceTicker {
        exchange_id: identity.exchange_id,
        venue_symbol: identity.venue_symbol,
        canonical: identity.canonical,
        best_bid: parse_decimal(&t.bid_px),
        best_ask: parse_decimal(&t.ask_px),
        volume_24h: parse_decimal(&t.vol24h),
        timestamp,
    }))
}

fn decode_trade(data: &serde_json::Value) -> Inbound {
    let pushes: Vec<TradePush> = match serde_json::from_value(data.clone()) {
        Ok(v) => v,
        Err(_) => return Inbound::Ignored,
    };
    let Some(t) = pushes.into_iter().next() else {
        return Inbound::Ignored;
    };
    let identity = Identity::new(ExchangeId::Okx, t.inst_id.clone());
    let timestamp_ms = t.ts.parse::<i64>().unwrap_or_default();
    let side = if t.side == "buy" {
        TradeSide::Buy
    } else {
        TradeSide::Sell
    };

    Inbound::Push(crate::model::MarketEvent::Trade(Trade {
        exchange_id: identity.exchange_id,
        venue_symbol: identity.venue_symbol,
        canonical: identity.canonical,
        trade_id: t.trade_id,
        price: parse_decimal(&t.px),
        quantity: parse_decimal(&t.sz),
        side,
        timestamp_ms,
    }))
}

fn decode_funding(data: &serde_json::Value) -> Inbound {
    let pushes: Vec<FundingPush> = match serde_json::from_value(data.clone()) {
        Ok(v) => v,
        Err(_) => return Inbound::Ignored,
    };
    let Some(f) = pushes.into_iter().next() else {
        return Inbound::Ignored;
    };
    let canonical = CanonicalSymbol::from_venue_symbol(&f.inst_id);
    let next_funding_time = f
        .funding_time
        .parse::<i64>()
        .ok()
        .and_then(|ms| chrono::DateTime::from_timestamp_millis(ms))
        .unwrap_or_else(chrono::Utc::now);

    Inbound::Push(crate::model::MarketEvent::FundingRate(FundingRate {
        exchange_id: ExchangeId::Okx,
        canonical,
        funding_rate: f.funding_rate.parse().unwrap_or(0.0),
        next_funding_time,
        interval_hours: crate::model::DEFAULT_FUNDING_INTERVAL_HOURS,
        timestamp: chrono::Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_ticker_push() {
        let raw = r#"{"arg":{"channel":"tickers","instId":"BTC-USDT-SWAP"},"data":[{"instId":"BTC-USDT-SWAP","last":"60000","lastSz":"1","askPx":"60001","askSz":"2","bidPx":"59999","bidSz":"2","open24h":"59000","high24h":"61000","low24h":"58000","volCcy24h":"1","vol24h":"100","sodUtc0":"0","sodUtc8":"0","ts":"1700000000000"}]}"#;
        match decode(raw) {
            Inbound::Push(crate::model::MarketEvent::PriceTicker(t)) => {
                assert_eq!(t.best_ask.to_string(), "60001");
                assert_eq!(t.best_bid.to_string(), "59999");
            }
            _ => panic!("expected a ticker push"),
        }
    }

    #[test]
    fn decodes_a_book_snapshot() {
        let raw = r#"{"arg":{"channel":"books","instId":"BTC-USDT-SWAP"},"action":"snapshot","data":[{"asks":[["60001","1","0","1"]],"bids":[["59999","1","0","1"]],"ts":"1700000000000","seqId":42}]}"#;
        match decode(raw) {
            Inbound::Push(crate::model::MarketEvent::OrderBook(ob)) => {
                assert!(ob.is_snapshot);
                assert_eq!(ob.best_bid().unwrap().price.to_string(), "59999");
            }
            _ => panic!("expected a book snapshot"),
        }
    }

    #[test]
    fn decodes_a_book_update_as_a_delta_frame() {
        let raw = r#"{"arg":{"channel":"books","instId":"BTC-USDT-SWAP"},"action":"update","data":[{"asks":[["60002","0","0","1"]],"bids":[["59998","2","0","1"]],"ts":"1700000000100","seqId":43,"prevSeqId":42}]}"#;
        match decode(raw) {
            Inbound::BookDelta(frame) => {
                assert_eq!(frame.prev_sequence_id, Some(42));
                assert_eq!(frame.sequence_id, Some(43));
                assert_eq!(frame.bids[0].quantity.to_string(), "2");
                assert!(frame.asks[0].quantity.is_zero());
            }
            _ => panic!("expected a book delta"),
        }
    }

    #[test]
    fn rejected_login_surfaces_as_an_authentication_error() {
        let raw = r#"{"event":"login","code":"60009","msg":"bad signature","connId":"x"}"#;
        match decode(raw) {
            Inbound::LoginResult(Err(ConnectorError::Authentication(_))) => {}
            _ => panic!("expected a rejected login"),
        }
    }
}
