//! BingX WS session glue

use std::time::Duration;

use tokio_tungstenite::tungstenite::Message;

use crate::model::{ExchangeId, SubscriptionKey};
use crate::ws::{Inbound, VenueWs};

pub struct BingXWs {
    pub ws_url: String,
}

impl BingXWs {
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self { ws_url: ws_url.into() }
    }
}

impl VenueWs for BingXWs {
    fn exchange_id(&self) -> ExchangeId {
        ExchangeId::BingX
    }

    fn ws_url(&self) -> String {
        self.ws_url.clone()
    }

    fn ping_interval(&self) -> Duration {
        Duration::from_secs(25)
    }

    fn build_ping(&self) -> Option<Message> {
        Some(Message::Text("Ping".to_string()))
    }

    fn build_login(&self) -> Option<Message> {
        // BingX's market-data stream has no private channels that need a
        // WS login; account/trade streams use a REST-issued listenKey
        // appended to the URL instead, out of scope for this connector.
        None
    }

    fn build_subscribe(&self, key: &SubscriptionKey) -> Message {
        let symbol = key.params.first().cloned().unwrap_or_default();
        let frame = serde_json::json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "reqType": "sub",
            "dataType": format!("{symbol}@{}", key.channel),
        });
        Message::Text(frame.to_string())
    }

    fn build_unsubscribe(&self, key: &SubscriptionKey) -> Message {
        let symbol = key.params.first().cloned().unwrap_or_default();
        let frame = serde_json::json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "reqType": "unsub",
            "dataType": format!("{symbol}@{}", key.channel),
        });
        Message::Text(frame.to_string())
    }

    fn decode(&self, raw: &str) -> Inbound {
        super::decode::decode(raw)
    }
}
