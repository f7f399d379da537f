//! LBank WS session glue

use std::time::Duration;

use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::model::{ExchangeId, SubscriptionKey};
use crate::rest::signing::{md5_then_hmac_sha256, sorted_query_string};
use crate::venues::lbank::rest::LBankCredentials;
use crate::ws::{Inbound, VenueWs};

pub struct LBankWs {
    pub ws_url: String,
    pub credentials: Option<LBankCredentials>,
}

impl LBankWs {
    pub fn new(ws_url: impl Into<String>, credentials: Option<LBankCredentials>) -> Self {
        Self {
            ws_url: ws_url.into(),
            credentials,
        }
    }
}

impl VenueWs for LBankWs {
    fn exchange_id(&self) -> ExchangeId {
        ExchangeId::LBank
    }

    fn ws_url(&self) -> String {
        self.ws_url.clone()
    }

    fn ping_interval(&self) -> Duration {
        Duration::from_secs(10)
    }

    fn build_ping(&self) -> Option<Message> {
        let frame = serde_json::json!({"action": "ping", "ping": Uuid::new_v4().to_string()});
        Some(Message::Text(frame.to_string()))
    }

    fn build_login(&self) -> Option<Message> {
        // LBank has no dedicated WS login frame; private channel subscribes
        // below embed a freshly signed payload instead.
        None
    }

    fn build_subscribe(&self, key: &SubscriptionKey) -> Message {
        let pair = key.params.first().cloned().unwrap_or_default();
        if let Some(creds) = &self.credentials {
            if key.channel.starts_with("private_") {
                let timestamp = chrono::Utc::now().timestamp_millis();
                let signed = sorted_query_string(&[
                    ("api_key", creds.api_key.clone()),
                    ("timestamp", timestamp.to_string()),
                ]);
                let sign = md5_then_hmac_sha256(&creds.api_secret, &signed);
                let frame = serde_json::json!({
                    "action": "subscribe",
                    "subscribe": key.channel,
                    "pair": pair,
                    "api_key": creds.api_key,
                    "sign": sign,
                });
                return Message::Text(frame.to_string());
            }
        }
        let frame = serde_json::json!({"action": "subscribe", "subscribe": key.channel, "pair": pair});
        Message::Text(frame.to_string())
    }

    fn build_unsubscribe(&self, key: &SubscriptionKey) -> Message {
        let pair = key.params.first().cloned().unwrap_or_default();
        let frame = serde_json::json!({"action": "unsubscribe", "unsubscribe": key.channel, "pair": pair});
        Message::Text(frame.to_string())
    }

    fn decode(&self, raw: &str) -> Inbound {
        super::decode::decode(raw)
    }
}
