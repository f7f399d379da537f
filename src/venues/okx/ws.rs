//! OKX WS session glue: frame shapes plus the shared decoder

use std::time::Duration;

use tokio_tungstenite::tungstenite::Message;

use crate::model::{ExchangeId, SubscriptionKey};
use crate::rest::signing::hmac_sha256_base64;
use crate::venues::okx::rest::OkxCredentials;
use crate::ws::{Inbound, VenueWs};

pub struct OkxWs {
    pub ws_url: String,
    pub credentials: Option<OkxCredentials>,
}

impl OkxWs {
    pub fn new(ws_url: impl Into<String>, credentials: Option<OkxCredentials>) -> Self {
        Self {
            ws_url: ws_url.into(),
            credentials,
        }
    }
}

impl VenueWs for OkxWs {
    fn exchange_id(&self) -> ExchangeId {
        ExchangeId::Okx
    }

    fn ws_url(&self) -> String {
        self.ws_url.clone()
    }

    fn ping_interval(&self) -> Duration {
        Duration::from_secs(20)
    }

    fn build_ping(&self) -> Option<Message> {
        Some(Message::Text("ping".to_string()))
    }

    fn build_login(&self) -> Option<Message> {
        let creds = self.credentials.as_ref()?;
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let prehash = format!("{timestamp}GET/users/self/verify");
        let sign = hmac_sha256_base64(&creds.api_secret, &prehash);
        let frame = serde_json::json!({
            "op": "login",
            "args": [{
                "apiKey": creds.api_key,
                "passphrase": creds.passphrase,
                "timestamp": timestamp,
                "sign": sign,
            }]
        });
        Some(Message::Text(frame.to_string()))
    }

    fn build_subscribe(&self, key: &SubscriptionKey) -> Message {
        let inst_id = key.params.first().cloned().unwrap_or_default();
        let frame = serde_json::json!({
            "op": "subscribe",
            "args": [{"channel": key.channel, "instId": inst_id}],
        });
        Message::Text(frame.to_string())
    }

    fn build_unsubscribe(&self, key: &SubscriptionKey) -> Message {
        let inst_id = key.params.first().cloned().unwrap_or_default();
        let frame = serde_json::json!({
            "op": "unsubscribe",
            "args": [{"channel": key.channel, "instId": inst_id}],
        });
        Message::Text(frame.to_string())
    }

    fn decode(&self, raw: &str) -> Inbound {
        super::decode::decode(raw)
    }
}
