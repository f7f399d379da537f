//! Gate.io WS session glue

use std::time::Duration;

use tokio_tungstenite::tungstenite::Message;

use crate::model::{ExchangeId, SubscriptionKey};
use crate::rest::signing::hmac_sha512_hex;
use crate::venues::gateio::rest::GateIoCredentials;
use crate::ws::{Inbound, VenueWs};

pub struct GateIoWs {
    pub ws_url: String,
    pub settlement: String,
    pub credentials: Option<GateIoCredentials>,
}

impl GateIoWs {
    pub fn new(
        ws_url: impl Into<String>,
        settlement: impl Into<String>,
        credentials: Option<GateIoCredentials>,
    ) -> Self {
        Self {
            ws_url: ws_url.into(),
            settlement: settlement.into(),
            credentials,
        }
    }
}

impl VenueWs for GateIoWs {
    fn exchange_id(&self) -> ExchangeId {
        ExchangeId::GateIo
    }

    fn ws_url(&self) -> String {
        self.ws_url.clone()
    }

    fn ping_interval(&self) -> Duration {
        Duration::from_secs(15)
    }

    fn build_ping(&self) -> Option<Message> {
        let frame = serde_json::json!({"time": chrono::Utc::now().timestamp(), "channel": "futures.ping"});
        Some(Message::Text(frame.to_string()))
    }

    fn build_login(&self) -> Option<Message> {
        let creds = self.credentials.as_ref()?;
        let timestamp = chrono::Utc::now().timestamp();
        let prehash = format!("channel=futures.login&event=api&time={timestamp}");
        let sign = hmac_sha512_hex(&creds.api_secret, &prehash);
        let frame = serde_json::json!({
            "time": timestamp,
            "channel": "futures.login",
            "event": "api",
            "payload": {
                "api_key": creds.api_key,
                "signature": sign,
                "timestamp": timestamp.to_string(),
            }
        });
        Some(Message::Text(frame.to_string()))
    }

    fn build_subscribe(&self, key: &SubscriptionKey) -> Message {
        let frame = serde_json::json!({
            "time": chrono::Utc::now().timestamp(),
            "channel": key.channel,
            "event": "subscribe",
            "payload": key.params,
        });
        Message::Text(frame.to_string())
    }

    fn build_unsubscribe(&self, key: &SubscriptionKey) -> Message {
        let frame = serde_json::json!({
            "time": chrono::Utc::now().timestamp(),
            "channel": key.channel,
            "event": "unsubscribe",
            "payload": key.params,
        });
        Message::Text(frame.to_string())
    }

    fn decode(&self, raw: &str) -> Inbound {
        super::decode::decode(raw)
    }
}
