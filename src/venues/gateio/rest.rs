//! Gate.io REST signing and error envelope

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::ConnectorError;
use crate::rest::signing::{hmac_sha512_hex, sha512_hex};
use crate::rest::{SignedHeaders, VenueRest};

#[derive(Debug, Clone, Default)]
pub struct GateIoCredentials {
    pub api_key: String,
    pub api_secret: String,
}

pub struct GateIoRest {
    pub base_url: String,
    pub credentials: Option<GateIoCredentials>,
}

impl GateIoRest {
    pub fn new(base_url: impl Into<String>, credentials: Option<GateIoCredentials>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GateIoErrorEnvelope {
    label: String,
    message: String,
}

impl VenueRest for GateIoRest {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn sign(
        &self,
        method: &str,
        path: &str,
        query: &str,
        body: &str,
        timestamp_ms: i64,
    ) -> Result<SignedHeaders, ConnectorError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| ConnectorError::auth("no credentials configured for a private endpoint"))?;

        let timestamp = (timestamp_ms / 1000).to_string();
        let body_hash = sha512_hex(body);
        let prehash = format!("{method}\n{path}\n{query}\n{body_hash}\n{timestamp}");
        let sign = hmac_sha512_hex(&creds.api_secret, &prehash);

        Ok(vec![
            ("KEY".into(), creds.api_key.clone()),
            ("Timestamp".into(), timestamp),
            ("SIGN".into(), sign),
        ])
    }

    fn decode_error(&self, status: StatusCode, body: &[u8]) -> Option<ConnectorError> {
        let _ = status;
        let envelope: GateIoErrorEnvelope = serde_json::from_slice(body).ok()?;
        Some(ConnectorError::venue(envelope.label, envelope.message))
    }

    fn rate_limit_budget(&self, path: &str) -> (u32, Duration) {
        if path.contains("/orders") {
            (30, Duration::from_secs(1))
        } else {
            (100, Duration::from_secs(10))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_header_set_includes_key_timestamp_and_sign() {
        let venue = GateIoRest::new(
            "https://api.gateio.ws",
            Some(GateIoCredentials {
                api_key: "k".into(),
                api_secret: "s".into(),
            }),
        );
        let headers = venue
            .sign("GET", "/api/v4/futures/usdt/accounts", "", "", 1_700_000_000_000)
            .unwrap();
        assert_eq!(headers.len(), 3);
        assert_eq!(headers[1].1, "1700000000");
    }
}
