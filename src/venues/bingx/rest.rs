//! BingX REST signing and error envelope: HMAC-SHA256 over a
//! sorted query string, hex-encoded.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::ConnectorError;
use crate::rest::signing::{hmac_sha256_hex, sorted_query_string};
use crate::rest::{SignedHeaders, VenueRest};

#[derive(Debug, Clone, Default)]
pub struct BingXCredentials {
    pub api_key: String,
    pub api_secret: String,
}

pub struct BingXRest {
    pub base_url: String,
    pub credentials: Option<BingXCredentials>,
}

impl BingXRest {
    pub fn new(base_url: impl Into<String>, credentials: Option<BingXCredentials>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials,
        }
    }
}

#[derive(Debug, Deserialize)]
struct BingXErrorEnvelope {
    code: i64,
    msg: String,
}

impl VenueRest for BingXRest {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn sign(
        &self,
        _method: &str,
        _path: &str,
        query: &str,
        _body: &str,
        timestamp_ms: i64,
    ) -> Result<SignedHeaders, ConnectorError> {
        let creds = self
            .credentials
            .as_ref()
            .ok_or_else(|| ConnectorError::auth("no credentials configured for a private endpoint"))?;

        let pairs: Vec<(&str, String)> = query
            .split('&')
            .filter(|s| !s.is_empty())
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| (k, v.to_string()))
            .chain(std::iter::once(("timestamp", timestamp_ms.to_string())))
            .collect();
        let sorted = sorted_query_string(&pairs);
        let sign = hmac_sha256_hex(&creds.api_secret, &sorted);

        Ok(vec![
            ("X-BX-APIKEY".into(), creds.api_key.clone()),
            ("X-BX-SIGNATURE".into(), sign),
        ])
    }

    fn decode_error(&self, status: StatusCode, body: &[u8]) -> Option<ConnectorError> {
        let _ = status;
        let envelope: BingXErrorEnvelope = serde_json::from_slice(body).ok()?;
        if envelope.code == 0 {
            return None;
        }
        Some(ConnectorError::venue(envelope.code.to_string(), envelope.msg))
    }

    fn rate_limit_budget(&self, _path: &str) -> (u32, Duration) {
        (100, Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_header_set_includes_key_and_signature() {
        let venue = BingXRest::new(
            "https://open-api.bingx.com",
            Some(BingXCredentials {
                api_key: "k".into(),
                api_secret: "s".into(),
            }),
        );
        let headers = venue
            .sign("GET", "/openApi/swap/v2/user/balance", "", "", 1_700_000_000_000)
            .unwrap();
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].0, "X-BX-APIKEY");
    }
}
