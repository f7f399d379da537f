//! LBank REST signing and error envelope: MD5-digest-then-
//! HMAC-SHA256 over a sorted query string, uppercase hex.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::ConnectorError;
use crate::rest::signing::{md5_then_hmac_sha256, sorted_query_string};
use crate::rest::{SignedHeaders, VenueRest};

#[derive(Debug, Clone, Default)]
pub struct LBankCredentials {
    pub api_key: String,
    pub api_secret: String,
}

pub struct LBankRest {
    pub base_url: String,
    pub credentials: Option<LBankCredentials>,
}

impl LBankRest {
    pub fn new(base_url: impl Into<String>, credentials: Option<LBankCredentials>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LBankErrorEnvelope {
    error_code: i64,
}

impl VenueRest for LBankRest {
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
            .chain(std::iter::once(("api_key", creds.api_key.clone())))
            .chain(std::iter::once(("timestamp", timestamp_ms.to_string())))
            .collect();
        let sorted = sorted_query_string(&pairs);
        let sign = md5_then_hmac_sha256(&creds.api_secret, &sorted);

        Ok(vec![("sign".into(), sign)])
    }

    fn decode_error(&self, status: StatusCode, body: &[u8]) -> Option<ConnectorError> {
        let _ = status;
        let envelope: LBankErrorEnvelope = serde_json::from_slice(body).ok()?;
        if envelope.error_code == 0 {
            return None;
        }
        Some(ConnectorError::venue(envelope.error_code.to_string(), "lbank error"))
    }

    fn rate_limit_budget(&self, _path: &str) -> (u32, Duration) {
        (200, Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_produces_an_uppercase_hex_sign_header() {
        let venue = LBankRest::new(
            "https://api.lbkex.com",
            Some(LBankCredentials {
                api_key: "k".into(),
                api_secret: "s".into(),
            }),
        );
        let headers = venue
            .sign("POST", "/v2/supplement/user_info.do", "symbol=btc_usdt", "", 1_700_000_000_000)
            .unwrap();
        assert_eq!(headers.len(), 1);
        let (_, sig) = &headers[0];
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(*sig, sig.to_ascii_uppercase());
    }
}
