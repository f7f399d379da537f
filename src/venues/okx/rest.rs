//! OKX REST signing and error envelope

use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::ConnectorError;
use crate::rest::signing::hmac_sha256_base64;
use crate::rest::{SignedHeaders, VenueRest};

#[derive(Debug, Clone, Default)]
pub struct OkxCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
}

pub struct OkxRest {
    pub base_url: String,
    pub credentials: Option<OkxCredentials>,
}

impl OkxRest {
    pub fn new(base_url: impl Into<String>, credentials: Option<OkxCredentials>) -> Self {
        Self {
            base_url: base_url.into(),
            credentials,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OkxErrorEnvelope {
    code: String,
    msg: String,
}

impl VenueRest for OkxRest {
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

        let full_path = if query.is_empty() {
            path.to_string()
        } else {
            format!("{path}?{query}")
        };
        // OKX wants an ISO-8601 millisecond timestamp, not epoch millis.
        let timestamp = chrono::DateTime::from_timestamp_millis(timestamp_ms)
            .unwrap_or_else(chrono::Utc::now)
            .format("%Y-%m-%dT%H:%M:%S%.3fZ")
            .to_string();
        let prehash = format!("{timestamp}{method}{full_path}{body}");
        let sign = hmac_sha256_base64(&creds.api_secret, &prehash);

        Ok(vec![
            ("OK-ACCESS-KEY".into(), creds.api_key.clone()),
            ("OK-ACCESS-SIGN".into(), sign),
            ("OK-ACCESS-TIMESTAMP".into(), timestamp),
            ("OK-ACCESS-PASSPHRASE".into(), creds.passphrase.clone()),
        ])
    }

    fn decode_error(&self, status: StatusCode, body: &[u8]) -> Option<ConnectorError> {
        let envelope: OkxErrorEnvelope = serde_json::from_slice(body).ok()?;
        if envelope.code == "0" {
            return None;
        }
        let _ = status;
        Some(ConnectorError::venue(envelope.code, envelope.msg))
    }

    fn rate_limit_budget(&self, path: &str) -> (u32, Duration) {
        if path.starts_with("/api/v5/trade") {
            (60, Duration::from_secs(2))
        } else {
            (20, Duration::from_secs(2))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_without_credentials_is_an_auth_error() {
        let venue = OkxRest::new("https://www.okx.com", None);
        let result = venue.sign("GET", "/api/v5/account/balance", "", "", 1_700_000_000_000);
        assert!(matches!(result, Err(ConnectorError::Authentication(_))));
    }

    #[test]
    fn signing_with_credentials_yields_four_headers() {
        let venue = OkxRest::new(
            "https://www.okx.com",
            Some(OkxCredentials {
                api_key: "k".into(),
                api_secret: "s".into(),
                passphrase: "p".into(),
            }),
        );
        let headers = venue
            .sign("GET", "/api/v5/account/balance", "", "", 1_700_000_000_000)
            .unwrap();
        assert_eq!(headers.len(), 4);
    }
}
