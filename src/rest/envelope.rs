//! Authenticated REST envelope.
//!
//! One `RestClient` per venue, parameterised by a `VenueRest` implementation
//! that knows that venue's base URL, signature scheme and error envelope
//! shape: one `reqwest::Client` per upstream, headers built up front, a
//! typed decode of the response body.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use reqwest::{Method, StatusCode};

use crate::error::ConnectorError;
use crate::ratelimit::RateLimiter;

/// A signed header set for one outbound request, venue-specific.
pub type SignedHeaders = Vec<(String, String)>;

/// Per-venue knowledge the generic envelope defers to.
pub trait VenueRest: Send + Sync {
    fn base_url(&self) -> &str;

    /// Build the authentication header set for a signed request. `query` is
    /// the already-encoded query string (no leading `?`); `body` is the raw
    /// serialised request body (empty string if none).
    fn sign(
        &self,
        method: &str,
        path: &str,
        query: &str,
        body: &str,
        timestamp_ms: i64,
    ) -> Result<SignedHeaders, ConnectorError>;

    /// Decode a venue-specific error envelope out of a non-2xx response body.
    /// Returns `None` when the body doesn't look like a decodable venue error
    /// (the caller then falls back to a generic `Transport` error).
    fn decode_error(&self, status: StatusCode, body: &[u8]) -> Option<ConnectorError>;

    /// Rate-limit bucket identity + budget for a given path; acquired under
    /// the caller's cancellation token before the request goes out.
    fn rate_limit_budget(&self, path: &str) -> (u32, Duration);
}

#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    venue: Arc<dyn VenueRest>,
    limiter: RateLimiter,
    request_timeout: Duration,
    clock: quanta::Clock,
}

impl RestClient {
    pub fn new(venue: Arc<dyn VenueRest>, limiter: RateLimiter, request_timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .expect("reqwest client builder never fails with this config");
        Self {
            http,
            venue,
            limiter,
            request_timeout,
            clock: quanta::Clock::new(),
        }
    }

    fn url(&self, path: &str, path_params: &HashMap<&str, String>) -> String {
        let mut resolved = path.to_string();
        for (k, v) in path_params {
            resolved = resolved.replace(&format!("{{{k}}}"), v);
        }
        format!("{}{}", self.venue.base_url(), resolved)
    }

    /// `do_request(method, path, query, body?, authenticated?, rate_limit_budget)`
    /// At most one outbound request per call; never retries on
    /// its own.
    pub async fn do_request(
        &self,
        method: Method,
        path: &str,
        path_params: &HashMap<&str, String>,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
        authenticated: bool,
        cancelled: impl std::future::Future<Output = ()>,
    ) -> Result<Bytes, ConnectorError> {
        let (max_tokens, interval) = self.venue.rate_limit_budget(path);
        self.limiter
            .wait(path, max_tokens, interval, cancelled)
            .await?;

        let query_string = query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        let body_str = body
            .as_ref()
            .map(|b| serde_json::to_string(b).unwrap_or_default())
            .unwrap_or_default();

        let url = self.url(path, path_params);
        let mut request = self.http.request(method.clone(), &url);
        if !query_string.is_empty() {
            request = request.query(query);
        }
        if let Some(ref b) = body {
            request = request.json(b);
        }

        if authenticated {
            let timestamp_ms = chrono::Utc::now().timestamp_millis();
            let headers =
                self.venue
                    .sign(method.as_str(), path, &query_string, &body_str, timestamp_ms)?;
            for (k, v) in headers {
                request = request.header(k, v);
            }
        }

        let started = self.clock.now();
        let response = request
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ConnectorError::transport(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ConnectorError::transport(e.to_string()))?;
        let elapsed = self.clock.now().duration_since(started);
        metrics::histogram!("rest_request_duration_seconds", "path" => path.to_string())
            .record(elapsed.as_secs_f64());

        if !status.is_success() {
            metrics::counter!("rest_request_errors_total", "path" => path.to_string()).increment(1);
            return Err(self
                .venue
                .decode_error(status, &bytes)
                .unwrap_or_else(|| ConnectorError::transport(format!("http {status}"))));
        }

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future;

    struct FakeVenue;

    impl VenueRest for FakeVenue {
        fn base_url(&self) -> &str {
            "https://example.invalid"
        }

        fn sign(
            &self,
            _method: &str,
            _path: &str,
            _query: &str,
            _body: &str,
            _timestamp_ms: i64,
        ) -> Result<SignedHeaders, ConnectorError> {
            Ok(vec![("X-Fake-Sig".into(), "abc".into())])
        }

        fn decode_error(&self, status: StatusCode, _body: &[u8]) -> Option<ConnectorError> {
            Some(ConnectorError::venue(status.as_str(), "boom"))
        }

        fn rate_limit_budget(&self, _path: &str) -> (u32, Duration) {
            (100, Duration::from_secs(1))
        }
    }

    #[test]
    fn url_substitutes_path_params() {
        let client = RestClient::new(
            Arc::new(FakeVenue),
            RateLimiter::new(),
            Duration::from_secs(5),
        );
        let mut params = HashMap::new();
        params.insert("symbol", "BTC-USDT".to_string());
        assert_eq!(
            client.url("/instruments/{symbol}", &params),
            "https://example.invalid/instruments/BTC-USDT"
        );
    }

    #[tokio::test]
    async fn signing_failure_surfaces_as_authentication_error_without_a_network_call() {
        struct BrokenAuth;
        impl VenueRest for BrokenAuth {
            fn base_url(&self) -> &str {
                "https://example.invalid"
            }
            fn sign(
                &self,
                _m: &str,
                _p: &str,
                _q: &str,
                _b: &str,
                _t: i64,
            ) -> Result<SignedHeaders, ConnectorError> {
                Err(ConnectorError::auth("missing credentials"))
            }
            fn decode_error(&self, _s: StatusCode, _b: &[u8]) -> Option<ConnectorError> {
                None
            }
            fn rate_limit_budget(&self, _path: &str) -> (u32, Duration) {
                (10, Duration::from_secs(1))
            }
        }

        let client = RestClient::new(
            Arc::new(BrokenAuth),
            RateLimiter::new(),
            Duration::from_secs(5),
        );
        let result = client
            .do_request(
                Method::GET,
                "/account",
                &HashMap::new(),
                &[],
                None,
                true,
                future::pending(),
            )
            .await;
        assert!(matches!(result, Err(ConnectorError::Authentication(_))));
    }
}
