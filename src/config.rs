//! Process configuration loaded from the environment: `dotenv` first, then
//! `std::env::var(...).unwrap_or_else(...).parse().unwrap_or(...)` per field.

use crate::venues::bingx::BingXCredentials;
use crate::venues::gateio::GateIoCredentials;
use crate::venues::lbank::LBankCredentials;
use crate::venues::okx::OkxCredentials;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub depth_levels: u32,
    pub reconnect_delay_secs: u64,
    pub ping_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub min_spread_bps: f64,
    pub min_depth_usd: f64,
    pub publish_interval_ms: u64,
    pub top_k: usize,
    pub freshness_window_secs: u64,
    pub login_timeout_ms: u64,

    pub okx: VenueConfig<OkxCredentials>,
    pub gateio: VenueConfig<GateIoCredentials>,
    pub lbank: VenueConfig<LBankCredentials>,
    pub bingx: VenueConfig<BingXCredentials>,
}

#[derive(Debug, Clone)]
pub struct VenueConfig<C> {
    pub enabled: bool,
    pub rest_base_url: String,
    pub ws_base_url: String,
    pub credentials: Option<C>,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "yes"))
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            http_port: env_parse("HTTP_PORT", 8090),
            depth_levels: env_parse("DEPTH_LEVELS", 20),
            reconnect_delay_secs: env_parse("RECONNECT_DELAY_SECS", 3),
            ping_interval_secs: env_parse("PING_INTERVAL_SECS", 20),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 10),
            min_spread_bps: env_parse("MIN_SPREAD_BPS", 5.0),
            min_depth_usd: env_parse("MIN_DEPTH_USD", 5_000.0),
            publish_interval_ms: env_parse("PUBLISH_INTERVAL_MS", 500),
            top_k: env_parse("TOP_K", 100),
            freshness_window_secs: env_parse("FRESHNESS_WINDOW_SECS", publish_derived_freshness()),
            login_timeout_ms: env_parse("LOGIN_TIMEOUT_MS", 5_000),

            okx: VenueConfig {
                enabled: env_flag("OKX_ENABLED", true),
                rest_base_url: env_or("OKX_REST_BASE_URL", "https://www.okx.com"),
                ws_base_url: env_or("OKX_WS_BASE_URL", "wss://ws.okx.com:8443/ws/v5/public"),
                credentials: credentials_triplet(
                    "OKX_API_KEY",
                    "OKX_API_SECRET",
                    "OKX_PASSPHRASE",
                )
                .map(|(api_key, api_secret, passphrase)| OkxCredentials {
                    api_key,
                    api_secret,
                    passphrase: passphrase.unwrap_or_default(),
                }),
            },
            gateio: VenueConfig {
                enabled: env_flag("GATEIO_ENABLED", true),
                rest_base_url: env_or("GATEIO_REST_BASE_URL", "https://api.gateio.ws"),
                ws_base_url: env_or(
                    "GATEIO_WS_BASE_URL",
                    "wss://fx-ws.gateio.ws/v4/ws/usdt",
                ),
                credentials: credentials_pair("GATEIO_API_KEY", "GATEIO_API_SECRET")
                    .map(|(api_key, api_secret)| GateIoCredentials { api_key, api_secret }),
            },
            lbank: VenueConfig {
                enabled: env_flag("LBANK_ENABLED", true),
                rest_base_url: env_or("LBANK_REST_BASE_URL", "https://api.lbkex.com"),
                ws_base_url: env_or("LBANK_WS_BASE_URL", "wss://www.lbkex.net/ws/V2/"),
                credentials: credentials_pair("LBANK_API_KEY", "LBANK_API_SECRET")
                    .map(|(api_key, api_secret)| LBankCredentials { api_key, api_secret }),
            },
            bingx: VenueConfig {
                enabled: env_flag("BINGX_ENABLED", true),
                rest_base_url: env_or("BINGX_REST_BASE_URL", "https://open-api.bingx.com"),
                ws_base_url: env_or(
                    "BINGX_WS_BASE_URL",
                    "wss://open-api-swap.bingx.com/swap-market",
                ),
                credentials: credentials_pair("BINGX_API_KEY", "BINGX_API_SECRET")
                    .map(|(api_key, api_secret)| BingXCredentials { api_key, api_secret }),
            },
        })
    }
}

fn publish_derived_freshness() -> u64 {
    // Default freshness window is 5x the publish interval: 500ms * 5 = 2.5s,
    // rounded up to whole seconds.
    let total_ms = env_parse::<u64>("PUBLISH_INTERVAL_MS", 500) * 5;
    ((total_ms + 999) / 1000).max(1)
}

fn credentials_pair(key_var: &str, secret_var: &str) -> Option<(String, String)> {
    let key = std::env::var(key_var).ok()?;
    let secret = std::env::var(secret_var).ok()?;
    if key.is_empty() || secret.is_empty() {
        return None;
    }
    Some((key, secret))
}

fn credentials_triplet(
    key_var: &str,
    secret_var: &str,
    extra_var: &str,
) -> Option<(String, String, Option<String>)> {
    let (key, secret) = credentials_pair(key_var, secret_var)?;
    Some((key, secret, std::env::var(extra_var).ok()))
}
