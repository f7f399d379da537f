//! Static per-venue contract facts, funding rates and tickers

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::identity::{CanonicalSymbol, ExchangeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingState {
    Trading,
    PreLaunch,
    Delisted,
}

/// Created once at subscription bootstrap via REST; mutable only via
/// explicit refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    pub exchange_id: ExchangeId,
    pub venue_symbol: String,
    pub canonical: CanonicalSymbol,
    pub tick_size: Decimal,
    pub lot_size: Decimal,
    pub contract_multiplier: Decimal,
    pub min_size: Decimal,
    pub max_size: Option<Decimal>,
    pub maker_fee: Decimal,
    pub taker_fee: Decimal,
    pub margin_currency: String,
    pub listing_state: ListingState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingRate {
    pub exchange_id: ExchangeId,
    pub canonical: CanonicalSymbol,
    pub funding_rate: f64,
    pub next_funding_time: DateTime<Utc>,
    pub interval_hours: u32,
    pub timestamp: DateTime<Utc>,
}

/// Default interval used when a venue omits it.
pub const DEFAULT_FUNDING_INTERVAL_HOURS: u32 = 8;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTicker {
    pub exchange_id: ExchangeId,
    pub venue_symbol: String,
    pub canonical: CanonicalSymbol,
    pub best_bid: Decimal,
    pub best_ask: Decimal,
    pub volume_24h: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetInfo {
    pub exchange_id: ExchangeId,
    pub asset: String,
    pub withdraw_enabled: bool,
    pub deposit_enabled: bool,
    pub withdraw_fee: Option<Decimal>,
    pub networks: Vec<String>,
}
