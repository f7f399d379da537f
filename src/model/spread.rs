//! Derived cross-venue arbitrage opportunity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::{CanonicalSymbol, ExchangeId};

/// `"<canonical>:<long_exchange>:<short_exchange>"`, unique per directed
/// opportunity (GLOSSARY "Spread id").
pub fn spread_id(canonical: &CanonicalSymbol, long: ExchangeId, short: ExchangeId) -> String {
    format!("{}:{}:{}", canonical, long, short)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpreadOpportunity {
    pub canonical: CanonicalSymbol,
    pub long_exchange: ExchangeId,
    pub short_exchange: ExchangeId,
    pub long_venue_symbol: String,
    pub short_venue_symbol: String,
    pub long_ask: f64,
    pub short_bid: f64,
    pub spread_bps: f64,
    pub long_funding: f64,
    pub short_funding: f64,
    pub net_funding: f64,
    pub long_depth_usd: f64,
    pub short_depth_usd: f64,
    pub min_depth_usd: f64,
    pub score: f64,
    pub updated_at: DateTime<Utc>,
}

impl SpreadOpportunity {
    pub fn id(&self) -> String {
        spread_id(&self.canonical, self.long_exchange, self.short_exchange)
    }
}
