//! Canonical event model: the uniform types every connector
//! emits and the discovery engine consumes, independent of any one venue's
//! wire shape.

pub mod identity;
pub mod instrument;
pub mod orderbook;
pub mod spread;
pub mod subscription;

pub use identity::{CanonicalSymbol, ExchangeId, Identity};
pub use instrument::{
    AssetInfo, FundingRate, Instrument, ListingState, PriceTicker, DEFAULT_FUNDING_INTERVAL_HOURS,
};
pub use orderbook::{LevelUpdate, OrderBook, PriceLevel, Side, Trade, TradeSide};
pub use spread::{spread_id, SpreadOpportunity};
pub use subscription::SubscriptionKey;

/// The union of canonical events a connector façade emits to its sink
///
#[derive(Debug, Clone)]
pub enum MarketEvent {
    OrderBook(OrderBook),
    Trade(Trade),
    FundingRate(FundingRate),
    PriceTicker(PriceTicker),
    AssetInfo(AssetInfo),
    Connected { exchange_id: ExchangeId },
    Disconnected { exchange_id: ExchangeId },
    Error(crate::error::ConnectorError),
}
