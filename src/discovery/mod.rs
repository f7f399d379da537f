//! Spread-discovery engine: per-canonical cross-venue
//! order-book/funding fan-in and the periodic publication tick.

pub mod engine;

pub use engine::{DiscoveryConfig, DiscoveryEngine};
