//! Market-data ingestion and cross-exchange spread-discovery service for
//! crypto perpetual futures.
//!
//! Connectors (OKX, Gate.io, LBank, BingX) each own a WebSocket session plus
//! a rate-limited REST fallback and emit a uniform event stream; the
//! discovery engine fuses that stream into ranked long/short spread
//! opportunities and republishes them.

pub mod cancel;
pub mod config;
pub mod connector;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod model;
pub mod observability;
pub mod publish;
pub mod ratelimit;
pub mod rest;
pub mod supervisor;
pub mod venues;
pub mod ws;

pub use cancel::{cancel_pair, CancelToken, CancelWatch};
pub use config::Config;
pub use connector::Connector;
pub use discovery::{DiscoveryConfig, DiscoveryEngine};
pub use error::{ConnectorError, ConnectorResult};
pub use supervisor::Supervisor;
