//! Concrete per-venue connectors

pub mod bingx;
pub mod gateio;
pub mod lbank;
pub mod okx;
