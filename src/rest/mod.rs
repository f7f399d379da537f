//! Authenticated REST client: envelope, signing schemes.

pub mod envelope;
pub mod signing;

pub use envelope::{RestClient, SignedHeaders, VenueRest};
