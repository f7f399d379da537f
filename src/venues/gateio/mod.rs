//! Gate.io venue connector: HMAC-SHA512 REST signing, newline-joined WS login.

pub mod connector;
pub mod decode;
pub mod rest;
pub mod ws;

pub use connector::GateIoConnector;
pub use rest::GateIoCredentials;
