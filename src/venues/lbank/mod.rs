//! LBank venue connector: MD5-digest-then-HMAC-SHA256 REST signing, no
//! dedicated WS login frame.

pub mod connector;
pub mod decode;
pub mod rest;
pub mod ws;

pub use connector::LBankConnector;
pub use rest::LBankCredentials;
