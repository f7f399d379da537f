//! Typed error taxonomy shared by every connector.
//!
//! Bootstrap glue and the supervisor's top-level run loop stay on
//! `anyhow::Result`; this type is reserved for operations whose caller needs
//! to inspect the failure kind: REST and WS requests.

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum ConnectorError {
    /// Dial/read/write failed, DNS, TLS, timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed frame, undecodable envelope, sequence gap on an incremental stream.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// HTTP non-2xx with a decodable venue error label, or a WS error block.
    #[error("venue error [{code}]: {message}")]
    VenueReported { code: String, message: String },

    /// Missing credentials, login failure, or a rejected per-subscribe signature.
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Rate-limiter cancellation, pending-request timeout, bounded channel full.
    #[error("resource error: {0}")]
    Resource(String),

    /// Supervisor shutdown propagated into an in-flight operation.
    #[error("cancelled")]
    Cancelled,
}

impl ConnectorError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    pub fn venue(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::VenueReported {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn resource(msg: impl Into<String>) -> Self {
        Self::Resource(msg.into())
    }

    /// Whether this error should trigger a session reconnect rather than
    /// propagate to the caller
    pub fn triggers_reconnect(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Protocol(_))
    }
}

pub type ConnectorResult<T> = Result<T, ConnectorError>;
