//! Opaque subscription key used by the registry and reconnect flow

use serde::{Deserialize, Serialize};

/// `(channel, ordered parameter tuple)`. Equality and hashing are purely
/// structural — the registry never interprets channel semantics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionKey {
    pub channel: String,
    pub params: Vec<String>,
}

impl SubscriptionKey {
    pub fn new(channel: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            channel: channel.into(),
            params,
        }
    }
}
