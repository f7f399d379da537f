//! Subscription registry.
//!
//! A plain `HashSet` guarded by a per-session `parking_lot::Mutex`. Key
//! equality is purely structural, so the registry never needs to know what
//! a channel means.

use std::collections::HashSet;

use crate::model::SubscriptionKey;

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    keys: HashSet<SubscriptionKey>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key after a subscribe frame is written — even before the
    /// server acknowledges it.
    pub fn record(&mut self, key: SubscriptionKey) {
        self.keys.insert(key);
    }

    pub fn forget(&mut self, key: &SubscriptionKey) {
        self.keys.remove(key);
    }

    pub fn contains(&self, key: &SubscriptionKey) -> bool {
        self.keys.contains(key)
    }

    /// A deterministic snapshot used to re-drive subscriptions on reconnect.
    pub fn snapshot(&self) -> Vec<SubscriptionKey> {
        let mut keys: Vec<_> = self.keys.iter().cloned().collect();
        keys.sort_by(|a, b| (&a.channel, &a.params).cmp(&(&b.channel, &b.params)));
        keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(channel: &str, params: &[&str]) -> SubscriptionKey {
        SubscriptionKey::new(channel, params.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn snapshot_is_deterministic_across_insertion_orders() {
        let mut a = SubscriptionRegistry::new();
        a.record(key("tickers", &["BTC-USDT"]));
        a.record(key("orderbook", &["BTC-USDT", "20", "100ms"]));

        let mut b = SubscriptionRegistry::new();
        b.record(key("orderbook", &["BTC-USDT", "20", "100ms"]));
        b.record(key("tickers", &["BTC-USDT"]));

        assert_eq!(a.snapshot(), b.snapshot());
    }

    #[test]
    fn forget_removes_only_the_matching_key() {
        let mut reg = SubscriptionRegistry::new();
        reg.record(key("tickers", &["BTC-USDT"]));
        reg.record(key("tickers", &["ETH-USDT"]));
        reg.forget(&key("tickers", &["BTC-USDT"]));
        assert_eq!(reg.snapshot(), vec![key("tickers", &["ETH-USDT"])]);
    }
}
