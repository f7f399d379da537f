//! Publisher / store adapter: a thin, idempotent facade
//! over a pub/sub channel and a latest-value KV store. Best-effort — a
//! failure here is logged and never surfaced to the discovery engine.

use async_trait::async_trait;

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn set_latest(&self, key: &str, bytes: Vec<u8>);
    async fn publish(&self, channel: &str, bytes: Vec<u8>);
    async fn set_list(&self, bytes: Vec<u8>);
}

/// Stdout/log-backed publisher. A real deployment wires a pub/sub channel
/// and a KV store behind the same trait; this implementation satisfies it
/// without inventing a fake network dependency.
pub struct LoggingPublisher;

#[async_trait]
impl Publisher for LoggingPublisher {
    async fn set_latest(&self, key: &str, bytes: Vec<u8>) {
        tracing::debug!(key, bytes = bytes.len(), "set_latest");
    }

    async fn publish(&self, channel: &str, bytes: Vec<u8>) {
        tracing::debug!(channel, bytes = bytes.len(), "publish");
    }

    async fn set_list(&self, bytes: Vec<u8>) {
        tracing::debug!(bytes = bytes.len(), "set_list spreads:list");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logging_publisher_accepts_every_operation_without_panicking() {
        let publisher = LoggingPublisher;
        publisher.set_latest("spread:BTC-USDT-PERP:okx:gateio", b"{}".to_vec()).await;
        publisher.publish("spread:BTC-USDT-PERP", b"{}".to_vec()).await;
        publisher.set_list(b"{}".to_vec()).await;
    }
}
