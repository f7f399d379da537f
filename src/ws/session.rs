//! Duplex WebSocket session: read/heartbeat/write-serialiser, login, pending
//! request correlation, and the reconnect state machine.
//!
//! States flow `Disconnected -> Dialing -> Connected -> (Authenticating ->)
//! Subscribed`, with exponential backoff-with-jitter between dial attempts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex as SyncMutex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, Mutex as AsyncMutex};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use chrono::{DateTime, Utc};

use crate::cancel::CancelWatch;
use crate::error::ConnectorError;
use crate::model::{ExchangeId, LevelUpdate, MarketEvent, OrderBook, Side, SubscriptionKey};
use crate::ws::subscriptions::SubscriptionRegistry;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WriteHalf = SplitSink<WsStream, Message>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Dialing,
    Connected,
    Authenticating,
    Subscribed,
}

/// Raw incremental book mutation as the wire described it, before merging
/// onto the session's held book. `prev_sequence_id` is the venue's "this
/// update continues from sequence N" marker, when it sends one; a mismatch
/// against the held book's current `sequence_id` is a sequence gap.
pub struct BookDeltaFrame {
    pub venue_symbol: String,
    pub bids: Vec<LevelUpdate>,
    pub asks: Vec<LevelUpdate>,
    pub prev_sequence_id: Option<u64>,
    pub sequence_id: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// Decoded shape of one inbound frame, independent of venue wire format.
pub enum Inbound {
    Push(MarketEvent),
    /// An incremental order-book mutation that must be merged onto a held
    /// snapshot rather than forwarded as-is (see `BookDeltaFrame`).
    BookDelta(BookDeltaFrame),
    LoginResult(Result<(), ConnectorError>),
    Response {
        req_id: String,
        payload: serde_json::Value,
    },
    /// A venue-reported error arriving outside the login window. Emitted as
    /// an error event; the session itself stays alive.
    VenueError(ConnectorError),
    Pong,
    Ignored,
}

/// Everything venue-specific a session needs: URL, frame shapes, decode.
pub trait VenueWs: Send + Sync {
    fn exchange_id(&self) -> ExchangeId;
    fn ws_url(&self) -> String;
    fn ping_interval(&self) -> Duration;
    /// `None` means rely on a protocol-level ping frame instead of an
    /// application-level one (a text ping or a JSON ping message).
    fn build_ping(&self) -> Option<Message>;
    /// `None` when no credentials are configured — the session stays public-only.
    fn build_login(&self) -> Option<Message>;
    fn build_subscribe(&self, key: &SubscriptionKey) -> Message;
    fn build_unsubscribe(&self, key: &SubscriptionKey) -> Message;
    fn decode(&self, raw: &str) -> Inbound;
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub reconnect_delay: Duration,
    pub max_retries: u32,
    pub login_timeout: Duration,
    pub request_timeout: Duration,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_cooldown: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            reconnect_delay: Duration::from_secs(3),
            max_retries: 10,
            login_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            circuit_breaker_threshold: 3,
            circuit_breaker_cooldown: Duration::from_secs(60),
        }
    }
}

struct PendingSlot {
    tx: oneshot::Sender<serde_json::Value>,
}

/// One duplex connection bound to a single (venue, settlement-scope).
pub struct WsSession<V: VenueWs> {
    venue: Arc<V>,
    config: SessionConfig,
    registry: Arc<SyncMutex<SubscriptionRegistry>>,
    pending: Arc<SyncMutex<HashMap<String, PendingSlot>>>,
    state: Arc<SyncMutex<SessionState>>,
    authenticated: Arc<AtomicBool>,
    reconnect_attempts: Arc<AtomicU32>,
    writer: Arc<AsyncMutex<Option<WriteHalf>>>,
    event_tx: mpsc::Sender<MarketEvent>,
    cancel: CancelWatch,
    /// Held books keyed by venue symbol, used to merge incremental deltas
    /// and detect sequence gaps. Cleared per symbol on a gap until the next
    /// snapshot arrives.
    books: Arc<SyncMutex<HashMap<String, OrderBook>>>,
    /// Poked by `force_reconnect` to interrupt a wedged dial/login/stream
    /// wait and drop straight into `run()`'s normal reconnect handling.
    force_reconnect: Arc<tokio::sync::Notify>,
}

impl<V: VenueWs + 'static> WsSession<V> {
    pub fn new(
        venue: Arc<V>,
        config: SessionConfig,
        event_tx: mpsc::Sender<MarketEvent>,
        cancel: CancelWatch,
    ) -> Self {
        Self {
            venue,
            config,
            registry: Arc::new(SyncMutex::new(SubscriptionRegistry::new())),
            pending: Arc::new(SyncMutex::new(HashMap::new())),
            state: Arc::new(SyncMutex::new(SessionState::Disconnected)),
            authenticated: Arc::new(AtomicBool::new(false)),
            reconnect_attempts: Arc::new(AtomicU32::new(0)),
            writer: Arc::new(AsyncMutex::new(None)),
            event_tx,
            cancel,
            books: Arc::new(SyncMutex::new(HashMap::new())),
            force_reconnect: Arc::new(tokio::sync::Notify::new()),
        }
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Drop the current connection attempt or stream, if any, and let
    /// `run()`'s reconnect loop redial immediately. A no-op if the session
    /// isn't currently alive to be interrupted (it will simply pick the
    /// notification up the next time it reaches a select point).
    pub fn force_reconnect(&self) {
        self.force_reconnect.notify_one();
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn set_state(&self, s: SessionState) {
        *self.state.lock() = s;
    }

    /// Add a key to the registry and, if currently subscribed, drive the
    /// corresponding WS frame immediately.
    pub async fn subscribe(&self, key: SubscriptionKey) -> Result<(), ConnectorError> {
        let frame = self.venue.build_subscribe(&key);
        self.registry.lock().record(key);
        if self.state() == SessionState::Subscribed {
            self.write(frame).await?;
        }
        Ok(())
    }

    pub async fn unsubscribe(&self, key: SubscriptionKey) -> Result<(), ConnectorError> {
        let frame = self.venue.build_unsubscribe(&key);
        self.registry.lock().forget(&key);
        if self.state() == SessionState::Subscribed {
            self.write(frame).await?;
        }
        Ok(())
    }

    pub fn subscription_snapshot(&self) -> Vec<SubscriptionKey> {
        self.registry.lock().snapshot()
    }

    async fn write(&self, frame: Message) -> Result<(), ConnectorError> {
        let mut guard = self.writer.lock().await;
        match guard.as_mut() {
            Some(sink) => sink
                .send(frame)
                .await
                .map_err(|e| ConnectorError::transport(e.to_string())),
            None => Err(ConnectorError::transport("socket not connected")),
        }
    }

    /// Send a request/response frame correlated by `req_id` and await the
    /// matching response within `request_timeout`, failing fast with
    /// `ConnectorError::Cancelled` if the session's cancellation fires first.
    pub async fn send_request(
        &self,
        req_id: String,
        frame: Message,
    ) -> Result<serde_json::Value, ConnectorError> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .insert(req_id.clone(), PendingSlot { tx });
        self.write(frame).await?;
        self.await_response(req_id, rx).await
    }

    /// Race a pending slot's response against `request_timeout` and the
    /// session's cancellation, clearing the slot on every losing path so no
    /// caller leaks a `pending` entry.
    async fn await_response(
        &self,
        req_id: String,
        rx: oneshot::Receiver<serde_json::Value>,
    ) -> Result<serde_json::Value, ConnectorError> {
        let mut cancel = self.cancel.clone();
        tokio::select! {
            result = tokio::time::timeout(self.config.request_timeout, rx) => match result {
                Ok(Ok(payload)) => Ok(payload),
                Ok(Err(_)) => Err(ConnectorError::Cancelled),
                Err(_) => {
                    self.pending.lock().remove(&req_id);
                    Err(ConnectorError::resource(format!(
                        "request {req_id} timed out after {:?}",
                        self.config.request_timeout
                    )))
                }
            },
            _ = cancel.cancelled() => {
                self.pending.lock().remove(&req_id);
                Err(ConnectorError::Cancelled)
            }
        }
    }

    /// Fail every pending slot on close, so no caller waits forever.
    fn fail_all_pending(&self) {
        let mut pending = self.pending.lock();
        for (_, slot) in pending.drain() {
            let _ = slot.tx; // dropping the sender fails the receiver with RecvError
        }
    }

    /// Runs forever until `cancel` fires: the reconnect state machine
    ///
    pub async fn run(&self) {
        let mut cancel = self.cancel.clone();
        loop {
            if cancel.is_cancelled() {
                self.close().await;
                return;
            }

            self.set_state(SessionState::Dialing);
            match self.dial_and_run(&mut cancel).await {
                Ok(()) => {
                    // run() only returns Ok on cancellation.
                    return;
                }
                Err(reason) => {
                    warn!(exchange = %self.venue.exchange_id(), %reason, "ws session dropped");
                }
            }

            self.set_state(SessionState::Disconnected);
            self.fail_all_pending();
            self.authenticated.store(false, Ordering::SeqCst);
            // Sequence numbering isn't guaranteed to carry across a dropped
            // socket; wait for fresh snapshots after reconnecting.
            self.books.lock().clear();

            let attempt = self.reconnect_attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt > self.config.max_retries {
                error!(
                    exchange = %self.venue.exchange_id(),
                    attempt,
                    "max reconnect retries exhausted, entering circuit-breaker cooldown"
                );
                let _ = self
                    .event_tx
                    .send(MarketEvent::Error(ConnectorError::transport(format!(
                        "{}: reconnect exhausted after {attempt} attempts",
                        self.venue.exchange_id()
                    ))))
                    .await;
                if Self::sleep_or_cancelled(self.config.circuit_breaker_cooldown, &mut cancel)
                    .await
                {
                    self.close().await;
                    return;
                }
                self.reconnect_attempts.store(0, Ordering::SeqCst);
                continue;
            }

            if Self::sleep_or_cancelled(self.config.reconnect_delay, &mut cancel).await {
                self.close().await;
                return;
            }
        }
    }

    async fn sleep_or_cancelled(dur: Duration, cancel: &mut CancelWatch) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(dur) => false,
            _ = cancel.cancelled() => true,
        }
    }

    /// One connect→subscribed→streaming lifetime. Returns `Ok(())` only when
    /// cancellation ended the session cleanly; any other exit returns `Err`
    /// so `run()` drives the reconnect loop.
    async fn dial_and_run(&self, cancel: &mut CancelWatch) -> Result<(), String> {
        let stream = tokio::select! {
            result = connect_async(self.venue.ws_url()) => result.map(|(s, _)| s).map_err(|e| e.to_string())?,
            _ = self.force_reconnect.notified() => return Err("forced reconnect".to_string()),
        };
        let (write, mut read) = stream.split();
        *self.writer.lock().await = Some(write);
        self.set_state(SessionState::Connected);
        self.reconnect_attempts.store(0, Ordering::SeqCst);
        let _ = self
            .event_tx
            .send(MarketEvent::Connected {
                exchange_id: self.venue.exchange_id(),
            })
            .await;

        if let Some(login_frame) = self.venue.build_login() {
            self.set_state(SessionState::Authenticating);
            match self
                .login(login_frame, &mut read, cancel)
                .await
                .map_err(|e| e.to_string())?
            {
                true => self.authenticated.store(true, Ordering::SeqCst),
                false => return Err("login rejected".to_string()),
            }
        }

        let subscribed_keys = self.registry.lock().snapshot();
        for key in subscribed_keys {
            let frame = self.venue.build_subscribe(&key);
            self.write(frame).await.map_err(|e| e.to_string())?;
        }
        self.set_state(SessionState::Subscribed);

        let mut ping_interval = tokio::time::interval(self.venue.ping_interval());
        ping_interval.tick().await; // first tick fires immediately; skip it

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = self.force_reconnect.notified() => return Err("forced reconnect".to_string()),
                _ = ping_interval.tick() => {
                    let ping = self.venue.build_ping().unwrap_or(Message::Ping(Vec::new()));
                    if self.write(ping).await.is_err() {
                        return Err("ping write failed".to_string());
                    }
                }
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => self.dispatch(&text).await,
                        Some(Ok(Message::Pong(_))) => {}
                        Some(Ok(Message::Close(_))) => return Err("server closed connection".to_string()),
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.to_string()),
                        None => return Err("stream ended".to_string()),
                    }
                }
            }
        }
    }

    /// Await either an explicit login reply or a bounded timeout: absence of
    /// an explicit error within `login_timeout` counts as success, since
    /// several venues never send a login acknowledgement at all.
    async fn login(
        &self,
        frame: Message,
        read: &mut futures_util::stream::SplitStream<WsStream>,
        cancel: &mut CancelWatch,
    ) -> Result<bool, ConnectorError> {
        self.write(frame).await?;
        let deadline = tokio::time::sleep(self.config.login_timeout);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ConnectorError::Cancelled),
                _ = self.force_reconnect.notified() => {
                    return Err(ConnectorError::transport("forced reconnect"));
                }
                _ = &mut deadline => return Ok(true),
                frame = read.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            match self.venue.decode(&text) {
                                Inbound::LoginResult(Ok(())) => return Ok(true),
                                Inbound::LoginResult(Err(e)) => return Err(e),
                                _ => continue,
                            }
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return Err(ConnectorError::transport(e.to_string())),
                        None => return Err(ConnectorError::transport("stream ended during login")),
                    }
                }
            }
        }
    }

    async fn dispatch(&self, raw: &str) {
        match self.venue.decode(raw) {
            Inbound::Push(MarketEvent::OrderBook(book)) if book.is_snapshot => {
                self.books
                    .lock()
                    .insert(book.venue_symbol.clone(), book.clone());
                if self
                    .event_tx
                    .send(MarketEvent::OrderBook(book))
                    .await
                    .is_err()
                {
                    debug!("event sink closed, dropping push");
                }
            }
            Inbound::Push(event) => {
                if self.event_tx.send(event).await.is_err() {
                    debug!("event sink closed, dropping push");
                }
            }
            Inbound::BookDelta(frame) => {
                if let Some(book) = self.merge_book_delta(frame) {
                    if self
                        .event_tx
                        .send(MarketEvent::OrderBook(book))
                        .await
                        .is_err()
                    {
                        debug!("event sink closed, dropping push");
                    }
                }
            }
            Inbound::Response { req_id, payload } => {
                if let Some(slot) = self.pending.lock().remove(&req_id) {
                    let _ = slot.tx.send(payload);
                }
            }
            Inbound::LoginResult(_) => {
                debug!("post-login auth frame ignored outside the login window");
            }
            Inbound::VenueError(err) => {
                warn!(exchange = %self.venue.exchange_id(), %err, "venue reported an error on the push stream");
                let _ = self.event_tx.send(MarketEvent::Error(err)).await;
            }
            Inbound::Pong => {}
            Inbound::Ignored => {
                debug!(raw_len = raw.len(), "dropped unrecognised frame");
            }
        }
    }

    /// Merge an incremental delta onto the held book for its symbol. Returns
    /// the merged, materialised book, or `None` when there is nothing to
    /// merge onto (no snapshot seen yet) or a sequence gap was detected — in
    /// either case the held book is dropped and the caller waits for the
    /// venue's next snapshot.
    fn merge_book_delta(&self, frame: BookDeltaFrame) -> Option<OrderBook> {
        let mut books = self.books.lock();
        let held = books.get_mut(&frame.venue_symbol)?;
        if held.sequence_id != frame.prev_sequence_id {
            warn!(
                exchange = %self.venue.exchange_id(),
                venue_symbol = %frame.venue_symbol,
                held_sequence_id = ?held.sequence_id,
                prev_sequence_id = ?frame.prev_sequence_id,
                "order book sequence gap, dropping held book"
            );
            books.remove(&frame.venue_symbol);
            return None;
        }
        held.apply_deltas(Side::Bid, &frame.bids, frame.sequence_id, frame.timestamp);
        held.apply_deltas(Side::Ask, &frame.asks, frame.sequence_id, frame.timestamp);
        Some(held.clone())
    }

    /// Cancel all loops, send a close frame, fail remaining pending slots.
    pub async fn close(&self) {
        let mut guard = self.writer.lock().await;
        if let Some(mut sink) = guard.take() {
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        }
        drop(guard);
        self.fail_all_pending();
        self.set_state(SessionState::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;

    struct EchoVenue;

    impl VenueWs for EchoVenue {
        fn exchange_id(&self) -> ExchangeId {
            ExchangeId::Okx
        }
        fn ws_url(&self) -> String {
            "wss://example.invalid/ws".to_string()
        }
        fn ping_interval(&self) -> Duration {
            Duration::from_secs(20)
        }
        fn build_ping(&self) -> Option<Message> {
            Some(Message::Text("ping".into()))
        }
        fn build_login(&self) -> Option<Message> {
            None
        }
        fn build_subscribe(&self, key: &SubscriptionKey) -> Message {
            Message::Text(format!("sub:{}", key.channel))
        }
        fn build_unsubscribe(&self, key: &SubscriptionKey) -> Message {
            Message::Text(format!("unsub:{}", key.channel))
        }
        fn decode(&self, _raw: &str) -> Inbound {
            Inbound::Ignored
        }
    }

    #[tokio::test]
    async fn subscribe_before_connect_only_updates_the_registry() {
        let (_tx_c, rx_c) = cancel_pair();
        let (tx, _rx) = mpsc::channel(8);
        let session = WsSession::new(Arc::new(EchoVenue), SessionConfig::default(), tx, rx_c);
        let key = SubscriptionKey::new("tickers", vec!["BTC-USDT".into()]);
        session.subscribe(key.clone()).await.unwrap();
        assert_eq!(session.subscription_snapshot(), vec![key]);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn request_without_response_times_out_and_clears_the_slot() {
        let (_tx_c, rx_c) = cancel_pair();
        let (tx, _rx) = mpsc::channel(8);
        let mut config = SessionConfig::default();
        config.request_timeout = Duration::from_millis(20);
        let session = WsSession::new(Arc::new(EchoVenue), config, tx, rx_c);
        // No live socket: `write` fails immediately, which also exercises
        // the "no side effects on timeout/failure" path.
        let result = session
            .send_request("r1".into(), Message::Text("ping".into()))
            .await;
        assert!(result.is_err());
        assert!(session.pending.lock().get("r1").is_none());
    }

    #[tokio::test]
    async fn cancellation_fails_a_pending_request_fast_instead_of_waiting_out_the_timeout() {
        let (tx_c, rx_c) = cancel_pair();
        let (tx, _rx) = mpsc::channel(8);
        let mut config = SessionConfig::default();
        config.request_timeout = Duration::from_secs(30);
        let session = WsSession::new(Arc::new(EchoVenue), config, tx, rx_c);
        let (_resp_tx, resp_rx) = oneshot::channel();
        session
            .pending
            .lock()
            .insert("r1".to_string(), PendingSlot { tx: _resp_tx });

        tx_c.cancel();
        let result = session.await_response("r1".to_string(), resp_rx).await;

        assert!(matches!(result, Err(ConnectorError::Cancelled)));
        assert!(session.pending.lock().get("r1").is_none());
    }

    #[tokio::test]
    async fn force_reconnect_wakes_a_pending_notified_wait() {
        let (_tx_c, rx_c) = cancel_pair();
        let (tx, _rx) = mpsc::channel(8);
        let session = WsSession::new(Arc::new(EchoVenue), SessionConfig::default(), tx, rx_c);

        session.force_reconnect();
        // `Notify::notify_one` stores a permit when called with no waiter
        // registered yet, so this resolves immediately rather than hanging.
        session.force_reconnect.notified().await;
    }

    fn snapshot(venue_symbol: &str) -> OrderBook {
        use rust_decimal_macros::dec;
        let mut book = OrderBook::empty(ExchangeId::Okx, venue_symbol);
        book.apply_snapshot(
            vec![crate::model::PriceLevel::new(dec!(100), dec!(1))],
            vec![crate::model::PriceLevel::new(dec!(101), dec!(1))],
            Some(10),
            Utc::now(),
        );
        book
    }

    fn delta(venue_symbol: &str, prev_sequence_id: Option<u64>, sequence_id: Option<u64>) -> BookDeltaFrame {
        use rust_decimal_macros::dec;
        BookDeltaFrame {
            venue_symbol: venue_symbol.to_string(),
            bids: vec![LevelUpdate { price: dec!(100), quantity: dec!(2) }],
            asks: vec![],
            prev_sequence_id,
            sequence_id,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn merges_a_contiguous_delta_onto_the_held_snapshot() {
        let (_tx_c, rx_c) = cancel_pair();
        let (tx, _rx) = mpsc::channel(8);
        let session = WsSession::new(Arc::new(EchoVenue), SessionConfig::default(), tx, rx_c);
        session
            .books
            .lock()
            .insert("BTC-USDT".to_string(), snapshot("BTC-USDT"));

        let merged = session
            .merge_book_delta(delta("BTC-USDT", Some(10), Some(11)))
            .expect("contiguous delta should merge");
        assert_eq!(merged.best_bid().unwrap().quantity.to_string(), "2");
        assert_eq!(session.books.lock().get("BTC-USDT").unwrap().sequence_id, Some(11));
    }

    #[tokio::test]
    async fn drops_the_held_book_on_a_sequence_gap() {
        let (_tx_c, rx_c) = cancel_pair();
        let (tx, _rx) = mpsc::channel(8);
        let session = WsSession::new(Arc::new(EchoVenue), SessionConfig::default(), tx, rx_c);
        session
            .books
            .lock()
            .insert("BTC-USDT".to_string(), snapshot("BTC-USDT"));

        let merged = session.merge_book_delta(delta("BTC-USDT", Some(999), Some(1000)));
        assert!(merged.is_none());
        assert!(session.books.lock().get("BTC-USDT").is_none());
    }

    #[tokio::test]
    async fn a_delta_with_no_prior_snapshot_is_dropped() {
        let (_tx_c, rx_c) = cancel_pair();
        let (tx, _rx) = mpsc::channel(8);
        let session = WsSession::new(Arc::new(EchoVenue), SessionConfig::default(), tx, rx_c);

        let merged = session.merge_book_delta(delta("BTC-USDT", Some(10), Some(11)));
        assert!(merged.is_none());
    }
}
