//! WebSocket session management

pub mod session;
pub mod subscriptions;

pub use session::{BookDeltaFrame, Inbound, SessionConfig, SessionState, VenueWs, WsSession};
pub use subscriptions::SubscriptionRegistry;
