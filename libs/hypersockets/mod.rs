//! # HyperSockets
//!
//! A reconnecting WebSocket session with named-event pub/sub.
//!
//! ## Features
//!
//! - **Auto-reconnect**: exponential backoff with a capped delay and a maximum attempt count
//! - **Liveness heartbeat**: periodic ping; a missing ack forces a reconnect
//! - **Offline buffering**: `emit` queues frames while disconnected and flushes them in order
//! - **Lock-free state**: atomic connection state and counters
//! - **Pluggable seams**: connector, frame codec and reconnection strategy are traits
//!
//! ```rust,ignore
//! use hypersockets::{SocketConfig, SocketSession};
//! use serde_json::json;
//!
//! let session = SocketSession::new(SocketConfig::new("wss://stream.example.com/ws").with_token("abc"));
//! session.on("trade", |data| {
//!     println!("trade: {}", data);
//!     Ok(())
//! });
//! session.connect()?;
//! session.emit("subscribe", json!({ "channel": "trades" }))?;
//! ```

pub mod core;
pub mod traits;

// Re-export all traits
pub use traits::*;

pub use self::core::{
    events, AtomicConnectionState, AtomicMetrics, ConnectionState, HeartbeatConfig, Metrics,
    PongTracker, ReconnectConfig, SessionEvent, SocketConfig, SocketSession, SocketSettings,
    SubscriberRegistry, SubscriptionId, TungsteniteConnector, EVENT_BUFFER,
};
