pub mod config;
pub mod connection_state;
pub mod heartbeat;
pub mod pong_tracker;
pub mod session;
pub mod subscribers;
pub mod tungstenite;

pub use config::{HeartbeatConfig, ReconnectConfig, SocketConfig, SocketSettings};
pub use connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
pub use heartbeat::{spawn_heartbeat, Heartbeat};
pub use pong_tracker::PongTracker;
pub use session::{events, Metrics, EVENT_BUFFER, SessionEvent, SocketSession};
pub use subscribers::{Handler, SubscriberRegistry, SubscriptionId};
pub use tungstenite::TungsteniteConnector;
