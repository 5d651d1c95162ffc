//! # HyperSockets Traits
//!
//! Core traits and types shared by the session and its collaborators:
//!
//! - **SocketConnector**: Open a duplex connection for each (re)connect
//! - **FrameCodec**: Map named events to wire frames and recognise the liveness ack
//! - **ReconnectionStrategy**: Control reconnection delays

pub mod codec;
pub mod connector;
pub mod error;
pub mod message;
pub mod reconnect;

// Re-export commonly used types
pub use codec::{EventFrame, FrameCodec, Inbound, JsonEventCodec};
pub use connector::{ConnectRequest, SocketConnection, SocketConnector};
pub use error::{BoxError, HyperSocketError, Result};
pub use message::WsMessage;
pub use reconnect::{ExponentialBackoff, ReconnectionStrategy};
