//! Connection seam
//!
//! The session never talks to a WebSocket library directly. It asks a
//! [`SocketConnector`] for a fresh [`SocketConnection`] on every (re)connect
//! and drops the old one, so at most one connection is alive at a time.

use crate::traits::error::Result;
use crate::traits::message::WsMessage;
use async_trait::async_trait;
use url::Url;

/// Everything needed to open one connection
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectRequest {
    /// Endpoint with query parameters already applied
    pub url: Url,
    /// Handshake headers, including `Authorization` when a token is set
    pub headers: Vec<(String, String)>,
}

/// One live duplex connection
#[async_trait]
pub trait SocketConnection: Send {
    async fn send(&mut self, message: WsMessage) -> Result<()>;

    /// Next data frame; `None` once the peer has closed the connection
    ///
    /// Must be cancel safe: the session polls it inside `select!`.
    async fn recv(&mut self) -> Option<Result<WsMessage>>;

    async fn close(&mut self) -> Result<()>;
}

/// Opens connections for a session
#[async_trait]
pub trait SocketConnector: Send + Sync {
    async fn connect(&self, request: &ConnectRequest) -> Result<Box<dyn SocketConnection>>;
}
