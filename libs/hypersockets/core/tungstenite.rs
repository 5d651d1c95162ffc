//! `tokio-tungstenite` connector

use crate::traits::*;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

/// Opens WebSocket connections, applying the request headers to the handshake
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SocketConnector for TungsteniteConnector {
    async fn connect(&self, request: &ConnectRequest) -> Result<Box<dyn SocketConnection>> {
        let mut handshake = request
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| HyperSocketError::Handshake(e.to_string()))?;

        for (name, value) in &request.headers {
            match (name.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
                (Ok(name), Ok(value)) => {
                    handshake.headers_mut().append(name, value);
                }
                _ => warn!("Skipping invalid handshake header '{}'", name),
            }
        }

        let (stream, response) = connect_async(handshake)
            .await
            .map_err(|e| HyperSocketError::Handshake(e.to_string()))?;
        debug!("Handshake with {} returned {}", request.url, response.status());

        Ok(Box::new(TungsteniteConnection { stream }))
    }
}

struct TungsteniteConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl SocketConnection for TungsteniteConnection {
    async fn send(&mut self, message: WsMessage) -> Result<()> {
        let frame = match message {
            WsMessage::Text(text) => Message::Text(text),
            WsMessage::Binary(bytes) => Message::Binary(bytes),
        };
        self.stream
            .send(frame)
            .await
            .map_err(|e| HyperSocketError::WebSocket(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<WsMessage>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(WsMessage::Text(text))),
                Ok(Message::Binary(bytes)) => return Some(Ok(WsMessage::Binary(bytes))),
                Ok(Message::Close(frame)) => {
                    debug!("Server sent close frame: {:?}", frame);
                    return None;
                }
                // Protocol ping/pong is answered by tungstenite itself
                Ok(_) => continue,
                Err(e) => return Some(Err(HyperSocketError::WebSocket(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .map_err(|e| HyperSocketError::WebSocket(e.to_string()))
    }
}
