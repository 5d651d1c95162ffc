//! Common test utilities for HyperSockets integration tests
//!
//! Provides a scripted in-process connector for lifecycle tests and a small
//! real WebSocket server for end-to-end tests over `tokio-tungstenite`.

#![allow(dead_code)]

use async_trait::async_trait;
use hypersockets::{
    ConnectRequest, HyperSocketError, Result, SocketConnection, SocketConnector, WsMessage,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Notify};

/// Macro for verbose test output (controlled by TEST_VERBOSE env var)
#[macro_export]
macro_rules! verbose_println {
    ($($arg:tt)*) => {
        if std::env::var("TEST_VERBOSE").is_ok() {
            println!($($arg)*);
        }
    };
}

/// Scripted outcome of one connect attempt
#[derive(Debug, Clone, Copy)]
pub enum Dial {
    /// Handshake fails
    Refuse,
    /// Handshake succeeds
    Accept,
    /// Handshake succeeds, then every send after the first `n` fails
    AcceptFailingAfter(usize),
}

/// Server end of an accepted mock connection
pub struct ServerSide {
    sent: mpsc::UnboundedReceiver<WsMessage>,
    inbound: Option<mpsc::UnboundedSender<Result<WsMessage>>>,
}

impl ServerSide {
    /// Deliver a frame to the session
    pub fn push(&self, text: &str) {
        if let Some(ref inbound) = self.inbound {
            let _ = inbound.send(Ok(WsMessage::from(text)));
        }
    }

    /// Report a transport error to the session
    pub fn fail(&self, reason: &str) {
        if let Some(ref inbound) = self.inbound {
            let _ = inbound.send(Err(HyperSocketError::WebSocket(reason.to_string())));
        }
    }

    /// Close from the server side
    pub fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Next frame the session sent, decoded as JSON
    pub async fn next_sent(&mut self) -> Option<Value> {
        let message = tokio::time::timeout(Duration::from_secs(5), self.sent.recv())
            .await
            .ok()??;
        message.as_text().and_then(|text| serde_json::from_str(text).ok())
    }

    /// Frames sent so far, without waiting
    pub fn drain_sent(&mut self) -> Vec<Value> {
        let mut frames: Vec<Value> = Vec::new();
        while let Ok(message) = self.sent.try_recv() {
            if let Some(value) = message
                .as_text()
                .and_then(|text| serde_json::from_str::<Value>(text).ok())
            {
                frames.push(value);
            }
        }
        frames
    }
}

struct MockConnection {
    outgoing: mpsc::UnboundedSender<WsMessage>,
    inbound: mpsc::UnboundedReceiver<Result<WsMessage>>,
    sends_left: Option<usize>,
}

#[async_trait]
impl SocketConnection for MockConnection {
    async fn send(&mut self, message: WsMessage) -> Result<()> {
        if let Some(ref mut left) = self.sends_left {
            if *left == 0 {
                return Err(HyperSocketError::WebSocket("scripted send failure".to_string()));
            }
            *left -= 1;
        }
        self.outgoing
            .send(message)
            .map_err(|_| HyperSocketError::ConnectionClosed("server side dropped".to_string()))
    }

    async fn recv(&mut self) -> Option<Result<WsMessage>> {
        self.inbound.recv().await
    }

    async fn close(&mut self) -> Result<()> {
        self.inbound.close();
        Ok(())
    }
}

/// Connector replaying a script; the last entry repeats once the script runs out
pub struct MockConnector {
    script: Mutex<VecDeque<Dial>>,
    last: Mutex<Dial>,
    attempts: AtomicUsize,
    requests: Mutex<Vec<ConnectRequest>>,
    accepted: Mutex<VecDeque<ServerSide>>,
}

impl MockConnector {
    pub fn new(script: impl IntoIterator<Item = Dial>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().collect()),
            last: Mutex::new(Dial::Refuse),
            attempts: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            accepted: Mutex::new(VecDeque::new()),
        })
    }

    pub fn always(dial: Dial) -> Arc<Self> {
        Self::new([dial])
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ConnectRequest> {
        self.requests.lock().clone()
    }

    /// Wait for the next accepted connection
    pub async fn accepted(&self) -> ServerSide {
        loop {
            if let Some(server) = self.accepted.lock().pop_front() {
                return server;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    fn next_dial(&self) -> Dial {
        let mut script = self.script.lock();
        let mut last = self.last.lock();
        if let Some(dial) = script.pop_front() {
            *last = dial;
        }
        *last
    }
}

#[async_trait]
impl SocketConnector for MockConnector {
    async fn connect(&self, request: &ConnectRequest) -> Result<Box<dyn SocketConnection>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        let sends_left = match self.next_dial() {
            Dial::Refuse => return Err(HyperSocketError::Handshake("scripted refusal".to_string())),
            Dial::Accept => None,
            Dial::AcceptFailingAfter(n) => Some(n),
        };

        let (outgoing, sent) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        self.accepted.lock().push_back(ServerSide {
            sent,
            inbound: Some(inbound_tx),
        });

        Ok(Box::new(MockConnection {
            outgoing,
            inbound,
            sends_left,
        }))
    }
}

/// Poll `condition` until it holds or `timeout` passes
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    tokio::time::timeout(timeout, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .is_ok()
}

/// Thread-safe call counter for subscribers
#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// A small WebSocket server: answers `{"event":"ping"}` with `{"event":"pong"}`
/// and echoes every other data frame
pub struct MockWsServer {
    pub addr: SocketAddr,
    shutdown: Arc<Notify>,
}

impl MockWsServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, _)) => {
                                let shutdown = shutdown_clone.clone();
                                tokio::spawn(async move {
                                    Self::handle_connection(stream, shutdown).await;
                                });
                            }
                            Err(e) => {
                                eprintln!("Accept error: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown_clone.notified() => {
                        break;
                    }
                }
            }
        });

        Self { addr, shutdown }
    }

    async fn handle_connection(stream: tokio::net::TcpStream, shutdown: Arc<Notify>) {
        use futures::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::Message;

        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                eprintln!("WebSocket handshake failed: {}", e);
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    let reply = match msg {
                        Some(Ok(Message::Text(text))) if text == r#"{"event":"ping"}"# => {
                            Message::Text(r#"{"event":"pong"}"#.to_string())
                        }
                        Some(Ok(msg)) if msg.is_text() || msg.is_binary() => msg,
                        Some(Ok(msg)) if msg.is_close() => break,
                        Some(Ok(_)) => continue,
                        Some(Err(_)) | None => break,
                    };
                    if write.send(reply).await.is_err() {
                        break;
                    }
                }
                _ = shutdown.notified() => {
                    break;
                }
            }
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}

impl Drop for MockWsServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}
