//! Reconnecting socket session
//!
//! A [`SocketSession`] owns one logical connection. A background task drives
//! the lifecycle:
//!
//! ```text
//! disconnected ──connect()──> connecting ──handshake ok──> connected
//!                                 │  ▲                         │
//!                  handshake error│  │after backoff            │error / close by peer /
//!                                 ▼  │                         │heartbeat timeout
//!                              reconnecting <──────────────────┘
//!                                 │
//!                                 └──attempts exhausted──> disconnected (reconnect_failed)
//! ```
//!
//! While disconnected, [`SocketSession::emit`] buffers frames in an unbounded
//! FIFO queue. On connect the queue is flushed before anything emitted later.

use crate::core::config::SocketConfig;
use crate::core::connection_state::{AtomicConnectionState, AtomicMetrics, ConnectionState};
use crate::core::heartbeat::{spawn_heartbeat, Heartbeat};
use crate::core::pong_tracker::PongTracker;
use crate::core::subscribers::{SubscriberRegistry, SubscriptionId};
use crate::core::tungstenite::TungsteniteConnector;
use crate::traits::*;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Subscriber event names emitted by the session itself
pub mod events {
    /// Handshake completed; data is `null`
    pub const CONNECT: &str = "connect";
    /// Connection lost or handshake failed; data is `{"reason"}`
    pub const DISCONNECT: &str = "disconnect";
    /// Backoff scheduled; data is `{"attempt", "delay_ms"}`
    pub const RECONNECTING: &str = "reconnecting";
    /// Reconnect attempts exhausted; data is `{"attempts"}`
    pub const RECONNECT_FAILED: &str = "reconnect_failed";
    /// Transport or codec failure; data is `{"message"}`
    pub const ERROR: &str = "error";
    /// Inbound frame the codec could not decode; data is the raw frame
    pub const MESSAGE: &str = "message";
}

/// Lifecycle events retained for [`SocketSession::events`]; once full the
/// oldest is dropped to make room
pub const EVENT_BUFFER: usize = 1024;

/// Lifecycle notifications, delivered on [`SocketSession::events`]
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    Disconnected(String),
    Reconnecting { attempt: usize, delay: Duration },
    ReconnectFailed { attempts: usize },
    Error(String),
    Closed,
}

/// Session metrics snapshot
#[derive(Debug, Clone)]
pub struct Metrics {
    pub messages_sent: u64,
    pub messages_received: u64,
    pub reconnect_count: u64,
    pub queued: usize,
    pub connection_state: ConnectionState,
}

struct Shared {
    config: SocketConfig,
    connector: Arc<dyn SocketConnector>,
    codec: Arc<dyn FrameCodec>,
    strategy: Box<dyn ReconnectionStrategy>,
    state: AtomicConnectionState,
    metrics: AtomicMetrics,
    subscribers: SubscriberRegistry,
    /// Frames waiting for a connection
    queue: Mutex<VecDeque<EventFrame>>,
    /// Set only while connected; lock order is `queue` then `outbox`
    outbox: Mutex<Option<mpsc::UnboundedSender<EventFrame>>>,
    liveness: PongTracker,
    event_tx: Sender<SessionEvent>,
    event_rx: Receiver<SessionEvent>,
    close_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

/// Closes the session when the last handle is dropped
struct DropGuard(Arc<Shared>);

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.0.close_tx.send_replace(true);
    }
}

/// Persistent duplex connection with named-event pub/sub, heartbeat,
/// exponential-backoff reconnect and offline buffering
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct SocketSession {
    shared: Arc<Shared>,
    _guard: Arc<DropGuard>,
}

impl SocketSession {
    /// Session over `tokio-tungstenite` with the JSON event codec
    pub fn new(config: SocketConfig) -> Self {
        Self::with_connector(config, Arc::new(TungsteniteConnector::new()))
    }

    pub fn with_connector(config: SocketConfig, connector: Arc<dyn SocketConnector>) -> Self {
        Self::with_parts(config, connector, Arc::new(JsonEventCodec::new()))
    }

    pub fn with_parts(
        config: SocketConfig,
        connector: Arc<dyn SocketConnector>,
        codec: Arc<dyn FrameCodec>,
    ) -> Self {
        let liveness_timeout = config
            .heartbeat
            .map_or(Duration::MAX, |heartbeat| heartbeat.timeout);
        let (event_tx, event_rx) = bounded(EVENT_BUFFER);
        let (close_tx, _) = watch::channel(false);

        let shared = Arc::new(Shared {
            strategy: Box::new(config.reconnect.strategy()),
            config,
            connector,
            codec,
            state: AtomicConnectionState::default(),
            metrics: AtomicMetrics::new(),
            subscribers: SubscriberRegistry::new(),
            queue: Mutex::new(VecDeque::new()),
            outbox: Mutex::new(None),
            liveness: PongTracker::new(liveness_timeout),
            event_tx,
            event_rx,
            close_tx,
            task: Mutex::new(None),
            disposed: AtomicBool::new(false),
        });

        Self {
            _guard: Arc::new(DropGuard(Arc::clone(&shared))),
            shared,
        }
    }

    /// Start connecting in the background
    ///
    /// No-op while the session is already connecting, connected or
    /// reconnecting. Must be called from within a Tokio runtime.
    pub fn connect(&self) -> Result<()> {
        self.ensure_active()?;
        self.shared.config.connect_request()?;

        let mut task = self.shared.task.lock();
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            debug!("connect() ignored, session is {}", self.shared.state.get());
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| HyperSocketError::InvalidState(format!("connect requires a Tokio runtime: {}", e)))?;

        self.shared.close_tx.send_replace(false);
        self.shared.state.set(ConnectionState::Connecting);
        let close_rx = self.shared.close_tx.subscribe();
        *task = Some(runtime.spawn(run_session(Arc::clone(&self.shared), close_rx)));
        Ok(())
    }

    /// Close the connection, stop reconnecting and drop all subscriptions
    /// and queued frames
    pub async fn close(&self) {
        self.shared.close_tx.send_replace(true);

        let handle = self.shared.task.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Session task ended abnormally: {}", e);
            }
        }

        self.shared.subscribers.clear();
        self.shared.queue.lock().clear();
        self.shared.state.set(ConnectionState::Disconnected);
        self.shared.publish(SessionEvent::Closed);
        info!("Session to {} closed", self.shared.config.url);
    }

    /// Close for good; later `connect` and `emit` calls fail with `Disposed`
    pub async fn dispose(&self) {
        self.shared.disposed.store(true, Ordering::Release);
        self.close().await;
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.disposed.load(Ordering::Acquire)
    }

    /// Send `data` under `event` now if connected, otherwise queue it
    pub fn emit(&self, event: impl Into<String>, data: Value) -> Result<()> {
        self.ensure_active()?;
        let frame = EventFrame::new(event, data);

        let mut queue = self.shared.queue.lock();
        let outbox = self.shared.outbox.lock();
        let frame = match outbox.as_ref() {
            Some(tx) => match tx.send(frame) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::SendError(frame)) => frame,
            },
            None => frame,
        };

        if self.shared.config.debug {
            debug!("Queued '{}' ({} pending)", frame.event, queue.len() + 1);
        }
        queue.push_back(frame);
        Ok(())
    }

    pub fn on<F>(&self, event: impl Into<String>, handler: F) -> SubscriptionId
    where
        F: Fn(&Value) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        self.shared.subscribers.on(event, handler)
    }

    pub fn off(&self, event: &str, id: SubscriptionId) -> bool {
        self.shared.subscribers.off(event, id)
    }

    pub fn off_all(&self, event: &str) -> usize {
        self.shared.subscribers.off_all(event)
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state.get()
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state.is_connected()
    }

    pub fn queued(&self) -> usize {
        self.shared.queue.lock().len()
    }

    pub fn config(&self) -> &SocketConfig {
        &self.shared.config
    }

    pub fn metrics(&self) -> Metrics {
        let metrics = &self.shared.metrics;
        Metrics {
            messages_sent: metrics.messages_sent(),
            messages_received: metrics.messages_received(),
            reconnect_count: metrics.reconnect_count(),
            queued: self.queued(),
            connection_state: self.shared.state.get(),
        }
    }

    /// Lifecycle event stream; every clone shares the same buffer of the
    /// latest [`EVENT_BUFFER`] events
    pub fn events(&self) -> Receiver<SessionEvent> {
        self.shared.event_rx.clone()
    }

    /// Poll until the session reaches `state`; false on timeout
    pub async fn wait_for_state(&self, state: ConnectionState, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while self.state() != state {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .is_ok()
    }

    fn ensure_active(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(HyperSocketError::Disposed);
        }
        Ok(())
    }
}

async fn wait_closed(close_rx: &mut watch::Receiver<bool>) {
    let _ = close_rx.wait_for(|closed| *closed).await;
}

async fn liveness_deadline(liveness: &PongTracker) {
    match liveness.deadline() {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn next_tick(heartbeat: &mut Option<Heartbeat>) -> Option<WsMessage> {
    match heartbeat {
        Some(heartbeat) => heartbeat.tick().await,
        None => std::future::pending().await,
    }
}

/// Main session task loop
async fn run_session(shared: Arc<Shared>, mut close_rx: watch::Receiver<bool>) {
    let mut attempt = 0;

    loop {
        if *close_rx.borrow() {
            break;
        }

        shared.state.set(ConnectionState::Connecting);
        if shared.config.debug {
            debug!("Connecting to {} (attempt {})", shared.config.url, attempt);
        }

        let opened = tokio::select! {
            _ = wait_closed(&mut close_rx) => break,
            opened = shared.open() => opened,
        };

        let reason = match opened {
            Ok(connection) => {
                attempt = 0;
                match shared.run_connection(connection, &mut close_rx).await {
                    Ok(()) => break,
                    Err(e) => e,
                }
            }
            Err(e) => e,
        };

        if *close_rx.borrow() {
            break;
        }

        warn!("Connection to {} lost: {}", shared.config.url, reason);
        let next_delay = shared.strategy.next_delay(attempt);
        shared.state.set(match next_delay {
            Some(_) => ConnectionState::Reconnecting,
            None => ConnectionState::Disconnected,
        });
        shared.notify(
            SessionEvent::Error(reason.to_string()),
            events::ERROR,
            json!({ "message": reason.to_string() }),
        );
        shared.notify(
            SessionEvent::Disconnected(reason.to_string()),
            events::DISCONNECT,
            json!({ "reason": reason.to_string() }),
        );

        match next_delay {
            Some(delay) => {
                info!("Reconnecting in {:?} (attempt {})", delay, attempt + 1);
                shared.notify(
                    SessionEvent::Reconnecting {
                        attempt: attempt + 1,
                        delay,
                    },
                    events::RECONNECTING,
                    json!({ "attempt": attempt + 1, "delay_ms": delay.as_millis() as u64 }),
                );

                tokio::select! {
                    _ = wait_closed(&mut close_rx) => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                attempt += 1;
                shared.metrics.increment_reconnects();
            }
            None => {
                error!("Reconnection strategy exhausted after {} attempts", attempt);
                shared.notify(
                    SessionEvent::ReconnectFailed { attempts: attempt },
                    events::RECONNECT_FAILED,
                    json!({ "attempts": attempt }),
                );
                break;
            }
        }
    }

    debug!("Session task exiting");
}

impl Shared {
    fn notify(&self, event: SessionEvent, name: &str, data: Value) {
        self.publish(event);
        self.subscribers.dispatch(name, &data);
    }

    fn publish(&self, event: SessionEvent) {
        if let Err(TrySendError::Full(event)) = self.event_tx.try_send(event) {
            let _ = self.event_rx.try_recv();
            let _ = self.event_tx.try_send(event);
        }
    }

    async fn open(&self) -> Result<Box<dyn SocketConnection>> {
        let request = self.config.connect_request()?;
        match tokio::time::timeout(self.config.connect_timeout, self.connector.connect(&request)).await {
            Ok(result) => result,
            Err(_) => Err(HyperSocketError::Timeout(format!(
                "handshake with {} exceeded {:?}",
                request.url, self.config.connect_timeout
            ))),
        }
    }

    /// Serve one connection until it fails (`Err`) or the session is closed (`Ok`)
    async fn run_connection(
        &self,
        mut connection: Box<dyn SocketConnection>,
        close_rx: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
        let backlog: Vec<EventFrame> = {
            let mut queue = self.queue.lock();
            *self.outbox.lock() = Some(outbox_tx);
            self.state.set(ConnectionState::Connected);
            queue.drain(..).collect()
        };
        self.liveness.reset();

        info!("Connected to {}", self.config.url);
        self.notify(SessionEvent::Connected, events::CONNECT, Value::Null);

        let result = match self.flush(connection.as_mut(), backlog).await {
            Ok(()) => {
                let mut heartbeat = self
                    .config
                    .heartbeat
                    .map(|config| spawn_heartbeat(config.interval, self.codec.ping()));
                let result = self
                    .drive(connection.as_mut(), &mut outbox_rx, &mut heartbeat, close_rx)
                    .await;
                if let Some(heartbeat) = heartbeat {
                    heartbeat.stop().await;
                }
                result
            }
            Err(e) => Err(e),
        };

        self.detach(&mut outbox_rx);

        if result.is_ok() {
            if let Err(e) = connection.close().await {
                debug!("Error closing connection: {}", e);
            }
        }
        result
    }

    /// Send the backlog in order; on failure put the unsent rest back at the
    /// head of the queue
    async fn flush(&self, connection: &mut dyn SocketConnection, backlog: Vec<EventFrame>) -> Result<()> {
        if !backlog.is_empty() {
            debug!("Flushing {} queued frames", backlog.len());
        }

        let mut pending = VecDeque::from(backlog);
        while let Some(frame) = pending.pop_front() {
            if let Err(e) = self.send_frame(connection, &frame).await {
                pending.push_front(frame);
                let mut queue = self.queue.lock();
                for frame in pending.into_iter().rev() {
                    queue.push_front(frame);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    async fn drive(
        &self,
        connection: &mut dyn SocketConnection,
        outbox_rx: &mut mpsc::UnboundedReceiver<EventFrame>,
        heartbeat: &mut Option<Heartbeat>,
        close_rx: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                _ = wait_closed(close_rx) => return Ok(()),

                inbound = connection.recv() => match inbound {
                    Some(Ok(message)) => self.handle_inbound(message),
                    Some(Err(e)) => return Err(e),
                    None => return Err(HyperSocketError::ConnectionClosed("closed by peer".to_string())),
                },

                Some(frame) = outbox_rx.recv() => {
                    if let Err(e) = self.send_frame(connection, &frame).await {
                        self.queue.lock().push_front(frame);
                        return Err(e);
                    }
                }

                _ = liveness_deadline(&self.liveness) => {
                    return Err(HyperSocketError::HeartbeatTimeout(self.liveness.timeout()));
                }

                Some(ping) = next_tick(heartbeat) => {
                    if self.config.debug {
                        debug!("-> heartbeat");
                    }
                    connection.send(ping).await?;
                    self.liveness.record_ping_sent();
                }
            }
        }
    }

    /// Detach the outbox and move anything still in it to the queue
    fn detach(&self, outbox_rx: &mut mpsc::UnboundedReceiver<EventFrame>) {
        let mut queue = self.queue.lock();
        self.outbox.lock().take();
        while let Ok(frame) = outbox_rx.try_recv() {
            queue.push_back(frame);
        }
    }

    async fn send_frame(&self, connection: &mut dyn SocketConnection, frame: &EventFrame) -> Result<()> {
        let message = match self.codec.encode(frame) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping '{}' frame: {}", frame.event, e);
                self.notify(
                    SessionEvent::Error(e.to_string()),
                    events::ERROR,
                    json!({ "message": e.to_string() }),
                );
                return Ok(());
            }
        };

        if self.config.debug {
            debug!("-> {} ({} bytes)", frame.event, message.len());
        }
        connection.send(message).await?;
        self.metrics.increment_sent();
        Ok(())
    }

    fn handle_inbound(&self, message: WsMessage) {
        self.metrics.increment_received();

        match self.codec.decode(&message) {
            Ok(Inbound::Ack) => {
                if self.config.debug {
                    debug!("<- heartbeat ack");
                }
                self.liveness.record_ack();
            }
            Ok(Inbound::Event(frame)) => {
                if self.config.debug {
                    debug!("<- {} ({} bytes)", frame.event, message.len());
                }
                self.subscribers.dispatch(&frame.event, &frame.data);
            }
            Err(e) => {
                debug!("Undecodable frame: {}", e);
                let raw = match message {
                    WsMessage::Text(text) => Value::String(text),
                    WsMessage::Binary(bytes) => json!(bytes),
                };
                self.subscribers.dispatch(events::MESSAGE, &raw);
            }
        }
    }
}
