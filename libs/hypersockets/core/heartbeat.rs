//! Heartbeat ticker
//!
//! A dedicated Tokio task emits the ping payload at a fixed interval into an
//! unbounded channel. The session loop selects on that channel alongside the
//! socket, so pings never wait behind message processing and the loop stays
//! the single writer on the connection.
//!
//! ```text
//! Heartbeat Task ──(every interval)──> channel ──> session loop ──> socket
//! ```
//!
//! The heartbeat is stopped before any reconnect transition starts.

use crate::traits::WsMessage;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

/// Handle to a running heartbeat task
pub struct Heartbeat {
    handle: JoinHandle<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    ticks: mpsc::UnboundedReceiver<WsMessage>,
}

impl Heartbeat {
    /// Next ping payload; `None` once the task has stopped
    pub async fn tick(&mut self) -> Option<WsMessage> {
        self.ticks.recv().await
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.handle).await;
        debug!("Heartbeat stopped");
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn heartbeat_task(
    interval: Duration,
    payload: WsMessage,
    heartbeat_tx: mpsc::UnboundedSender<WsMessage>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    // Skip the first immediate tick - wait for the first interval
    ticker.tick().await;
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    debug!("Heartbeat task started with interval: {:?}", interval);

    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            _ = ticker.tick() => {
                if heartbeat_tx.send(payload.clone()).is_err() {
                    break;
                }
            }
        }
    }

    debug!("Heartbeat task exiting");
}

/// Spawn a heartbeat task sending `payload` every `interval`
pub fn spawn_heartbeat(interval: Duration, payload: WsMessage) -> Heartbeat {
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let (heartbeat_tx, ticks) = mpsc::unbounded_channel();

    let handle = tokio::spawn(heartbeat_task(interval, payload, heartbeat_tx, shutdown_rx));

    Heartbeat {
        handle,
        shutdown_tx: Some(shutdown_tx),
        ticks,
    }
}
