//! End-to-end tests over a real local WebSocket server

mod common;

use common::{eventually, MockWsServer};
use hypersockets::{ConnectionState, SessionEvent, SocketConfig, SocketSession};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_echo_roundtrip_with_heartbeat() {
    verbose_println!("Testing session against a local echo server...");

    let server = MockWsServer::start().await;
    let session = SocketSession::new(
        SocketConfig::new(server.ws_url())
            .with_token("secret")
            .with_heartbeat(Duration::from_millis(100), Duration::from_secs(1)),
    );

    let echoed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&echoed);
    session.on("chat", move |data| {
        sink.lock().push(data.clone());
        Ok(())
    });

    session.emit("chat", json!({"text": "queued before connect"})).unwrap();
    session.connect().unwrap();
    assert!(session.wait_for_state(ConnectionState::Connected, Duration::from_secs(5)).await);

    session.emit("chat", json!({"text": "hello"})).unwrap();
    assert!(eventually(Duration::from_secs(5), || echoed.lock().len() == 2).await);
    assert_eq!(
        *echoed.lock(),
        vec![json!({"text": "queued before connect"}), json!({"text": "hello"})]
    );

    // Several heartbeats answered by the server; still the first connection
    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(session.is_connected());
    assert_eq!(session.metrics().reconnect_count, 0);
    verbose_println!("  metrics: {:?}", session.metrics());

    session.close().await;
    assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_server_shutdown_triggers_reconnect() {
    let server = MockWsServer::start().await;
    let session = SocketSession::new(
        SocketConfig::new(server.ws_url())
            .without_heartbeat()
            .with_reconnect(Duration::from_millis(50), Duration::from_millis(200), Some(2)),
    );
    let events = session.events();

    session.connect().unwrap();
    assert!(session.wait_for_state(ConnectionState::Connected, Duration::from_secs(5)).await);

    server.shutdown();
    drop(server);

    let mut seen = Vec::new();
    let gave_up = eventually(Duration::from_secs(10), || {
        seen.extend(events.try_iter());
        seen.iter()
            .any(|event| matches!(event, SessionEvent::ReconnectFailed { .. }))
    })
    .await;

    verbose_println!("  events: {:?}", seen);
    assert!(gave_up);
    assert!(matches!(seen.first(), Some(SessionEvent::Connected)));
    assert!(seen.iter().any(|event| matches!(event, SessionEvent::Disconnected(_))));
}
