//! HyperClient probe
//!
//! Fetches each path given on the command line through the request pipeline
//! (twice, so the cache is visible), then optionally holds the configured
//! socket session open for a few seconds and logs its lifecycle.
//!
//! Usage:
//!   HYPERCLIENT_CONFIG_PATH=config/client.yaml cargo run --bin hyperclient-probe -- /todos/1 /users/1

use anyhow::{Context, Result};
use hyperclient::bin_common::{init_tracing, load_config_from_env, parse_args, AppSettings, ConfigType};
use hyperfetch::{CacheStore, ClientConfig, HttpClient};
use hypersockets::{events, SessionEvent, SocketSession};
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

const SOCKET_WATCH: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("info");

    let config_path = load_config_from_env(ConfigType::Client);
    let settings = if config_path.exists() {
        AppSettings::load(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?
    } else {
        warn!("{} not found, using defaults", config_path.display());
        AppSettings::default()
    };

    let paths = parse_args();
    if !paths.is_empty() {
        probe_http(settings.http.into_config(), &paths).await?;
    }

    match settings.socket {
        Some(socket) => probe_socket(SocketSession::new(socket.into_config())).await?,
        None => info!("No socket section configured, skipping socket probe"),
    }

    Ok(())
}

async fn probe_http(config: ClientConfig, paths: &[String]) -> Result<()> {
    let client = HttpClient::new(config)?;

    for path in paths {
        for round in 1..=2 {
            let envelope = client.get(path.as_str()).await?;
            let meta = envelope.meta();
            info!(
                "GET {} (round {}): status={:?} success={} attempts={} cached={} in {:?}",
                path, round, meta.status, meta.success, meta.attempts, meta.from_cache, meta.duration
            );
            if let Some(error) = envelope.error() {
                warn!("  {}", error);
            }
        }
    }

    let expired = client.cleanup_cache().await;
    info!("Cache: {} live entries, {} expired removed", client.cache().size().await, expired);
    client.dispose().await;
    Ok(())
}

async fn probe_socket(session: SocketSession) -> Result<()> {
    info!("Connecting to {}", session.config().url);

    session.on(events::MESSAGE, |data| {
        info!("  <- raw {}", data);
        Ok(())
    });
    session.emit("hello", json!({ "from": "hyperclient-probe" }))?;
    session.connect()?;

    let events = session.events();
    let deadline = tokio::time::Instant::now() + SOCKET_WATCH;
    while tokio::time::Instant::now() < deadline {
        for event in events.try_iter() {
            match event {
                SessionEvent::Error(message) => warn!("  session error: {}", message),
                other => info!("  session event: {:?}", other),
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    info!("Socket metrics: {:?}", session.metrics());
    session.close().await;
    Ok(())
}
