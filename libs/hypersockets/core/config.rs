//! Session configuration
//!
//! [`SocketConfig`] is the immutable runtime value a session is built from.
//! [`SocketSettings`] is its YAML-loadable mirror.

use crate::traits::{ConnectRequest, ExponentialBackoff, HyperSocketError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Heartbeat timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    /// Time between pings
    pub interval: Duration,
    /// Connection is dead when no ack arrives for this long
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(25),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Reconnect backoff: `base_delay * 2^attempt`, capped at `max_delay`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// `None` retries forever
    pub max_attempts: Option<usize>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: Some(5),
        }
    }
}

impl ReconnectConfig {
    pub fn strategy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.base_delay, self.max_delay, self.max_attempts)
    }
}

/// Configuration for a [`SocketSession`](crate::core::session::SocketSession)
#[derive(Debug, Clone)]
pub struct SocketConfig {
    pub url: String,
    /// Sent as `Authorization: Bearer <token>`
    pub token: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    /// Per-frame logging
    pub debug: bool,
    /// `None` disables the heartbeat
    pub heartbeat: Option<HeartbeatConfig>,
    pub reconnect: ReconnectConfig,
    pub connect_timeout: Duration,
}

impl SocketConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            headers: BTreeMap::new(),
            query: BTreeMap::new(),
            debug: false,
            heartbeat: Some(HeartbeatConfig::default()),
            reconnect: ReconnectConfig::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.heartbeat = Some(HeartbeatConfig { interval, timeout });
        self
    }

    pub fn without_heartbeat(mut self) -> Self {
        self.heartbeat = None;
        self
    }

    pub fn with_reconnect(mut self, base_delay: Duration, max_delay: Duration, max_attempts: Option<usize>) -> Self {
        self.reconnect = ReconnectConfig {
            base_delay,
            max_delay,
            max_attempts,
        };
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Build the handshake request: query appended to the URL, token merged
    /// into the headers. An explicit `Authorization` header wins over the token.
    pub fn connect_request(&self) -> Result<ConnectRequest> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| HyperSocketError::Configuration(format!("invalid url {}: {}", self.url, e)))?;

        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(HyperSocketError::Configuration(format!(
                "url scheme must be ws or wss, got {}",
                url.scheme()
            )));
        }

        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in &self.query {
                pairs.append_pair(name, value);
            }
        }

        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        let has_auth = headers
            .iter()
            .any(|(name, _)| name.eq_ignore_ascii_case("authorization"));
        if let (Some(token), false) = (&self.token, has_auth) {
            headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }

        Ok(ConnectRequest { url, headers })
    }
}

/// YAML form of [`SocketConfig`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketSettings {
    pub url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    #[serde(default)]
    pub debug: bool,
    /// `0` disables the heartbeat
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    /// Omit or set to `null` to retry forever
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: Option<usize>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_heartbeat_interval_ms() -> u64 {
    25_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    60_000
}

fn default_reconnect_base_ms() -> u64 {
    1_000
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_max_reconnect_attempts() -> Option<usize> {
    Some(5)
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl SocketSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml_content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: SocketSettings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.heartbeat_interval_ms > 0 && self.heartbeat_timeout_ms < self.heartbeat_interval_ms {
            return Err(HyperSocketError::Configuration(
                "heartbeat_timeout_ms must be >= heartbeat_interval_ms".to_string(),
            ));
        }

        if self.reconnect_base_ms == 0 {
            return Err(HyperSocketError::Configuration(
                "reconnect_base_ms must be greater than 0".to_string(),
            ));
        }

        if self.reconnect_max_ms < self.reconnect_base_ms {
            return Err(HyperSocketError::Configuration(
                "reconnect_max_ms must be >= reconnect_base_ms".to_string(),
            ));
        }

        if self.connect_timeout_ms == 0 {
            return Err(HyperSocketError::Configuration(
                "connect_timeout_ms must be greater than 0".to_string(),
            ));
        }

        let config = self.clone().into_config();
        config.connect_request().map(|_| ())
    }

    pub fn into_config(self) -> SocketConfig {
        let heartbeat = (self.heartbeat_interval_ms > 0).then(|| HeartbeatConfig {
            interval: Duration::from_millis(self.heartbeat_interval_ms),
            timeout: Duration::from_millis(self.heartbeat_timeout_ms),
        });

        SocketConfig {
            url: self.url,
            token: self.token,
            headers: self.headers,
            query: self.query,
            debug: self.debug,
            heartbeat,
            reconnect: ReconnectConfig {
                base_delay: Duration::from_millis(self.reconnect_base_ms),
                max_delay: Duration::from_millis(self.reconnect_max_ms),
                max_attempts: self.max_reconnect_attempts,
            },
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}
