use thiserror::Error;

/// Boxed error returned by subscriber handlers
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for hypersockets
#[derive(Error, Debug)]
pub enum HyperSocketError {
    /// WebSocket transport error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Handshake did not complete
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Connection closed unexpectedly
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// No liveness ack arrived within the heartbeat timeout
    #[error("No heartbeat ack for {0:?}")]
    HeartbeatTimeout(std::time::Duration),

    /// Frame could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Settings file could not be read
    #[error("Failed to load settings file: {0}")]
    SettingsFile(#[from] std::io::Error),

    /// Settings YAML could not be parsed
    #[error("Failed to parse YAML: {0}")]
    SettingsYaml(#[from] serde_yaml::Error),

    /// Reconnection failed
    #[error("Reconnection failed after {attempts} attempts: {reason}")]
    ReconnectionFailed { attempts: usize, reason: String },

    /// Timeout error
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Session was disposed
    #[error("Session disposed")]
    Disposed,

    /// Operation not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type for hypersockets operations
pub type Result<T> = std::result::Result<T, HyperSocketError>;
