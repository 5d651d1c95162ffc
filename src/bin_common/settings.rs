//! Combined settings file for binaries
//!
//! ```yaml
//! http:
//!   base_url: https://jsonplaceholder.typicode.com
//!   cache:
//!     max_age_secs: 60
//! socket:
//!   url: wss://ws.postman-echo.com/raw
//! ```

use hyperfetch::{ClientSettings, SettingsError};
use hypersockets::{HyperSocketError, SocketSettings};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppSettingsError {
    #[error("Failed to load settings file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid http settings: {0}")]
    Http(#[from] SettingsError),

    #[error("Invalid socket settings: {0}")]
    Socket(#[from] HyperSocketError),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppSettings {
    #[serde(default)]
    pub http: ClientSettings,
    #[serde(default)]
    pub socket: Option<SocketSettings>,
}

impl AppSettings {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppSettingsError> {
        let yaml_content = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml_content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, AppSettingsError> {
        let settings: AppSettings = serde_yaml::from_str(yaml)?;
        settings.http.validate()?;
        if let Some(ref socket) = settings.socket {
            socket.validate()?;
        }
        Ok(settings)
    }
}
