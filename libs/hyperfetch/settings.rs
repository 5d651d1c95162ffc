//! Declarative client settings loaded from YAML
//!
//! Only the data-shaped part of [`ClientConfig`] lives here. Callbacks,
//! interceptors and custom retry evaluators are attached in code after
//! [`ClientSettings::into_config`].

use crate::cache::CachePolicy;
use crate::core::config::ClientConfig;
use crate::core::request::Headers;
use crate::error::ErrorKind;
use crate::policy::{RetryPolicy, StatusClassifier};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to load settings file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid settings: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, SettingsError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub headers: Headers,
    /// Per-call timeout; `0` disables it
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub classifier: Option<ClassifierSettings>,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            headers: Headers::new(),
            timeout_secs: default_timeout_secs(),
            debug: false,
            cache: CacheSettings::default(),
            retry: RetrySettings::default(),
            classifier: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub max_age_secs: u64,
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub force_refresh: bool,
}

fn default_capacity() -> usize {
    100
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            max_age_secs: 0,
            capacity: default_capacity(),
            force_refresh: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default)]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default)]
    pub retry_on_timeout: bool,
    #[serde(default)]
    pub retry_status_codes: Vec<u16>,
    #[serde(default)]
    pub retry_on: Vec<ErrorKind>,
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            retry_on_timeout: false,
            retry_status_codes: Vec::new(),
            retry_on: Vec::new(),
        }
    }
}

/// Replacement code sets; an omitted set keeps its HTTP default
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierSettings {
    pub success: Option<Vec<u16>>,
    pub redirect: Option<Vec<u16>>,
    pub client_error: Option<Vec<u16>>,
    pub server_error: Option<Vec<u16>>,
    pub error: Option<Vec<u16>>,
}

impl ClientSettings {
    /// Load and validate settings from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let yaml_content = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml_content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let settings: ClientSettings = serde_yaml::from_str(yaml)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(ref base_url) = self.base_url {
            url::Url::parse(base_url).map_err(|e| {
                SettingsError::ValidationError(format!("base_url {} is not a valid URL: {}", base_url, e))
            })?;
        }

        if self.retry.base_delay_ms == 0 && self.retry.max_attempts > 1 {
            return Err(SettingsError::ValidationError(
                "retry.base_delay_ms must be greater than 0 when retries are enabled".to_string(),
            ));
        }

        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(SettingsError::ValidationError(
                "retry.max_delay_ms must be >= retry.base_delay_ms".to_string(),
            ));
        }

        if let Some(ref classifier) = self.classifier {
            let all = [
                &classifier.success,
                &classifier.redirect,
                &classifier.client_error,
                &classifier.server_error,
                &classifier.error,
            ];
            if let Some(code) = all
                .iter()
                .filter_map(|set| set.as_ref())
                .flatten()
                .find(|code| !(100..=599).contains(*code))
            {
                return Err(SettingsError::ValidationError(format!(
                    "classifier status code {} is outside 100..=599",
                    code
                )));
            }
        }

        Ok(())
    }

    pub fn into_config(self) -> ClientConfig {
        let mut config = ClientConfig::new()
            .with_headers(self.headers)
            .with_timeout((self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)))
            .with_debug(self.debug)
            .with_cache(
                CachePolicy::with_max_age(Duration::from_secs(self.cache.max_age_secs))
                    .capacity(self.cache.capacity)
                    .force_refresh(self.cache.force_refresh),
            )
            .with_retry(
                RetryPolicy::none()
                    .with_max_attempts(self.retry.max_attempts)
                    .with_delays(
                        Duration::from_millis(self.retry.base_delay_ms),
                        Duration::from_millis(self.retry.max_delay_ms),
                    )
                    .with_retry_on_timeout(self.retry.retry_on_timeout)
                    .with_status_codes(self.retry.retry_status_codes)
                    .with_error_kinds(self.retry.retry_on),
            );

        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }

        if let Some(classifier) = self.classifier {
            let mut built = StatusClassifier::default();
            if let Some(codes) = classifier.success {
                built = built.with_success_codes(codes);
            }
            if let Some(codes) = classifier.redirect {
                built = built.with_redirect_codes(codes);
            }
            if let Some(codes) = classifier.client_error {
                built = built.with_client_error_codes(codes);
            }
            if let Some(codes) = classifier.server_error {
                built = built.with_server_error_codes(codes);
            }
            if let Some(codes) = classifier.error {
                built = built.with_error_codes(codes);
            }
            config = config.with_classifier(built);
        }

        config
    }
}
