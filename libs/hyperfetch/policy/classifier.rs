//! Status code classification
//!
//! Every success/error verdict in the pipeline goes through a
//! [`StatusClassifier`]. The defaults follow HTTP conventions, but each set
//! is replaceable so that services which report failures inside a `200`
//! (or success inside a `202`/`404`) can be modelled directly.

use crate::error::ErrorKind;
use std::collections::BTreeSet;

/// Verdict for a single status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    Success,
    Redirect,
    Error,
    Unknown,
}

/// Configurable mapping from status code to verdict
///
/// Error sets take precedence over the success set: a code listed both as
/// success and as error is an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusClassifier {
    success: BTreeSet<u16>,
    redirect: BTreeSet<u16>,
    client_error: BTreeSet<u16>,
    server_error: BTreeSet<u16>,
    error: BTreeSet<u16>,
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self {
            success: (200..=299).collect(),
            redirect: (300..=399).collect(),
            client_error: (400..=499).collect(),
            server_error: (500..=599).collect(),
            error: BTreeSet::new(),
        }
    }
}

impl StatusClassifier {
    /// Classifier with every set empty (every code is `Unknown`)
    pub fn empty() -> Self {
        Self {
            success: BTreeSet::new(),
            redirect: BTreeSet::new(),
            client_error: BTreeSet::new(),
            server_error: BTreeSet::new(),
            error: BTreeSet::new(),
        }
    }

    pub fn with_success_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.success = codes.into_iter().collect();
        self
    }

    pub fn with_redirect_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.redirect = codes.into_iter().collect();
        self
    }

    pub fn with_client_error_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.client_error = codes.into_iter().collect();
        self
    }

    pub fn with_server_error_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.server_error = codes.into_iter().collect();
        self
    }

    /// Codes that are errors without being modelled as client or server errors
    pub fn with_error_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.error = codes.into_iter().collect();
        self
    }

    pub fn is_client_error(&self, code: u16) -> bool {
        self.client_error.contains(&code)
    }

    pub fn is_server_error(&self, code: u16) -> bool {
        self.server_error.contains(&code)
    }

    pub fn is_error(&self, code: u16) -> bool {
        self.is_client_error(code) || self.is_server_error(code) || self.error.contains(&code)
    }

    pub fn is_success(&self, code: u16) -> bool {
        self.success.contains(&code) && !self.is_error(code)
    }

    pub fn is_redirect(&self, code: u16) -> bool {
        self.redirect.contains(&code) && !self.is_error(code)
    }

    pub fn category(&self, code: u16) -> StatusCategory {
        if self.is_error(code) {
            StatusCategory::Error
        } else if self.success.contains(&code) {
            StatusCategory::Success
        } else if self.redirect.contains(&code) {
            StatusCategory::Redirect
        } else {
            StatusCategory::Unknown
        }
    }

    /// Error kind for a code this classifier considers an error
    pub fn error_kind(&self, code: u16) -> ErrorKind {
        if self.is_client_error(code) {
            if code == 429 {
                ErrorKind::RateLimited
            } else {
                ErrorKind::ClientError
            }
        } else if self.is_server_error(code) {
            ErrorKind::ServerError
        } else {
            ErrorKind::HttpStatus
        }
    }
}
