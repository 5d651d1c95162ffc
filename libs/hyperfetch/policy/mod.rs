//! Per-request policies: status classification and retry-with-backoff

pub mod classifier;
pub mod retry;

pub use classifier::{StatusCategory, StatusClassifier};
pub use retry::{RetryDecision, RetryEvaluator, RetryPolicy, JITTER_FACTOR};
