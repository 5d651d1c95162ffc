use crate::error::{ErrorKind, RequestError};
use rand::Rng;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Symmetric jitter applied to every computed delay (±25%)
pub const JITTER_FACTOR: f64 = 0.25;

/// Custom retry decision: `(error, attempt) -> retry?`
///
/// When configured, its answer is final and none of the built-in rules run.
pub type RetryEvaluator = Arc<dyn Fn(&RequestError, u32) -> bool + Send + Sync>;

/// Outcome of evaluating a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for the delay, then run the next attempt
    Retry(Duration),
    /// Surface the error
    Stop,
}

/// Retry-with-backoff policy
///
/// `max_attempts` counts total attempts: with `3` a request is tried at
/// most three times. `0` and `1` both mean "initial try only".
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub retry_on_timeout: bool,
    pub retry_status_codes: HashSet<u16>,
    pub retry_on: HashSet<ErrorKind>,
    evaluator: Option<RetryEvaluator>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            retry_on_timeout: true,
            retry_status_codes: [408, 429, 500, 502, 503, 504].into_iter().collect(),
            retry_on: [ErrorKind::Network].into_iter().collect(),
            evaluator: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("retry_on_timeout", &self.retry_on_timeout)
            .field("retry_status_codes", &self.retry_status_codes)
            .field("retry_on", &self.retry_on)
            .field("evaluator", &self.evaluator.is_some())
            .finish()
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            retry_on_timeout: false,
            retry_status_codes: HashSet::new(),
            retry_on: HashSet::new(),
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn with_retry_on_timeout(mut self, enabled: bool) -> Self {
        self.retry_on_timeout = enabled;
        self
    }

    pub fn with_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retry_status_codes = codes.into_iter().collect();
        self
    }

    pub fn with_error_kinds(mut self, kinds: impl IntoIterator<Item = ErrorKind>) -> Self {
        self.retry_on = kinds.into_iter().collect();
        self
    }

    pub fn with_evaluator<F>(mut self, evaluator: F) -> Self
    where
        F: Fn(&RequestError, u32) -> bool + Send + Sync + 'static,
    {
        self.evaluator = Some(Arc::new(evaluator));
        self
    }

    pub fn has_evaluator(&self) -> bool {
        self.evaluator.is_some()
    }

    /// Decide whether attempt `attempt` (1-based) should be followed by another
    pub fn should_retry(&self, error: &RequestError, attempt: u32) -> bool {
        if let Some(ref evaluator) = self.evaluator {
            return evaluator(error, attempt);
        }

        if attempt >= self.max_attempts {
            return false;
        }

        if let Some(status) = error.status_code() {
            if self.retry_status_codes.contains(&status) {
                return true;
            }
        }

        if self.retry_on.contains(&error.kind()) {
            return true;
        }

        self.retry_on_timeout && error.is_timeout()
    }

    /// Delay before the attempt following `attempt`, with a random jitter draw
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let draw = rand::thread_rng().gen_range(-1.0..=1.0);
        self.delay_with_jitter(attempt, draw)
    }

    /// Delay before the attempt following `attempt`
    ///
    /// `draw` is the jitter position in `[-1, 1]`, scaled by [`JITTER_FACTOR`].
    /// The result is always within `[base_delay, max(base_delay, max_delay)]`.
    pub fn delay_with_jitter(&self, attempt: u32, draw: f64) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let ceiling = self.max_delay.max(self.base_delay).as_secs_f64();

        let exponent = attempt.saturating_sub(1).min(62) as i32;
        let raw = base * 2f64.powi(exponent);
        let jittered = raw * (1.0 + JITTER_FACTOR * draw.clamp(-1.0, 1.0));

        Duration::from_secs_f64(jittered.clamp(base, ceiling))
    }

    pub fn decide(&self, error: &RequestError, attempt: u32) -> RetryDecision {
        if self.should_retry(error, attempt) {
            RetryDecision::Retry(self.delay_for(attempt))
        } else {
            RetryDecision::Stop
        }
    }
}
