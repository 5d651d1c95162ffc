//! Liveness Tracker
//!
//! Records when a heartbeat ping went out unanswered and when the last ack
//! arrived. A connection is considered dead once a ping has waited longer
//! than the configured timeout for its ack, even if the transport still
//! looks open.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Tracks heartbeat acks to detect silently-dead connections
///
/// Timestamps are stored as milliseconds since an internal epoch, offset by
/// one so that `0` can mean "never".
pub struct PongTracker {
    epoch: Instant,
    last_ping_sent_ms: AtomicU64,
    last_ack_ms: AtomicU64,
    timeout: Duration,
}

impl PongTracker {
    pub fn new(timeout: Duration) -> Self {
        Self {
            epoch: Instant::now(),
            last_ping_sent_ms: AtomicU64::new(0),
            last_ack_ms: AtomicU64::new(0),
            timeout,
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64 + 1
    }

    /// Stamp an outgoing ping
    ///
    /// While an earlier ping is still unanswered its stamp is kept, so the
    /// timeout runs from the oldest ping without an ack.
    pub fn record_ping_sent(&self) {
        if self.awaiting_ack() {
            return;
        }
        self.last_ping_sent_ms.store(self.now_ms(), Ordering::Release);
    }

    pub fn record_ack(&self) {
        self.last_ack_ms.store(self.now_ms(), Ordering::Release);
    }

    /// Start a fresh window: no ping outstanding, acked right now
    pub fn reset(&self) {
        self.last_ping_sent_ms.store(0, Ordering::Release);
        self.record_ack();
    }

    /// A ping went out and no ack has arrived since
    pub fn awaiting_ack(&self) -> bool {
        let ping_ms = self.last_ping_sent_ms.load(Ordering::Acquire);
        let ack_ms = self.last_ack_ms.load(Ordering::Acquire);
        ping_ms != 0 && ack_ms < ping_ms
    }

    /// False once an unanswered ping is older than the timeout
    pub fn is_healthy(&self) -> bool {
        if !self.awaiting_ack() {
            return true;
        }
        match self.time_since_last_ping() {
            Some(elapsed) => elapsed < self.timeout,
            None => true,
        }
    }

    /// Instant at which the outstanding ping times out, if one is outstanding
    pub fn deadline(&self) -> Option<Instant> {
        if !self.awaiting_ack() {
            return None;
        }
        let ping_ms = self.last_ping_sent_ms.load(Ordering::Acquire);
        self.epoch
            .checked_add(Duration::from_millis(ping_ms - 1))?
            .checked_add(self.timeout)
    }

    pub fn time_since_last_ack(&self) -> Option<Duration> {
        Self::since(self.last_ack_ms.load(Ordering::Acquire), self.now_ms())
    }

    pub fn time_since_last_ping(&self) -> Option<Duration> {
        Self::since(self.last_ping_sent_ms.load(Ordering::Acquire), self.now_ms())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn since(stamp_ms: u64, now_ms: u64) -> Option<Duration> {
        (stamp_ms != 0).then(|| Duration::from_millis(now_ms.saturating_sub(stamp_ms)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_quiet_connection_stays_healthy_without_pings() {
        let tracker = PongTracker::new(Duration::from_secs(1));
        tracker.reset();

        // No ping outstanding, so silence alone is not a timeout
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(tracker.is_healthy());
        assert!(tracker.deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_ping_times_out() {
        let tracker = PongTracker::new(Duration::from_secs(3));
        tracker.reset();

        tokio::time::advance(Duration::from_secs(2)).await;
        tracker.record_ping_sent();
        assert!(tracker.awaiting_ack());
        assert_eq!(tracker.time_since_last_ping(), Some(Duration::ZERO));
        assert_eq!(
            tracker.deadline(),
            Some(Instant::now() + Duration::from_secs(3))
        );

        tokio::time::advance(Duration::from_millis(2999)).await;
        assert!(tracker.is_healthy());
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(!tracker.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_later_pings_keep_oldest_stamp() {
        let tracker = PongTracker::new(Duration::from_secs(3));
        tracker.reset();

        tokio::time::advance(Duration::from_secs(1)).await;
        tracker.record_ping_sent();
        tokio::time::advance(Duration::from_secs(1)).await;
        tracker.record_ping_sent();
        tokio::time::advance(Duration::from_secs(1)).await;
        tracker.record_ping_sent();

        assert_eq!(tracker.time_since_last_ping(), Some(Duration::from_secs(2)));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!tracker.is_healthy());
    }

    #[tokio::test(start_paused = true)]
    async fn test_ack_answers_outstanding_ping() {
        let tracker = PongTracker::new(Duration::from_secs(1));
        tracker.reset();

        tokio::time::advance(Duration::from_secs(1)).await;
        tracker.record_ping_sent();
        tokio::time::advance(Duration::from_millis(900)).await;
        tracker.record_ack();

        assert!(!tracker.awaiting_ack());
        assert!(tracker.deadline().is_none());
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(tracker.is_healthy());
        assert_eq!(tracker.time_since_last_ack(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_never_pinged() {
        let tracker = PongTracker::new(Duration::from_millis(10));
        assert!(tracker.is_healthy());
        assert!(!tracker.awaiting_ack());
        assert!(tracker.time_since_last_ack().is_none());
        assert!(tracker.time_since_last_ping().is_none());
    }
}
