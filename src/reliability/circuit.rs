use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct CircuitConfig {
    pub failure_threshold: u32,
    pub base_retry_delay: Duration,
    pub max_retry_delay: Duration,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            base_retry_delay: Duration::from_secs(5),
            max_retry_delay: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitSnapshot {
    pub consecutive_failures: u32,
    pub open_until: Option<Instant>,
}

#[derive(Debug, Default)]
struct BreakerState {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Two-state breaker: closed, or open until a deadline.
///
/// There is no explicit half-open state. Once the deadline passes the next
/// send is the probe, and its outcome is reported like any other.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitConfig,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitConfig) -> Self {
        Self {
            config,
            state: Mutex::new(BreakerState::default()),
        }
    }

    pub fn config(&self) -> &CircuitConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.is_open_at(Instant::now())
    }

    pub fn is_open_at(&self, now: Instant) -> bool {
        self.state
            .lock()
            .open_until
            .is_some_and(|until| now < until)
    }

    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.consecutive_failures = 0;
        state.open_until = None;
    }

    pub fn record_failure(&self) -> Option<Duration> {
        self.record_failure_at(Instant::now())
    }

    /// Counts a failed send; returns how long the circuit is now open for,
    /// if the threshold has been reached.
    pub fn record_failure_at(&self, now: Instant) -> Option<Duration> {
        let mut state = self.state.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);

        if state.consecutive_failures < self.config.failure_threshold {
            return None;
        }

        let delay = self.backoff_delay(state.consecutive_failures);
        state.open_until = Some(now + delay);
        Some(delay)
    }

    /// `min(max, base * 2^(failures - threshold))`
    pub fn backoff_delay(&self, consecutive_failures: u32) -> Duration {
        let exponent = consecutive_failures.saturating_sub(self.config.failure_threshold);
        let factor = 1_u32.checked_shl(exponent).unwrap_or(u32::MAX);

        self.config
            .base_retry_delay
            .checked_mul(factor)
            .unwrap_or(self.config.max_retry_delay)
            .min(self.config.max_retry_delay)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.state.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> CircuitSnapshot {
        let state = self.state.lock();
        CircuitSnapshot {
            consecutive_failures: state.consecutive_failures,
            open_until: state.open_until,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker() -> CircuitBreaker {
        CircuitBreaker::new(CircuitConfig {
            failure_threshold: 3,
            base_retry_delay: Duration::from_secs(5),
            max_retry_delay: Duration::from_secs(120),
        })
    }

    #[test]
    fn test_stays_closed_below_threshold() {
        let breaker = breaker();
        let now = Instant::now();
        assert_eq!(breaker.record_failure_at(now), None);
        assert_eq!(breaker.record_failure_at(now), None);
        assert!(!breaker.is_open_at(now));
        assert_eq!(breaker.consecutive_failures(), 2);
    }

    #[test]
    fn test_opens_for_base_delay_at_threshold() {
        let breaker = breaker();
        let now = Instant::now();
        breaker.record_failure_at(now);
        breaker.record_failure_at(now);

        assert_eq!(breaker.record_failure_at(now), Some(Duration::from_secs(5)));
        assert!(breaker.is_open_at(now));
        assert!(breaker.is_open_at(now + Duration::from_millis(4_999)));
        assert!(!breaker.is_open_at(now + Duration::from_secs(5)));
    }

    #[test]
    fn test_failed_probe_doubles_delay_up_to_cap() {
        let breaker = breaker();
        let now = Instant::now();
        for _ in 0..3 {
            breaker.record_failure_at(now);
        }

        assert_eq!(breaker.record_failure_at(now), Some(Duration::from_secs(10)));
        assert_eq!(breaker.record_failure_at(now), Some(Duration::from_secs(20)));
        assert_eq!(breaker.record_failure_at(now), Some(Duration::from_secs(40)));
        assert_eq!(breaker.record_failure_at(now), Some(Duration::from_secs(80)));
        assert_eq!(breaker.record_failure_at(now), Some(Duration::from_secs(120)));
        assert_eq!(breaker.record_failure_at(now), Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_backoff_saturates_on_huge_failure_counts() {
        let breaker = breaker();
        assert_eq!(breaker.backoff_delay(u32::MAX), Duration::from_secs(120));
        assert_eq!(breaker.backoff_delay(40), Duration::from_secs(120));
    }

    #[test]
    fn test_success_resets_breaker() {
        let breaker = breaker();
        let now = Instant::now();
        for _ in 0..4 {
            breaker.record_failure_at(now);
        }
        breaker.record_success();

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.consecutive_failures, 0);
        assert_eq!(snapshot.open_until, None);
        assert!(!breaker.is_open_at(now));
    }
}
