//! Bounded exponential backoff for stream reconnection.

use std::time::Duration;

/// Tracks consecutive connection failures and yields the backoff delay for
/// each retry: `2^attempt` seconds for attempts 1..=max. Once the attempts
/// are exhausted the failure is terminal until [`reset`](Self::reset) --
/// which happens on any successful connection or an explicit user connect.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    attempts: u32,
    max_attempts: u32,
}

impl ReconnectPolicy {
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
        }
    }

    /// Records one failure. Returns the delay before the next attempt, or
    /// `None` when no further automatic reconnection may happen.
    pub fn record_failure(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(Duration::from_secs(1 << self.attempts))
    }

    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ATTEMPTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_per_attempt() {
        let mut policy = ReconnectPolicy::default();
        assert_eq!(policy.record_failure(), Some(Duration::from_secs(2)));
        assert_eq!(policy.record_failure(), Some(Duration::from_secs(4)));
        assert_eq!(policy.record_failure(), Some(Duration::from_secs(8)));
    }

    #[test]
    fn fourth_failure_is_terminal() {
        let mut policy = ReconnectPolicy::default();
        for _ in 0..3 {
            assert!(policy.record_failure().is_some());
        }
        assert_eq!(policy.record_failure(), None);
        assert!(policy.exhausted());
        // Still terminal on repeat
        assert_eq!(policy.record_failure(), None);
    }

    #[test]
    fn reset_restores_the_full_budget() {
        let mut policy = ReconnectPolicy::default();
        for _ in 0..3 {
            policy.record_failure();
        }
        policy.reset();
        assert_eq!(policy.attempts(), 0);
        assert_eq!(policy.record_failure(), Some(Duration::from_secs(2)));
    }
}
