//! Retry policy: decides backoff delays and the attempt budget.

use std::time::Duration;

/// Bounded exponential backoff for failed model invocations.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,

    /// Upper bound for any single delay.
    pub max_delay: Duration,

    /// Total attempts, the first one included.
    pub max_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            max_retries: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay after the failed attempt with 0-based index `attempt`:
    /// `min(base_delay * 2^attempt, max_delay)`.
    ///
    /// With base=2s, max=60s: 2s, 4s, 8s, 16s, 32s, 60s, 60s, ...
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay.as_secs_f64();
        let delay = base * 2f64.powi(attempt.min(63) as i32);
        Duration::from_secs_f64(delay.min(self.max_delay.as_secs_f64()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_deployment_defaults() {
        let p = RetryPolicy::default();
        assert_eq!(p.base_delay, Duration::from_secs(2));
        assert_eq!(p.max_delay, Duration::from_secs(60));
        assert_eq!(p.max_retries, 5);
    }

    #[test]
    fn delays_double_from_base() {
        let p = RetryPolicy::default();
        assert_eq!(p.next_delay(0), Duration::from_secs(2));
        assert_eq!(p.next_delay(1), Duration::from_secs(4));
        assert_eq!(p.next_delay(2), Duration::from_secs(8));
        assert_eq!(p.next_delay(3), Duration::from_secs(16));
    }

    #[test]
    fn delays_cap_at_max_delay() {
        let p = RetryPolicy::default();
        assert_eq!(p.next_delay(5), Duration::from_secs(60));
        assert_eq!(p.next_delay(30), Duration::from_secs(60));
        // 極端な指数でもオーバーフローしない
        assert_eq!(p.next_delay(u32::MAX), Duration::from_secs(60));
    }
}
