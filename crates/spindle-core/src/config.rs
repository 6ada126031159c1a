//! Engine configuration.
//!
//! Defaults mirror the original deployment's environment (2 s base delay,
//! 60 s max delay, 5 retries, 900 s report timeout, 10 s poll delay).

use std::time::Duration;

use tracing::warn;

use crate::retry::RetryPolicy;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Backoff base for model-invocation retries.
    pub base_delay: Duration,

    /// Backoff cap.
    pub max_delay: Duration,

    /// Attempts per task, the first one included.
    pub max_retries: u32,

    /// After this much time since intake the poller finalizes with partial
    /// results.
    pub report_timeout: Duration,

    /// Delay on each requeued checker token.
    pub poll_delay: Duration,

    /// Queue deliveries per message before it is dead-lettered.
    pub max_receives: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            max_retries: 5,
            report_timeout: Duration::from_secs(900),
            poll_delay: Duration::from_secs(10),
            max_receives: 3,
        }
    }
}

impl EngineConfig {
    /// Read overrides from `SPINDLE_*` environment variables; anything
    /// absent or unparsable keeps its default.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            base_delay: env_secs("SPINDLE_BASE_DELAY_SECONDS", d.base_delay),
            max_delay: env_secs("SPINDLE_MAX_DELAY_SECONDS", d.max_delay),
            max_retries: env_u32("SPINDLE_MAX_RETRIES", d.max_retries),
            report_timeout: env_secs("SPINDLE_REPORT_TIMEOUT_SECONDS", d.report_timeout),
            poll_delay: env_secs("SPINDLE_POLL_DELAY_SECONDS", d.poll_delay),
            max_receives: env_u32("SPINDLE_MAX_RECEIVES", d.max_receives),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            max_retries: self.max_retries,
        }
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, raw = %raw, "ignoring unparsable config value");
            default
        }),
        Err(_) => default,
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    Duration::from_secs(env_u32(key, default.as_secs() as u32) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_deployment_environment() {
        let c = EngineConfig::default();
        assert_eq!(c.base_delay, Duration::from_secs(2));
        assert_eq!(c.max_delay, Duration::from_secs(60));
        assert_eq!(c.max_retries, 5);
        assert_eq!(c.report_timeout, Duration::from_secs(900));
        assert_eq!(c.poll_delay, Duration::from_secs(10));
    }

    #[test]
    fn retry_policy_carries_the_same_bounds() {
        let c = EngineConfig::default();
        let p = c.retry_policy();
        assert_eq!(p.base_delay, c.base_delay);
        assert_eq!(p.max_delay, c.max_delay);
        assert_eq!(p.max_retries, c.max_retries);
    }
}
