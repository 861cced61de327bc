//! Bounded quadratic backoff shared by the broker channel and outbound service clients.

use rand::Rng;
use std::time::Duration;

/// Default number of attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

/// Default base sleep between attempts.
pub const DEFAULT_BASE_SLEEP: Duration = Duration::from_millis(100);

/// Largest extra wait added by jitter, as a fraction of the computed wait.
const JITTER_FRACTION: f64 = 0.2;

/// Immutable description of how a failing operation is retried.
///
/// The wait before retrying after failed attempt `n` (1-based) is `base_sleep × n²`.
/// Attempt counters are owned by each retry loop, never by the policy, so one policy can be
/// shared by any number of concurrent callers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_sleep: Duration,
    max_sleep: Option<Duration>,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_BASE_SLEEP)
    }
}

impl RetryPolicy {
    /// Create a policy allowing `max_attempts` total attempts.
    ///
    /// A `max_attempts` of 0 is treated as 1: the operation always runs once.
    pub fn new(max_attempts: u32, base_sleep: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_sleep,
            max_sleep: None,
            jitter: false,
        }
    }

    /// Cap every computed wait at `max_sleep`.
    pub fn with_max_sleep(mut self, max_sleep: Duration) -> Self {
        self.max_sleep = Some(max_sleep);
        self
    }

    /// Add up to 20% random extra wait on top of the computed wait.
    pub fn with_jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_sleep(&self) -> Duration {
        self.base_sleep
    }

    pub fn max_sleep(&self) -> Option<Duration> {
        self.max_sleep
    }

    pub fn has_jitter(&self) -> bool {
        self.jitter
    }

    /// True once `attempt` (1-based) is the last attempt the policy allows.
    pub fn is_exhausted(&self, attempt: u32) -> bool {
        attempt >= self.max_attempts
    }

    /// Wait to insert after failed attempt `attempt` (1-based) before trying again.
    pub fn wait_before(&self, attempt: u32) -> Duration {
        let mut wait = quadratic_wait(self.base_sleep, attempt);
        if let Some(cap) = self.max_sleep {
            wait = wait.min(cap);
        }
        if self.jitter {
            wait = add_jitter(wait);
        }
        wait
    }
}

/// `base × attempt²`, saturating instead of overflowing.
pub fn quadratic_wait(base: Duration, attempt: u32) -> Duration {
    let factor = attempt.saturating_mul(attempt);
    base.checked_mul(factor).unwrap_or(Duration::MAX)
}

fn add_jitter(wait: Duration) -> Duration {
    let max_extra_ms = (wait.as_millis() as f64 * JITTER_FRACTION) as u64;
    if max_extra_ms == 0 {
        return wait;
    }
    let extra = rand::thread_rng().gen_range(0..=max_extra_ms);
    wait.saturating_add(Duration::from_millis(extra))
}
