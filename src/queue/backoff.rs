//! Per-key exponential backoff

use std::collections::HashMap;
use std::time::Duration;

/// Tracks consecutive failures per key and turns them into requeue delays.
///
/// The delay for the n-th consecutive failure is `base * 2^n`, capped at `max`.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max: Duration,
    failures: HashMap<String, u32>,
}

impl ExponentialBackoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: HashMap::new(),
        }
    }

    /// Record a failure for `key` and return how long to wait before retrying
    pub fn when(&mut self, key: &str) -> Duration {
        let failures = self.failures.entry(key.to_string()).or_insert(0);
        let exp = *failures;
        *failures = failures.saturating_add(1);

        self.base
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.max)
    }

    /// Clear the failure history of `key`
    pub fn forget(&mut self, key: &str) {
        self.failures.remove(key);
    }

    /// Number of failures recorded for `key` since it was last forgotten
    pub fn num_requeues(&self, key: &str) -> u32 {
        self.failures.get(key).copied().unwrap_or(0)
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(5), Duration::from_secs(300))
    }
}
