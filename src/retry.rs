use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::Result;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn no_delay(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        // 1x, 2x, 4x ... capped so a bad config cannot stall a cycle for hours.
        let factor = 1u32 << attempt.saturating_sub(1).min(6);
        self.base_delay.saturating_mul(factor)
    }
}

/// Runs `op` until it succeeds, fails permanently, or the attempt budget is
/// spent. Only transient fetch failures are retried.
pub fn with_retry<T>(policy: &RetryPolicy, what: &str, mut op: impl FnMut() -> Result<T>) -> Result<T> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(%what, attempt, max_attempts, ?delay, "transient failure, retrying: {err}");
                if !delay.is_zero() {
                    thread::sleep(delay);
                }
                attempt += 1;
            }
            Err(err) => {
                debug!(%what, attempt, "giving up: {err}");
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;

    #[test]
    fn retries_transient_until_success() {
        let mut calls = 0;
        let out = with_retry(&RetryPolicy::no_delay(3), "test", || {
            calls += 1;
            if calls < 3 {
                Err(OracleError::transient("flaky"))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(out.unwrap(), 3);
    }

    #[test]
    fn never_retries_permanent() {
        let mut calls = 0;
        let out: Result<()> = with_retry(&RetryPolicy::no_delay(5), "test", || {
            calls += 1;
            Err(OracleError::permanent("bad game id"))
        });
        assert!(out.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn stops_at_attempt_budget() {
        let mut calls = 0;
        let out: Result<()> = with_retry(&RetryPolicy::no_delay(4), "test", || {
            calls += 1;
            Err(OracleError::transient("down"))
        });
        assert!(out.unwrap_err().is_transient());
        assert_eq!(calls, 4);
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }
}
