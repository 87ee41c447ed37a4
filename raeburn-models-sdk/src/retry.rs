//! Bounded retry with exponential backoff.
//!
//! A single helper wraps one fallible attempt in a retry loop: transient
//! failures (transport errors, HTTP 5xx) are retried up to the attempt
//! budget with exponentially growing sleeps, fatal failures (HTTP 4xx,
//! malformed bodies) abort immediately. Every failed attempt is reported
//! through the caller's hook so adapter health counters see each miss.

use std::future::Future;
use std::time::Duration;

/// Why a single attempt failed, and whether it is worth repeating.
#[derive(Debug, Clone)]
pub enum AttemptError {
    /// Network-level failure or HTTP 5xx; retried until attempts run out.
    Transient(String),
    /// HTTP 4xx or an unusable response body; never retried.
    Fatal(String),
}

impl AttemptError {
    pub fn is_transient(&self) -> bool {
        matches!(self, AttemptError::Transient(_))
    }

    pub fn message(&self) -> &str {
        match self {
            AttemptError::Transient(m) | AttemptError::Fatal(m) => m,
        }
    }
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Exponential backoff schedule: `base`, `base * multiplier`, ... capped at `cap`.
#[derive(Debug, Clone, Copy)]
pub struct ExpBackoff {
    pub base: Duration,
    pub cap: Duration,
    pub multiplier: f64,
}

impl Default for ExpBackoff {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            cap: Duration::from_secs(4),
            multiplier: 2.0,
        }
    }
}

impl ExpBackoff {
    /// Sleep duration before retry number `n` (0-based).
    pub fn delay(&self, n: u32) -> Duration {
        let raw = self.base.mul_f64(self.multiplier.powi(n as i32));
        raw.min(self.cap)
    }
}

/// Run `op` up to `attempts` times, sleeping between transient failures.
///
/// `on_failure` fires once per failed attempt, transient or fatal, before
/// any backoff sleep. Returns the last error when the budget is exhausted.
pub async fn retry<T, F, Fut>(
    mut op: F,
    attempts: u32,
    backoff: ExpBackoff,
    mut on_failure: impl FnMut(&AttemptError),
) -> Result<T, AttemptError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let attempts = attempts.max(1);
    let mut last = None;
    for n in 0..attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                on_failure(&err);
                let fatal = !err.is_transient();
                last = Some(err);
                if fatal {
                    break;
                }
                if n + 1 < attempts {
                    let delay = backoff.delay(n);
                    tracing::debug!(attempt = n + 1, ?delay, "transient failure, backing off");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
    Err(last.unwrap_or_else(|| AttemptError::Fatal("no attempts executed".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_schedule_doubles_and_caps() {
        let b = ExpBackoff::default();
        assert_eq!(b.delay(0), Duration::from_millis(500));
        assert_eq!(b.delay(1), Duration::from_millis(1000));
        assert_eq!(b.delay(2), Duration::from_millis(2000));
        assert_eq!(b.delay(3), Duration::from_millis(4000));
        assert_eq!(b.delay(4), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_exhaust_the_budget() {
        let calls = AtomicU32::new(0);
        let failures = AtomicU32::new(0);
        let result: Result<(), _> = retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AttemptError::Transient("503".to_string())) }
            },
            3,
            ExpBackoff::default(),
            |_| {
                failures.fetch_add(1, Ordering::SeqCst);
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(failures.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_do_not_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AttemptError::Fatal("400".to_string())) }
            },
            3,
            ExpBackoff::default(),
            |_| {},
        )
        .await;
        assert!(matches!(result, Err(AttemptError::Fatal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn success_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = retry(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(AttemptError::Transient("reset".to_string()))
                    } else {
                        Ok(42)
                    }
                }
            },
            3,
            ExpBackoff {
                base: Duration::from_millis(1),
                cap: Duration::from_millis(1),
                multiplier: 1.0,
            },
            |_| {},
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
