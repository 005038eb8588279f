use crate::errors::Retriable;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Exponential backoff retry for one trial.
///
/// Attempts are numbered from 1. The wait after a failed attempt `k` is
/// `initial_backoff * multiplier^(k-1)`. Whether a failure is worth retrying
/// is decided by the failure, never by the policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

/// Passed to the retry callback just before the backoff sleep.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryNotice {
    /// The attempt that failed.
    pub attempt: u32,
    pub reason: String,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// No retries, no waiting.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            multiplier: 1.0,
        }
    }

    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_backoff.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Runs `attempt_fn` until it succeeds, fails with a non-retriable error,
    /// or `max_attempts` is used up. The last error is returned unchanged.
    pub async fn execute<T, E, F, Fut, N>(&self, attempt_fn: F, on_retry: N) -> Result<T, E>
    where
        E: Retriable + fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        N: FnMut(RetryNotice),
    {
        let never = CancellationToken::new();
        match self.execute_until(&never, attempt_fn, on_retry).await {
            Some(result) => result,
            None => unreachable!("token is never cancelled"),
        }
    }

    /// Like [`execute`](Self::execute), but gives up with `None` when `cancel`
    /// fires during a backoff sleep. A running attempt is never interrupted.
    pub async fn execute_until<T, E, F, Fut, N>(
        &self,
        cancel: &CancellationToken,
        mut attempt_fn: F,
        mut on_retry: N,
    ) -> Option<Result<T, E>>
    where
        E: Retriable + fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        N: FnMut(RetryNotice),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match attempt_fn(attempt).await {
                Ok(value) => return Some(Ok(value)),
                Err(e) if attempt < max_attempts && e.is_retriable() => {
                    let backoff = self.backoff_for(attempt);
                    on_retry(RetryNotice {
                        attempt,
                        reason: e.to_string(),
                        backoff,
                    });
                    tokio::select! {
                        _ = cancel.cancelled() => return None,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    attempt += 1;
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
