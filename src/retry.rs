//! Backoff for session setup.
//!
//! Only `create_session` goes through [`retry_async`]. Control requests are
//! not idempotent on the server (a repeated `add` allocates a second table),
//! so they are issued exactly once.

use std::collections::hash_map::RandomState;
use std::future::Future;
use std::hash::{BuildHasher, Hash, Hasher};
use std::time::Duration;

use tracing::debug;

/// Attempt budget and exponential backoff for opening a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts in total, the first one included. Zero behaves like one.
    pub max_attempts: usize,
    pub initial_backoff: Duration,
    /// Cap on the doubled backoff, jitter excluded.
    pub max_backoff: Duration,
    /// Upper bound of the random delay added on top of the backoff.
    pub jitter: Duration,
}

impl RetryPolicy {
    /// Three attempts starting at 250 ms, capped at 2 s.
    pub fn session_setup() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(2),
            jitter: Duration::from_millis(100),
        }
    }

    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    /// Pause after the failed 1-based `attempt`.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let doublings = attempt.saturating_sub(1).min(31) as u32;
        let backoff = self
            .initial_backoff
            .checked_mul(1 << doublings)
            .map_or(self.max_backoff, |delay| delay.min(self.max_backoff));
        backoff + random_jitter(self.jitter, attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::session_setup()
    }
}

/// Runs `op` with the 1-based attempt number until it succeeds, the error is
/// rejected by `should_retry`, or the attempt budget is spent. The last error
/// is returned.
pub async fn retry_async<T, E, Op, Fut, ShouldRetry>(
    policy: &RetryPolicy,
    mut op: Op,
    mut should_retry: ShouldRetry,
) -> Result<T, E>
where
    Op: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    ShouldRetry: FnMut(&E) -> bool,
{
    let budget = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        let error = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if attempt >= budget || !should_retry(&error) {
            return Err(error);
        }

        let pause = policy.delay_for_attempt(attempt);
        debug!(
            event = "session_setup_retry",
            attempt,
            budget,
            pause_ms = pause.as_millis() as u64
        );
        tokio::time::sleep(pause).await;
        attempt += 1;
    }
}

/// `tokio::time::timeout` under the name used across the client.
pub async fn with_timeout<T, Fut>(
    limit: Duration,
    future: Fut,
) -> Result<T, tokio::time::error::Elapsed>
where
    Fut: Future<Output = T>,
{
    tokio::time::timeout(limit, future).await
}

fn random_jitter(bound: Duration, attempt: usize) -> Duration {
    let bound_ms = bound.as_millis() as u64;
    if bound_ms == 0 {
        return Duration::ZERO;
    }
    let mut hasher = RandomState::new().build_hasher();
    attempt.hash(&mut hasher);
    Duration::from_millis(hasher.finish() % (bound_ms + 1))
}
