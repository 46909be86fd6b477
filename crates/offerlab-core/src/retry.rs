//! Bounded retry combinator
//!
//! `with_retries` runs an async operation until it succeeds or the attempt
//! ceiling is reached, then hands back the last error together with the
//! number of attempts spent.
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one (minimum 1)
    pub max_attempts: u32,
    /// Pause between attempts; zero retries immediately
    #[serde(default, with = "millis")]
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// A policy that never retries
    pub fn once() -> Self {
        Self::new(1)
    }

    fn ceiling(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3)
    }
}

/// All attempts failed, or a non-retryable error stopped the loop early
#[derive(Debug, Clone, PartialEq)]
pub struct Exhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Retry every error up to the policy ceiling.
///
/// On success returns the value and the attempt number (1-based) that
/// produced it.
pub async fn with_retries<T, E, F, Fut>(policy: &RetryPolicy, operation: F) -> Result<(T, u32), Exhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    with_retries_if(policy, operation, |_| true).await
}

/// Retry only errors accepted by `retryable`; anything else ends the loop at once.
pub async fn with_retries_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    mut operation: F,
    retryable: P,
) -> Result<(T, u32), Exhausted<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let ceiling = policy.ceiling();
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(err) => {
                if attempt >= ceiling || !retryable(&err) {
                    return Err(Exhausted {
                        attempts: attempt,
                        last_error: err,
                    });
                }
                tracing::debug!(attempt, ceiling, "attempt failed, retrying");
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
                attempt += 1;
            }
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
