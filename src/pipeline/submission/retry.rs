//! Bounded exponential backoff for registry calls.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::registry::TransportError;

/// Attempt budget and delay curve for one registry call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: base_delay.saturating_mul(30),
        }
    }

    /// Ceiling of the wait after the `failed_attempt`-th failure (1-based):
    /// `base * 2^(n-1)`, capped at `max_delay`.
    pub fn ceiling_for(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay)
    }

    /// Jittered delay: uniformly between half the ceiling and the ceiling.
    pub fn delay_for(&self, failed_attempt: u32) -> Duration {
        let ceiling = self.ceiling_for(failed_attempt);
        let half = ceiling / 2;
        let spread = (ceiling - half).as_millis() as u64;
        let jitter = if spread == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=spread)
        };
        half + Duration::from_millis(jitter)
    }
}

/// Result of a call driven through `with_backoff`.
#[derive(Debug)]
pub struct Attempted<T> {
    pub result: Result<T, TransportError>,
    pub attempts: u32,
    /// At least one attempt timed out or was cut off, so the registry may have processed
    /// the payload even if the final result is an error.
    pub delivery_uncertain: bool,
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// attempt budget is spent. The same payload is re-sent on every attempt.
pub async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Attempted<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut delivery_uncertain = false;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => {
                return Attempted {
                    result: Ok(value),
                    attempts: attempt,
                    delivery_uncertain,
                }
            }
            Err(e) => {
                delivery_uncertain |= e.is_ambiguous();
                if !e.is_retryable() || attempt >= policy.max_attempts {
                    return Attempted {
                        result: Err(e),
                        attempts: attempt,
                        delivery_uncertain,
                    };
                }
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Registry call failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
