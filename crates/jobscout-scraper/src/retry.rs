//! Retry with a recovery action for flaky navigation primitives.
//!
//! [`retry_with_recovery`] wraps any fallible async operation and retries on
//! transient errors (driver timeouts, stale content, 5xx from the
//! automation endpoint). Between attempts an optional *recovery action*
//! runs first — a site-specific cleanup such as dismissing an interstitial
//! modal or scrolling the list back into view. Failures of the recovery
//! action itself are logged and swallowed, never propagated.
//!
//! The recovery action is an explicit closure capturing the same
//! navigator/browser handle the operation captures. There is no implicit
//! receiver: whoever builds the operation also builds its recovery.

use std::future::Future;
use std::time::Duration;

use crate::error::ScrapeError;

/// Attempt and delay bounds for one retried operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryOptions {
    /// Total attempts, including the first. Clamped to at least 1.
    pub max_attempts: u32,
    /// Base delay between attempts; jittered ±25% per attempt.
    pub delay: Duration,
}

impl RetryOptions {
    #[must_use]
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Runs `operation` with up to `options.max_attempts` attempts on transient
/// errors, invoking `recovery` before each retry.
///
/// - Success returns immediately.
/// - A non-transient error (see [`ScrapeError::is_transient`]) propagates
///   immediately without retry or recovery.
/// - On a transient error with attempts remaining: `recovery` runs (its
///   errors are logged and swallowed), the jittered delay elapses, and the
///   operation is retried. An operation failing every attempt therefore
///   sees `max_attempts - 1` recovery invocations — none after the final
///   attempt, since no retry follows it.
/// - Exhaustion re-raises the last error.
///
/// # Errors
///
/// The last operation error, once non-transient or exhausted.
pub async fn retry_with_recovery<T, F, Fut, R, RFut>(
    options: RetryOptions,
    label: &str,
    mut operation: F,
    recovery: R,
) -> Result<T, ScrapeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScrapeError>>,
    R: Fn() -> RFut,
    RFut: Future<Output = Result<(), ScrapeError>>,
{
    let max_attempts = options.max_attempts.max(1);
    let mut attempt = 1u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() || attempt >= max_attempts {
                    return Err(err);
                }
                if let Err(recovery_err) = recovery().await {
                    tracing::warn!(
                        label,
                        error = %recovery_err,
                        "recovery action failed — retrying anyway"
                    );
                }
                let delay_ms = jittered_ms(options.delay);
                tracing::warn!(
                    label,
                    attempt,
                    max_attempts,
                    delay_ms,
                    error = %err,
                    "transient failure — retrying"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
        }
    }
}

/// [`retry_with_recovery`] without a recovery action.
///
/// # Errors
///
/// The last operation error, once non-transient or exhausted.
pub async fn retry<T, F, Fut>(
    options: RetryOptions,
    label: &str,
    operation: F,
) -> Result<T, ScrapeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScrapeError>>,
{
    retry_with_recovery(options, label, operation, || async { Ok::<(), ScrapeError>(()) }).await
}

/// The sentinel-value variant: exhausted transient retries yield `None`
/// instead of re-raising, for call sites where a missing value is an
/// acceptable outcome (e.g. one job card that never loads).
///
/// # Errors
///
/// Non-transient errors still propagate immediately.
pub async fn retry_or_suppress<T, F, Fut, R, RFut>(
    options: RetryOptions,
    label: &str,
    operation: F,
    recovery: R,
) -> Result<Option<T>, ScrapeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ScrapeError>>,
    R: Fn() -> RFut,
    RFut: Future<Output = Result<(), ScrapeError>>,
{
    match retry_with_recovery(options, label, operation, recovery).await {
        Ok(value) => Ok(Some(value)),
        // A transient error surviving the retry loop means exhaustion.
        Err(err) if err.is_transient() => {
            tracing::error!(label, error = %err, "retries exhausted — suppressing");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn jittered_ms(delay: Duration) -> u64 {
    let base = delay.as_millis() as u64;
    (base as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64
}
