//! Activity execution with bounded retries.

use std::future::Future;
use std::time::Duration;

use citadel_common::Error;

use super::{ActivityError, ErrorTag};

/// Retry policy for an activity: exponential backoff between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub backoff_coefficient: f64,
    /// 0 means unlimited attempts.
    pub maximum_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_attempts: 3,
        }
    }
}

/// Options governing a single activity invocation.
#[derive(Debug, Clone, Copy)]
pub struct ActivityOptions {
    /// Budget for one attempt, fetch-to-result.
    pub start_to_close_timeout: Duration,
    pub retry_policy: RetryPolicy,
    /// Error tags that fail the activity without further attempts.
    pub non_retryable: &'static [ErrorTag],
}

/// Run `operation` under `options`: each attempt is clamped to the
/// start-to-close timeout, failures back off exponentially, and a
/// non-retryable tag fails immediately.
pub async fn execute<T, F, Fut>(
    name: &str,
    options: &ActivityOptions,
    mut operation: F,
) -> Result<T, ActivityError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ActivityError>>,
{
    let policy = options.retry_policy;
    let max_attempts = if policy.maximum_attempts == 0 {
        u32::MAX
    } else {
        policy.maximum_attempts
    };
    let mut backoff = policy.initial_interval;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        let failure = match tokio::time::timeout(options.start_to_close_timeout, operation()).await
        {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => err,
            Err(_) => ActivityError {
                tag: ErrorTag::Timeout,
                error: Error::Internal(format!(
                    "activity {name} exceeded its start-to-close timeout"
                )),
            },
        };

        if options.non_retryable.contains(&failure.tag) {
            tracing::warn!(
                activity = name,
                attempt,
                tag = failure.tag.as_str(),
                error = %failure.error,
                "activity failed with non-retryable error"
            );
            return Err(failure);
        }
        if attempt >= max_attempts {
            tracing::warn!(
                activity = name,
                attempt,
                tag = failure.tag.as_str(),
                error = %failure.error,
                "activity failed, attempts exhausted"
            );
            return Err(failure);
        }

        tracing::debug!(
            activity = name,
            attempt,
            tag = failure.tag.as_str(),
            backoff_ms = backoff.as_millis() as u64,
            error = %failure.error,
            "activity failed, will retry after backoff"
        );
        tokio::time::sleep(backoff).await;
        backoff = backoff.mul_f64(policy.backoff_coefficient);
    }
}
