//! Per-step timeout and bounded retry with exponential backoff.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use crate::error::{ExtractError, ResolveError, SummarizeError};

/// How often and how patiently a step is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (0 disables retrying).
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(8000),
        }
    }
}

impl RetryPolicy {
    /// No retries at all.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before the next attempt after `failed_attempts` failures.
    ///
    /// Doubles from `initial_backoff`, capped at `max_backoff`. A server hint
    /// can lengthen the delay but never beyond the cap.
    pub fn backoff(&self, failed_attempts: u32, hint: Option<Duration>) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(31);
        let computed = self
            .initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff);
        match hint {
            Some(hint) => computed.max(hint.min(self.max_backoff)),
            None => computed,
        }
    }
}

/// Classifies failures that are worth another attempt.
pub trait Transient {
    fn is_transient(&self) -> bool;

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Transient for ResolveError {
    fn is_transient(&self) -> bool {
        matches!(self, ResolveError::Fetch { transient: true, .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ResolveError::Fetch { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

impl Transient for ExtractError {
    fn is_transient(&self) -> bool {
        false
    }
}

impl Transient for SummarizeError {
    fn is_transient(&self) -> bool {
        match self {
            SummarizeError::Upstream { status, .. } => *status >= 500,
            SummarizeError::RateLimited { .. }
            | SummarizeError::Timeout
            | SummarizeError::Network(_) => true,
            SummarizeError::Malformed(_) => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            SummarizeError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Why a single attempt of a step failed.
#[derive(Debug)]
pub enum StepError<E> {
    /// The step did not finish within its time budget.
    Timeout(Duration),
    Failed(E),
}

impl<E: Transient> Transient for StepError<E> {
    fn is_transient(&self) -> bool {
        match self {
            StepError::Timeout(_) => true,
            StepError::Failed(e) => e.is_transient(),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            StepError::Timeout(_) => None,
            StepError::Failed(e) => e.retry_after(),
        }
    }
}

impl<E: fmt::Display> fmt::Display for StepError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepError::Timeout(limit) => write!(f, "timeout after {}ms", limit.as_millis()),
            StepError::Failed(e) => write!(f, "{}", e),
        }
    }
}

/// Whether a timed-out attempt may be retried.
///
/// Work that keeps running after its future is dropped (blocking parses)
/// should give up, or every retry stacks another copy of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnTimeout {
    Retry,
    GiveUp,
}

/// Final failure of a step, after retries.
#[derive(Debug)]
pub struct StepFailure<E> {
    pub error: StepError<E>,
    pub attempts: u32,
}

/// Runs `op` under `timeout`, retrying transient failures per `policy`.
pub async fn run_step<T, E, F, Fut>(
    step: &'static str,
    policy: &RetryPolicy,
    timeout: Duration,
    on_timeout: OnTimeout,
    mut op: F,
) -> Result<T, StepFailure<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Transient + fmt::Display,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let error = match tokio::time::timeout(timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => StepError::Failed(e),
            Err(_) => StepError::Timeout(timeout),
        };

        let retryable = match &error {
            StepError::Timeout(_) => on_timeout == OnTimeout::Retry,
            StepError::Failed(e) => e.is_transient(),
        };
        if !retryable || attempts > policy.max_retries {
            tracing::warn!(step, attempts, "Step failed: {}", error);
            return Err(StepFailure { error, attempts });
        }

        let delay = policy.backoff(attempts, error.retry_after());
        tracing::info!(
            step,
            attempt = attempts,
            delay_ms = delay.as_millis() as u64,
            "Transient failure, retrying: {}",
            error
        );
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1, None), Duration::from_millis(500));
        assert_eq!(policy.backoff(2, None), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3, None), Duration::from_millis(2000));
        assert_eq!(policy.backoff(10, None), Duration::from_millis(8000));
        assert_eq!(policy.backoff(100, None), Duration::from_millis(8000));
    }

    #[test]
    fn test_retry_after_hint_raises_delay_up_to_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.backoff(1, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert_eq!(
            policy.backoff(1, Some(Duration::from_secs(60))),
            Duration::from_millis(8000)
        );
        assert_eq!(
            policy.backoff(2, Some(Duration::from_millis(10))),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(SummarizeError::Timeout.is_transient());
        assert!(SummarizeError::RateLimited { retry_after: None }.is_transient());
        assert!(SummarizeError::Upstream {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(!SummarizeError::Upstream {
            status: 400,
            message: String::new()
        }
        .is_transient());
        assert!(!SummarizeError::Malformed(String::new()).is_transient());
        assert!(!ResolveError::NotFound("x".to_string()).is_transient());
        assert!(!ExtractError::Parse("x".to_string()).is_transient());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_step_retries_transient_then_succeeds() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = run_step(
            "summarize",
            &RetryPolicy::default(),
            Duration::from_secs(1),
            OnTimeout::Retry,
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(SummarizeError::Network("reset".to_string()))
                } else {
                    Ok("ok")
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_step_stops_on_permanent_error() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let failure = run_step(
            "resolve",
            &RetryPolicy::default(),
            Duration::from_secs(1),
            OnTimeout::Retry,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(ResolveError::NotFound("gone".to_string()))
            },
        )
        .await
        .unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(matches!(
            failure.error,
            StepError::Failed(ResolveError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_step_times_out_each_attempt() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let failure = run_step(
            "summarize",
            &RetryPolicy::default(),
            Duration::from_millis(100),
            OnTimeout::Retry,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, SummarizeError>(())
            },
        )
        .await
        .unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(matches!(failure.error, StepError::Timeout(_)));
        assert_eq!(failure.error.to_string(), "timeout after 100ms");
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_step_can_give_up_on_first_timeout() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let failure = run_step(
            "extract",
            &RetryPolicy::default(),
            Duration::from_millis(100),
            OnTimeout::GiveUp,
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, ExtractError>(())
            },
        )
        .await
        .unwrap_err();
        assert_eq!(failure.attempts, 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(matches!(failure.error, StepError::Timeout(_)));
    }
}
