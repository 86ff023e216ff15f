use std::future::Future;
use std::time::Duration;

use tokio::select;
use tokio_util::sync::CancellationToken;

use crate::status::Status;

/// Borrow the [`Status`] out of a wrapping error type, if the error carries one.
pub trait TryAs<T> {
    fn try_as(&self) -> Option<&T>;
}

impl TryAs<Status> for Status {
    fn try_as(&self) -> Option<&Status> {
        Some(self)
    }
}

/// Retry policy for quota-limited Google Cloud calls.
///
/// Only resource-exhausted failures are retried. The delay before each retry
/// honors a server-supplied `RetryInfo` hint when present, falling back to
/// the fixed schedule indexed by attempt (saturating at the last entry).
#[derive(Clone, Debug)]
pub struct RetrySetting {
    pub max_retries: usize,
    pub schedule: Vec<Duration>,
}

impl Default for RetrySetting {
    fn default() -> Self {
        Self {
            max_retries: 4,
            schedule: vec![
                Duration::from_secs(30),
                Duration::from_secs(60),
                Duration::from_secs(90),
                Duration::from_secs(120),
            ],
        }
    }
}

impl RetrySetting {
    pub fn should_retry(&self, status: &Status) -> bool {
        status.is_resource_exhausted()
    }

    /// Delay before retry `attempt` (0-based).
    pub fn delay(&self, attempt: usize, status: &Status) -> Duration {
        if let Some(hint) = status.retry_delay() {
            return hint;
        }
        let index = attempt.min(self.schedule.len().saturating_sub(1));
        self.schedule.get(index).copied().unwrap_or_default()
    }
}

/// Invoke `a`, retrying quota errors per `retry`, racing against `cancel`.
pub async fn invoke<A, R, E>(
    cancel: Option<CancellationToken>,
    retry: Option<RetrySetting>,
    mut a: impl FnMut() -> A,
) -> Result<R, E>
where
    E: TryAs<Status> + From<Status>,
    A: Future<Output = Result<R, E>>,
{
    let fn_loop = async {
        let retry = retry.unwrap_or_default();
        let mut attempt = 0;
        loop {
            let err = match a().await {
                Ok(v) => return Ok(v),
                Err(e) => e,
            };
            let delay = match err.try_as() {
                Some(status) if attempt < retry.max_retries && retry.should_retry(status) => {
                    retry.delay(attempt, status)
                }
                _ => return Err(err),
            };
            tracing::debug!(attempt, delay_secs = delay.as_secs(), "retrying quota-exhausted call");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    };

    match cancel {
        Some(cancel) => {
            select! {
                _ = cancel.cancelled() => Err(Status::cancelled().into()),
                v = fn_loop => v,
            }
        }
        None => fn_loop.await,
    }
}

/// Like [`invoke`], for calls that thread mutable state through each attempt.
///
/// Paginated iterators use this to retry an individual `next()` without
/// restarting the page: the failed attempt hands its state back so the retry
/// resumes from the same page token.
pub async fn invoke_fn<R, V, A, E>(
    cancel: Option<CancellationToken>,
    retry: Option<RetrySetting>,
    mut f: impl FnMut(V) -> A,
    mut v: V,
) -> Result<R, E>
where
    E: TryAs<Status> + From<Status>,
    A: Future<Output = Result<R, (E, V)>>,
{
    let fn_loop = async {
        let retry = retry.unwrap_or_default();
        let mut attempt = 0;
        loop {
            let err = match f(v).await {
                Ok(r) => return Ok(r),
                Err((e, state)) => {
                    v = state;
                    e
                }
            };
            let delay = match err.try_as() {
                Some(status) if attempt < retry.max_retries && retry.should_retry(status) => {
                    retry.delay(attempt, status)
                }
                _ => return Err(err),
            };
            tracing::debug!(attempt, delay_secs = delay.as_secs(), "retrying quota-exhausted call");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    };

    match cancel {
        Some(cancel) => {
            select! {
                _ = cancel.cancelled() => Err(Status::cancelled().into()),
                v = fn_loop => v,
            }
        }
        None => fn_loop.await,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::status::Code;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quota_status() -> Status {
        Status::from_response(
            429,
            r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED"}}"#,
        )
    }

    fn denied_status() -> Status {
        Status::from_response(
            403,
            r#"{"error": {"code": 403, "message": "The caller does not have permission", "status": "PERMISSION_DENIED"}}"#,
        )
    }

    fn fast_retry() -> RetrySetting {
        RetrySetting {
            max_retries: 4,
            schedule: vec![Duration::from_millis(1)],
        }
    }

    #[test]
    fn default_schedule_saturates() {
        let retry = RetrySetting::default();
        let status = quota_status();
        assert_eq!(retry.delay(0, &status), Duration::from_secs(30));
        assert_eq!(retry.delay(3, &status), Duration::from_secs(120));
        assert_eq!(retry.delay(9, &status), Duration::from_secs(120));
    }

    #[test]
    fn server_hint_wins_over_schedule() {
        let retry = RetrySetting::default();
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded", "status": "RESOURCE_EXHAUSTED",
            "details": [{"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "7s"}]}}"#;
        let status = Status::from_response(429, body);
        assert_eq!(retry.delay(0, &status), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn retries_quota_errors_up_to_limit() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), Status> = invoke(None, Some(fast_retry()), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(quota_status()) }
        })
        .await;
        assert_eq!(result.unwrap_err().code(), Code::ResourceExhausted);
        // initial call + 4 retries
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn does_not_retry_permission_denied() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), Status> = invoke(None, Some(fast_retry()), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(denied_status()) }
        })
        .await;
        assert!(result.unwrap_err().is_permission_denied());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn succeeds_after_transient_quota_error() {
        let calls = AtomicUsize::new(0);
        let result: Result<u32, Status> = invoke(None, Some(fast_retry()), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(quota_status())
                } else {
                    Ok(99)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn invoke_fn_reuses_state_across_attempts() {
        let result: Result<String, Status> = invoke_fn(
            None,
            Some(fast_retry()),
            |token: String| async move {
                if token == "page-2" {
                    Ok(token)
                } else {
                    Err((quota_status(), "page-2".to_string()))
                }
            },
            "page-1".to_string(),
        )
        .await;
        assert_eq!(result.unwrap(), "page-2");
    }

    #[tokio::test]
    async fn cancellation_aborts_the_loop() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), Status> = invoke(
            Some(cancel),
            Some(RetrySetting::default()),
            || async { Err(quota_status()) },
        )
        .await;
        assert_eq!(result.unwrap_err().code(), Code::Cancelled);
    }
}
