//! Bounded exponential backoff around remote calls
//!
//! Every capability call made by the scanner goes through
//! [`RetryingInvoker::invoke`]. After each attempt the outcome is classified
//! with [`RetryOutcome::from_attempt`]:
//!
//! - no response at all (transport failure) is retryable
//! - HTTP 429 is retryable, every other 4xx is permanent
//! - 5xx is retryable
//!
//! Permanent failures return immediately. Retryable failures sleep for the
//! current interval and try again until the elapsed-time budget would be
//! exceeded, at which point the last error is reported as
//! [`ScanError::RemoteUnavailable`]. A 403 with zero remaining quota, or a
//! 429 still reporting zero remaining quota once the budget is spent, is
//! reported as [`ScanError::RateLimited`] instead.

use super::error::ScanError;
use crate::remote::RemoteError;
use crate::source::Source;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_INITIAL_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_ELAPSED: Duration = Duration::from_secs(30);

/// Backoff schedule
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    /// Wall-clock budget across all attempts of one call
    pub max_elapsed: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: DEFAULT_INITIAL_INTERVAL,
            multiplier: DEFAULT_MULTIPLIER,
            max_interval: DEFAULT_MAX_INTERVAL,
            max_elapsed: DEFAULT_MAX_ELAPSED,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_elapsed(max_elapsed: Duration) -> Self {
        Self {
            max_elapsed,
            ..Default::default()
        }
    }

    fn next_interval(&self, current: Duration) -> Duration {
        current.mul_f64(self.multiplier.max(1.0)).min(self.max_interval)
    }
}

/// Classified result of one attempt
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success(T),
    Retryable(RemoteError),
    Permanent(RemoteError),
}

impl<T> RetryOutcome<T> {
    pub fn from_attempt(result: Result<T, RemoteError>) -> Self {
        match result {
            Ok(value) => RetryOutcome::Success(value),
            Err(error) if is_retryable(&error) => RetryOutcome::Retryable(error),
            Err(error) => RetryOutcome::Permanent(error),
        }
    }
}

pub fn is_retryable(error: &RemoteError) -> bool {
    match error.status {
        None => true,
        Some(429) => true,
        Some(status) if (400..500).contains(&status) => false,
        Some(status) => status >= 500,
    }
}

/// What a remote call was for; used to name the failure
#[derive(Debug, Clone, Copy)]
pub enum RemoteCall<'a> {
    Tree { source: &'a Source },
    Content { source: &'a Source, path: &'a str },
}

impl RemoteCall<'_> {
    fn context(&self) -> String {
        match self {
            RemoteCall::Tree { source } => format!("tree {}", source),
            RemoteCall::Content { source, path } => format!("content {} path {}", source, path),
        }
    }

    /// Convert the last observed error into the scan taxonomy
    pub fn map_error(&self, error: RemoteError, exhausted: bool) -> ScanError {
        let quota_spent = error.is_quota_exhausted()
            || (exhausted && error.status == Some(429) && error.reports_empty_quota());
        if let Some(rate_limit) = error.rate_limit.filter(|_| quota_spent) {
            return ScanError::RateLimited {
                reset_at: rate_limit.reset_at,
            };
        }

        if error.is_malformed_body() {
            return match self {
                RemoteCall::Content { source, path } => ScanError::ContentDecode {
                    repository: source.to_string(),
                    path: path.to_string(),
                    message: error.message,
                },
                RemoteCall::Tree { .. } => ScanError::MalformedResponse {
                    context: self.context(),
                    message: error.message,
                },
            };
        }

        match (error.status, self) {
            (Some(404), RemoteCall::Tree { source }) => ScanError::RepositoryNotFound {
                repository: source.to_string(),
            },
            (Some(404), RemoteCall::Content { source, path }) => ScanError::FileNotFound {
                repository: source.to_string(),
                path: path.to_string(),
            },
            (Some(status @ (401 | 403)), _) => ScanError::RemoteAccessDenied {
                status,
                context: self.context(),
                message: error.message,
            },
            (Some(status), _) if !exhausted && !is_retryable(&error) => {
                ScanError::RemoteRejected {
                    status,
                    context: self.context(),
                    message: error.message,
                }
            }
            (status, _) => ScanError::RemoteUnavailable {
                context: self.context(),
                status,
                message: error.message,
            },
        }
    }
}

/// Runs capability calls under a [`RetryPolicy`], honouring cancellation
#[derive(Debug, Clone)]
pub struct RetryingInvoker {
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl RetryingInvoker {
    pub fn new(policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self { policy, cancel }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn invoke<T, F, Fut>(
        &self,
        call: RemoteCall<'_>,
        mut operation: F,
    ) -> Result<T, ScanError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RemoteError>>,
    {
        let started = Instant::now();
        let mut interval = self.policy.initial_interval;
        let mut attempt = 0u32;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }
            attempt += 1;

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ScanError::Cancelled),
                result = operation() => result,
            };

            let error = match RetryOutcome::from_attempt(result) {
                RetryOutcome::Success(value) => {
                    if attempt > 1 {
                        debug!(attempt, call = %call.context(), "Succeeded after retry");
                    }
                    return Ok(value);
                }
                RetryOutcome::Permanent(error) => {
                    debug!(attempt, call = %call.context(), error = %error, "Permanent failure");
                    return Err(call.map_error(error, false));
                }
                RetryOutcome::Retryable(error) => error,
            };

            if started.elapsed() + interval > self.policy.max_elapsed {
                warn!(
                    attempt,
                    call = %call.context(),
                    error = %error,
                    "Retry budget exhausted"
                );
                return Err(call.map_error(error, true));
            }

            debug!(
                attempt,
                delay_ms = interval.as_millis() as u64,
                call = %call.context(),
                error = %error,
                "Retrying after transient failure"
            );

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ScanError::Cancelled),
                _ = tokio::time::sleep(interval) => {}
            }
            interval = self.policy.next_interval(interval);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RateLimit;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use yare::parameterized;

    fn source() -> Source {
        Source::new("o", "r", "sha")
    }

    #[parameterized(
        transport = { None, true },
        too_many_requests = { Some(429), true },
        bad_request = { Some(400), false },
        unauthorized = { Some(401), false },
        forbidden = { Some(403), false },
        not_found = { Some(404), false },
        unprocessable = { Some(422), false },
        internal = { Some(500), true },
        bad_gateway = { Some(502), true },
        unavailable = { Some(503), true },
    )]
    fn test_is_retryable(status: Option<u16>, expected: bool) {
        let error = RemoteError {
            status,
            message: "x".into(),
            rate_limit: None,
        };
        assert_eq!(is_retryable(&error), expected);
    }

    #[test]
    fn test_next_interval_grows_and_caps() {
        let policy = RetryPolicy {
            max_interval: Duration::from_millis(200),
            ..Default::default()
        };
        let second = policy.next_interval(policy.initial_interval);
        assert_eq!(second, Duration::from_millis(150));
        assert_eq!(policy.next_interval(second), Duration::from_millis(200));
    }

    #[test]
    fn test_map_error_not_found_by_call_kind() {
        let s = source();
        let tree = RemoteCall::Tree { source: &s }.map_error(RemoteError::http(404, "Not Found"), false);
        assert!(matches!(tree, ScanError::RepositoryNotFound { .. }));

        let content = RemoteCall::Content {
            source: &s,
            path: "a/Dockerfile",
        }
        .map_error(RemoteError::http(404, "Not Found"), false);
        assert_eq!(
            content,
            ScanError::FileNotFound {
                repository: "o/r:sha".into(),
                path: "a/Dockerfile".into()
            }
        );
    }

    #[test]
    fn test_quota_headers_do_not_change_classification() {
        let forbidden = RemoteError::http(403, "API rate limit exceeded").with_rate_limit(RateLimit {
            remaining: 0,
            reset_at: Utc::now(),
        });
        assert!(matches!(
            RetryOutcome::<()>::from_attempt(Err(forbidden)),
            RetryOutcome::Permanent(_)
        ));

        for remaining in [0, 12] {
            let throttled = RemoteError::http(429, "Too Many Requests").with_rate_limit(RateLimit {
                remaining,
                reset_at: Utc::now(),
            });
            assert!(matches!(
                RetryOutcome::<()>::from_attempt(Err(throttled)),
                RetryOutcome::Retryable(_)
            ));
        }
    }

    #[test]
    fn test_map_error_spent_too_many_requests_is_rate_limited() {
        let s = source();
        let reset_at = Utc::now();
        let error = RemoteError::http(429, "Too Many Requests").with_rate_limit(RateLimit {
            remaining: 0,
            reset_at,
        });
        assert_eq!(
            RemoteCall::Tree { source: &s }.map_error(error, true),
            ScanError::RateLimited { reset_at }
        );
    }

    #[test]
    fn test_map_error_quota_exhaustion_is_rate_limited() {
        let s = source();
        let reset_at = Utc::now();
        let error = RemoteError::http(403, "API rate limit exceeded").with_rate_limit(RateLimit {
            remaining: 0,
            reset_at,
        });
        assert_eq!(
            RemoteCall::Tree { source: &s }.map_error(error, false),
            ScanError::RateLimited { reset_at }
        );
    }

    #[test]
    fn test_map_error_forbidden_with_quota_is_access_denied() {
        let s = source();
        let error = RemoteError::http(403, "Resource not accessible").with_rate_limit(RateLimit {
            remaining: 4000,
            reset_at: Utc::now(),
        });
        let mapped = RemoteCall::Tree { source: &s }.map_error(error, false);
        match mapped {
            ScanError::RemoteAccessDenied { status, .. } => assert_eq!(status, 403),
            other => panic!("Expected RemoteAccessDenied, got {:?}", other),
        }
    }

    #[test]
    fn test_map_error_exhausted_server_error_is_unavailable() {
        let s = source();
        let error = RemoteError::http(503, "down");
        let mapped = RemoteCall::Tree { source: &s }.map_error(error, true);
        match mapped {
            ScanError::RemoteUnavailable { status, .. } => assert_eq!(status, Some(503)),
            other => panic!("Expected RemoteUnavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_map_error_other_client_error_is_rejected() {
        let s = source();
        let mapped = RemoteCall::Tree { source: &s }.map_error(RemoteError::http(422, "bad sha"), false);
        assert!(matches!(mapped, ScanError::RemoteRejected { status: 422, .. }));
    }

    #[test]
    fn test_map_error_unreadable_success_body() {
        let s = source();
        let error = RemoteError::http(200, "unexpected response body: expected value");

        let content = RemoteCall::Content {
            source: &s,
            path: "Dockerfile",
        }
        .map_error(error.clone(), false);
        assert!(matches!(content, ScanError::ContentDecode { .. }));

        let tree = RemoteCall::Tree { source: &s }.map_error(error.clone(), false);
        assert!(matches!(tree, ScanError::MalformedResponse { .. }));

        assert!(matches!(
            RetryOutcome::<()>::from_attempt(Err(error)),
            RetryOutcome::Permanent(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_many_requests_twice_then_success() {
        let invoker = RetryingInvoker::new(RetryPolicy::default(), CancellationToken::new());
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let s = source();

        let result = invoker
            .invoke(RemoteCall::Tree { source: &s }, move || async move {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err(RemoteError::http(429, "Too Many Requests")),
                    _ => Ok(42),
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_many_requests_with_empty_quota_is_retried() {
        let invoker = RetryingInvoker::new(RetryPolicy::default(), CancellationToken::new());
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let s = source();

        let result = invoker
            .invoke(RemoteCall::Tree { source: &s }, move || async move {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    0 | 1 => Err(RemoteError::http(429, "Too Many Requests").with_rate_limit(
                        RateLimit {
                            remaining: 0,
                            reset_at: Utc::now(),
                        },
                    )),
                    _ => Ok(7),
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_too_many_requests_past_budget_is_rate_limited() {
        let invoker = RetryingInvoker::new(
            RetryPolicy::with_max_elapsed(Duration::from_secs(1)),
            CancellationToken::new(),
        );
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let s = source();

        let result: Result<(), _> = invoker
            .invoke(RemoteCall::Tree { source: &s }, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::http(429, "Too Many Requests").with_rate_limit(RateLimit {
                    remaining: 0,
                    reset_at: Utc::now(),
                }))
            })
            .await;

        assert!(matches!(result, Err(ScanError::RateLimited { .. })));
        assert!(calls.load(Ordering::SeqCst) > 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let invoker = RetryingInvoker::new(RetryPolicy::default(), CancellationToken::new());
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let s = source();

        let result: Result<(), _> = invoker
            .invoke(RemoteCall::Tree { source: &s }, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::http(404, "Not Found"))
            })
            .await;

        assert!(matches!(result, Err(ScanError::RepositoryNotFound { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_reports_unavailable() {
        let invoker = RetryingInvoker::new(
            RetryPolicy::with_max_elapsed(Duration::from_secs(2)),
            CancellationToken::new(),
        );
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let s = source();
        let started = Instant::now();

        let result: Result<(), _> = invoker
            .invoke(RemoteCall::Tree { source: &s }, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(RemoteError::transport("connection reset"))
            })
            .await;

        assert!(matches!(
            result,
            Err(ScanError::RemoteUnavailable { status: None, .. })
        ));
        assert!(calls.load(Ordering::SeqCst) > 1);
        assert!(started.elapsed() <= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let invoker = RetryingInvoker::new(RetryPolicy::default(), cancel);
        let calls = AtomicUsize::new(0);
        let counter = &calls;
        let s = source();

        let result: Result<(), _> = invoker
            .invoke(RemoteCall::Tree { source: &s }, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert_eq!(result, Err(ScanError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_backoff() {
        let cancel = CancellationToken::new();
        let invoker = RetryingInvoker::new(RetryPolicy::default(), cancel.clone());
        let s = source();

        let trigger = cancel.clone();
        let result: Result<(), _> = invoker
            .invoke(RemoteCall::Tree { source: &s }, || {
                trigger.cancel();
                async { Err(RemoteError::http(502, "Bad Gateway")) }
            })
            .await;

        assert_eq!(result, Err(ScanError::Cancelled));
    }
}
