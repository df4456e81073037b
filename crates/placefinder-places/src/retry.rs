//! Bounded retry on Places API rate-limit signals.
//!
//! [`fetch_envelope`] runs one request, classifies the envelope status, and
//! retries only on `OVER_QUERY_LIMIT` / `RESOURCE_EXHAUSTED` (or HTTP 429)
//! with a doubling backoff. Transport failures, decode failures, and every
//! other status are handed back immediately. Each backoff sleep races the
//! run's cancellation token.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::PlacesError;
use crate::types::Envelope;

/// Retry schedule for rate-limited requests.
///
/// With the default policy a request is attempted at most 4 times, sleeping
/// 300 ms, 600 ms, and 1200 ms between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first rate-limited response.
    pub max_retries: u32,
    /// Sleep before the first retry; doubled for every following retry.
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(300),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    /// Sleep before retry number `retry` (zero-based): `initial * 2^retry`.
    #[must_use]
    pub fn backoff_for(&self, retry: u32) -> Duration {
        self.initial_backoff.saturating_mul(1u32 << retry.min(31))
    }
}

/// Sleeps for `delay` unless `cancel` fires first.
///
/// # Errors
///
/// Returns [`PlacesError::Cancelled`] if the token is (or becomes) cancelled.
pub(crate) async fn pause(cancel: &CancellationToken, delay: Duration) -> Result<(), PlacesError> {
    if cancel.is_cancelled() {
        return Err(PlacesError::Cancelled);
    }
    if delay.is_zero() {
        return Ok(());
    }
    tokio::select! {
        () = cancel.cancelled() => Err(PlacesError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}

pub(crate) fn millis(delay: Duration) -> u64 {
    u64::try_from(delay.as_millis()).unwrap_or(u64::MAX)
}

/// Runs `operation` and retries it while the response signals a rate limit.
///
/// Every envelope whose status is not a rate-limit signal is returned as-is,
/// including error statuses, so callers can react to `INVALID_REQUEST`.
///
/// # Errors
///
/// - [`PlacesError::RateLimitExceeded`] once `policy.max_retries` retries
///   have all been rate limited.
/// - [`PlacesError::Cancelled`] if `cancel` fires during a request or sleep.
/// - Any transport or decode error from `operation`, unretried.
pub async fn fetch_envelope<F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<Envelope, PlacesError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<serde_json::Value, PlacesError>>,
{
    let mut retry = 0u32;
    loop {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(PlacesError::Cancelled),
            outcome = operation() => outcome,
        };

        let signal = match outcome {
            Ok(body) => {
                let envelope = Envelope::from_body(body, "places response")?;
                if !envelope.status.is_rate_limited() {
                    return Ok(envelope);
                }
                envelope.status.to_string()
            }
            Err(PlacesError::Throttled) => "HTTP 429".to_owned(),
            Err(err) => return Err(err),
        };

        if retry >= policy.max_retries {
            tracing::warn!(
                attempts = retry + 1,
                status = %signal,
                "places API still rate limited after all retries"
            );
            return Err(PlacesError::RateLimitExceeded {
                attempts: retry + 1,
            });
        }

        let delay = policy.backoff_for(retry);
        tracing::warn!(
            attempt = retry + 1,
            max_retries = policy.max_retries,
            delay_ms = millis(delay),
            status = %signal,
            "places API rate limited, retrying after backoff"
        );
        pause(cancel, delay).await?;
        retry += 1;
    }
}

/// Like [`fetch_envelope`], but any status other than `OK` / `ZERO_RESULTS`
/// becomes a terminal [`PlacesError::Provider`].
///
/// # Errors
///
/// Everything [`fetch_envelope`] returns, plus [`PlacesError::Provider`].
pub async fn fetch_ok<F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    operation: F,
) -> Result<Envelope, PlacesError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<serde_json::Value, PlacesError>>,
{
    fetch_envelope(policy, cancel, operation)
        .await?
        .ensure_success()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use tokio::time::Instant;

    use super::*;
    use crate::types::ApiStatus;

    fn status(s: &str) -> serde_json::Value {
        json!({ "status": s, "results": [] })
    }

    /// Serves `rate_limited` rate-limit envelopes, then `OK`, recording when
    /// each call happened.
    fn scripted(
        rate_limited: u32,
        calls: Arc<AtomicU32>,
        times: Arc<Mutex<Vec<Instant>>>,
    ) -> impl FnMut() -> std::future::Ready<Result<serde_json::Value, PlacesError>> {
        move || {
            times.lock().unwrap().push(Instant::now());
            let n = calls.fetch_add(1, Ordering::SeqCst);
            let body = if n < rate_limited {
                status("OVER_QUERY_LIMIT")
            } else {
                status("OK")
            };
            std::future::ready(Ok(body))
        }
    }

    #[test]
    fn default_policy_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.backoff_for(0), Duration::from_millis(300));
        assert_eq!(policy.backoff_for(1), Duration::from_millis(600));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(1200));
    }

    #[test]
    fn backoff_saturates_instead_of_overflowing() {
        let policy = RetryPolicy::new(100, Duration::from_secs(u64::MAX / 2));
        assert_eq!(policy.backoff_for(90), Duration::MAX);
    }

    #[tokio::test]
    async fn succeeds_immediately_on_ok() {
        let calls = Arc::new(AtomicU32::new(0));
        let times = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();
        let envelope = fetch_envelope(
            RetryPolicy::default(),
            &cancel,
            scripted(0, Arc::clone(&calls), times),
        )
        .await
        .expect("should succeed");
        assert_eq!(envelope.status, ApiStatus::Ok);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn two_rate_limits_then_ok_succeeds_with_doubling_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let times = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();
        let policy = RetryPolicy::default();

        let envelope = fetch_envelope(
            policy,
            &cancel,
            scripted(2, Arc::clone(&calls), Arc::clone(&times)),
        )
        .await
        .expect("third attempt should succeed");

        assert_eq!(envelope.status, ApiStatus::Ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let times = times.lock().unwrap();
        assert_eq!(times[1] - times[0], Duration::from_millis(300));
        assert_eq!(times[2] - times[1], Duration::from_millis(600));
        // The backoff carried into the third call is four times the first.
        assert_eq!(policy.backoff_for(2), policy.backoff_for(0) * 4);
    }

    #[tokio::test(start_paused = true)]
    async fn four_rate_limits_exhaust_three_retries() {
        let calls = Arc::new(AtomicU32::new(0));
        let times = Arc::new(Mutex::new(Vec::new()));
        let cancel = CancellationToken::new();

        let result = fetch_envelope(
            RetryPolicy::default(),
            &cancel,
            scripted(4, Arc::clone(&calls), times),
        )
        .await;

        assert!(
            matches!(result, Err(PlacesError::RateLimitExceeded { attempts: 4 })),
            "expected RateLimitExceeded, got {result:?}"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn resource_exhausted_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let cancel = CancellationToken::new();
        let result = fetch_envelope(RetryPolicy::new(1, Duration::ZERO), &cancel, || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Ok(status("RESOURCE_EXHAUSTED"))
                } else {
                    Ok(status("ZERO_RESULTS"))
                }
            }
        })
        .await;
        assert_eq!(result.unwrap().status, ApiStatus::ZeroResults);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn http_429_is_treated_as_rate_limit() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let cancel = CancellationToken::new();
        let result = fetch_envelope(RetryPolicy::new(2, Duration::ZERO), &cancel, || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err::<serde_json::Value, _>(PlacesError::Throttled) }
        })
        .await;
        assert!(matches!(
            result,
            Err(PlacesError::RateLimitExceeded { attempts: 3 })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn other_statuses_are_returned_without_retry() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let cancel = CancellationToken::new();
        let envelope = fetch_envelope(RetryPolicy::default(), &cancel, || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Ok(status("INVALID_REQUEST")) }
        })
        .await
        .expect("envelope should be handed back");
        assert_eq!(envelope.status, ApiStatus::InvalidRequest);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fetch_ok_turns_error_status_into_provider_error() {
        let cancel = CancellationToken::new();
        let result = fetch_ok(RetryPolicy::default(), &cancel, || async {
            Ok(json!({"status": "REQUEST_DENIED", "error_message": "bad key"}))
        })
        .await;
        match result {
            Err(PlacesError::Provider { status, message }) => {
                assert_eq!(status, "REQUEST_DENIED");
                assert_eq!(message.as_deref(), Some("bad key"));
            }
            other => panic!("expected Provider error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deserialize_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);
        let cancel = CancellationToken::new();
        let result = fetch_envelope(RetryPolicy::default(), &cancel, || {
            c.fetch_add(1, Ordering::SeqCst);
            async {
                let e = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
                Err::<serde_json::Value, _>(PlacesError::Deserialize {
                    context: "test".to_owned(),
                    source: e,
                })
            }
        })
        .await;
        assert!(matches!(result, Err(PlacesError::Deserialize { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = fetch_envelope(
            RetryPolicy::new(3, Duration::from_secs(10)),
            &cancel,
            || async { Ok(status("OVER_QUERY_LIMIT")) },
        )
        .await;

        assert!(matches!(result, Err(PlacesError::Cancelled)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn pause_returns_immediately_when_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = pause(&cancel, Duration::from_secs(3600)).await;
        assert!(matches!(result, Err(PlacesError::Cancelled)));
    }
}
