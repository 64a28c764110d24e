use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;

const MAX_DELAY: Duration = Duration::from_secs(30);

/// One failed fetch attempt. `retryable` decides whether the retry loop keeps
/// going; `retry_after` carries a server-provided wait when the response had a
/// numeric `Retry-After` header.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub reason: String,
    pub status: Option<u16>,
    pub retryable: bool,
    pub retry_after: Option<Duration>,
}

impl FetchFailure {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            status: None,
            retryable: true,
            retry_after: None,
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            status: None,
            retryable: false,
            retry_after: None,
        }
    }

    pub fn from_status(status: u16, retry_after: Option<Duration>) -> Self {
        Self {
            reason: format!("http status {status}"),
            status: Some(status),
            retryable: is_transient_status(status),
            retry_after,
        }
    }
}

/// 429 and 5xx are worth another attempt; everything else fails fast.
pub fn is_transient_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

/// Exponential backoff parameters for one fetch contract. One instance is
/// shared by every table fetch in a session.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based), capped, with
    /// optional +/-25% jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let raw = self.base_delay.mul_f64(self.multiplier.powi(exponent));
        let capped = raw.min(MAX_DELAY);
        if self.jitter {
            let factor = rand::thread_rng().gen_range(0.75..=1.25);
            capped.mul_f64(factor)
        } else {
            capped
        }
    }
}

/// Run `op` until it succeeds, returns a non-retryable failure, or the policy
/// is exhausted. The op receives the 1-based attempt number. A server-provided
/// `Retry-After` overrides the computed backoff.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, FetchFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchFailure>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(failure) => {
                if !failure.retryable || attempt >= policy.max_attempts {
                    return Err(failure);
                }
                let wait = failure.retry_after.unwrap_or_else(|| policy.delay_for(attempt));
                sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::ZERO,
            multiplier: 2.0,
            jitter: false,
        }
    }

    #[tokio::test]
    async fn persistent_500_stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(), |_| {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Err(FetchFailure::from_status(500, None)) }
        })
        .await;
        let failure = result.unwrap_err();
        assert_eq!(failure.status, Some(500));
        assert_eq!(calls.load(Ordering::Relaxed), 4);
    }

    #[tokio::test]
    async fn not_found_fails_without_retry() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(), |_| {
            calls.fetch_add(1, Ordering::Relaxed);
            async { Err(FetchFailure::from_status(404, None)) }
        })
        .await;
        assert!(!result.unwrap_err().retryable);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(), |attempt| {
            calls.fetch_add(1, Ordering::Relaxed);
            async move {
                if attempt < 3 {
                    Err(FetchFailure::transient("connection reset"))
                } else {
                    Ok("payload")
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), "payload");
        assert_eq!(calls.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn transient_status_classification() {
        assert!(is_transient_status(429));
        assert!(is_transient_status(500));
        assert!(is_transient_status(503));
        assert!(!is_transient_status(404));
        assert!(!is_transient_status(400));
        assert!(!is_transient_status(200));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            jitter: false,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(30), MAX_DELAY);
    }

    #[test]
    fn jitter_stays_in_band() {
        let policy = RetryPolicy {
            jitter: true,
            base_delay: Duration::from_millis(400),
            multiplier: 2.0,
            max_attempts: 4,
        };
        for _ in 0..50 {
            let d = policy.delay_for(1);
            assert!(d >= Duration::from_millis(300), "{d:?}");
            assert!(d <= Duration::from_millis(500), "{d:?}");
        }
    }
}
