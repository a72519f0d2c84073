//! Exponential-backoff retry for transient remote errors.
//!
//! The policy only looks at the error's message, never at request or
//! response shapes, so it wraps any remote call. Async and blocking calls
//! go through the same decision logic.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

pub const MAX_RETRIES: u32 = 3;
/// Doubles on every retry: 1s, 2s, 4s
pub const INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Substrings (lowercase) that mark a rate-limit or quota failure
pub const TRANSIENT_ERROR_TOKENS: &[&str] = &[
    "429",
    "quota",
    "rate limit",
    "resource_exhausted",
    "too many requests",
];

pub fn is_transient(message: &str) -> bool {
    let message = message.to_lowercase();
    TRANSIENT_ERROR_TOKENS
        .iter()
        .any(|token| message.contains(token))
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    classifier: fn(&str) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            base_delay: INITIAL_DELAY,
            classifier: is_transient,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            ..Self::default()
        }
    }

    pub fn with_classifier(mut self, classifier: fn(&str) -> bool) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Delay before retry number `attempt + 1`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    fn next_delay<E: Display>(&self, operation: &str, error: &E, attempt: u32) -> Option<Duration> {
        if attempt >= self.max_retries || !(self.classifier)(&error.to_string()) {
            return None;
        }

        let delay = self.delay_for(attempt);
        warn!(
            operation,
            retry = attempt + 1,
            max_retries = self.max_retries,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Rate limited, backing off before retry"
        );
        Some(delay)
    }

    /// Run an async operation, retrying transient failures.
    /// Non-transient errors and the error after the last retry are returned as-is.
    pub async fn call<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => match self.next_delay(operation, &error, attempt) {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(error),
                },
            }
        }
    }

    /// Blocking counterpart of [`RetryPolicy::call`]; sleeps the current thread.
    pub fn call_blocking<T, E, F>(&self, operation: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
    {
        self.call_blocking_with_sleep(operation, op, std::thread::sleep)
    }

    pub fn call_blocking_with_sleep<T, E, F, S>(&self, operation: &str, mut op: F, mut sleep: S) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        S: FnMut(Duration),
        E: Display,
    {
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(error) => match self.next_delay(operation, &error, attempt) {
                    Some(delay) => {
                        sleep(delay);
                        attempt += 1;
                    }
                    None => return Err(error),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use tokio::time::Instant;

    #[test]
    fn test_classifier_tokens() {
        assert!(is_transient("Gemini API error 429: slow down"));
        assert!(is_transient("Quota exceeded for project"));
        assert!(is_transient("RESOURCE_EXHAUSTED"));
        assert!(is_transient("Rate Limit reached"));
        assert!(is_transient("HTTP 503 Too Many Requests"));
        assert!(!is_transient("invalid API key"));
        assert!(!is_transient("500 internal error"));
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_succeeds_after_two_transient_errors() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let attempt_times = Mutex::new(Vec::new());
        let start = Instant::now();

        let result: Result<&str, String> = policy
            .call("generate", || {
                attempt_times.lock().unwrap().push(start.elapsed());
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err("429 Too Many Requests".to_string())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let times = attempt_times.lock().unwrap().clone();
        assert_eq!(times[0], Duration::ZERO);
        assert_eq!(times[1], Duration::from_secs(1));
        assert_eq!(times[2], Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_non_transient_fails_immediately() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), String> = policy
            .call("generate", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("invalid API key".to_string()) }
            })
            .await;

        assert_eq!(result, Err("invalid API key".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_async_budget_exhaustion_returns_last_error() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<(), String> = policy
            .call("generate", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move { Err(format!("quota exceeded (attempt {})", n)) }
            })
            .await;

        assert_eq!(result, Err("quota exceeded (attempt 3)".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }

    #[test]
    fn test_blocking_path_uses_same_schedule() {
        let policy = RetryPolicy::default();
        let calls = Cell::new(0);
        let mut sleeps = Vec::new();

        let result: Result<u32, String> = policy.call_blocking_with_sleep(
            "generate",
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err("rate limit".to_string())
                } else {
                    Ok(calls.get())
                }
            },
            |d| sleeps.push(d),
        );

        assert_eq!(result, Ok(3));
        assert_eq!(sleeps, vec![Duration::from_secs(1), Duration::from_secs(2)]);
    }

    #[test]
    fn test_blocking_non_transient_does_not_sleep() {
        let policy = RetryPolicy::default();
        let mut sleeps = Vec::new();

        let result: Result<(), String> =
            policy.call_blocking_with_sleep("generate", || Err("bad request".to_string()), |d| sleeps.push(d));

        assert!(result.is_err());
        assert!(sleeps.is_empty());
    }

    #[test]
    fn test_custom_classifier() {
        let policy = RetryPolicy::new(1, Duration::from_millis(1)).with_classifier(|m| m.contains("flaky"));
        let calls = Cell::new(0);

        let result: Result<(), String> = policy.call_blocking("op", || {
            calls.set(calls.get() + 1);
            Err("flaky backend".to_string())
        });

        assert!(result.is_err());
        assert_eq!(calls.get(), 2);
    }
}
