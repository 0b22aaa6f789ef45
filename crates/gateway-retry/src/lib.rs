//! Bounded exponential backoff with jitter for upstream calls (design §4.4).
//!
//! Unlike the rest of this workspace's resilience patterns, the retry
//! executor is a bare async function rather than a `tower::Service`: the
//! design's contract is `run(op, classify) -> result | final_error`, which
//! maps directly onto a retry loop around a request-producing closure.

use std::future::Future;
use std::time::{Duration, Instant};

/// How an error should be treated by the retry executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Worth another attempt (transient network failure, upstream 5xx/429, timeout).
    Retryable,
    /// Return immediately (client 4xx other than 429, auth failure, invalid input).
    Terminal,
}

/// The final error returned once retries are exhausted, a terminal error is
/// hit, or the deadline would be exceeded by the next wait.
#[derive(Debug, Clone)]
pub struct RetryOutcome<E> {
    pub error: E,
    pub attempts: usize,
}

/// Configuration for [`RetryExecutor`].
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Total attempts allowed, including the first (default 3).
    pub max_attempts: usize,
    /// Base backoff interval (default 1s).
    pub base: Duration,
    /// Maximum backoff interval before jitter is applied (default 60s).
    pub cap: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base: Duration::from_secs(1),
            cap: Duration::from_secs(60),
        }
    }
}

/// Wraps any asynchronous, fallible operation with bounded exponential
/// backoff and jitter, distinguishing retryable from terminal errors.
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Runs `op` until it succeeds, a terminal error occurs, attempts are
    /// exhausted, or `deadline` would be exceeded by the next wait.
    ///
    /// `op` is called again on each attempt (it must produce a fresh
    /// future each time, since futures aren't replayable). `classify`
    /// decides whether a given error is worth retrying.
    pub async fn run<F, Fut, T, E, C>(
        &self,
        deadline: Instant,
        mut op: F,
        classify: C,
    ) -> Result<T, RetryOutcome<E>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        C: Fn(&E) -> Classification,
    {
        let mut attempt = 0usize;

        loop {
            let result = op().await;
            let error = match result {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            attempt += 1;

            if classify(&error) == Classification::Terminal {
                tracing::debug!(attempt, "upstream error classified as terminal, not retrying");
                return Err(RetryOutcome {
                    error,
                    attempts: attempt,
                });
            }

            if attempt >= self.config.max_attempts {
                tracing::warn!(attempt, "retry attempts exhausted");
                return Err(RetryOutcome {
                    error,
                    attempts: attempt,
                });
            }

            let delay = self.backoff_delay(attempt - 1);
            if Instant::now() + delay > deadline {
                tracing::warn!(attempt, "deadline would be exceeded by retry wait, failing");
                return Err(RetryOutcome {
                    error,
                    attempts: attempt,
                });
            }

            tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, event = "retry_attempt");
            tokio::time::sleep(delay).await;
        }
    }

    fn backoff_delay(&self, k: usize) -> Duration {
        let exp = self.config.base.as_secs_f64() * 2f64.powi(k as i32);
        let capped = exp.min(self.config.cap.as_secs_f64());
        let jitter: f64 = rand::random::<f64>();
        Duration::from_secs_f64(capped * (1.0 + jitter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug, Clone)]
    struct TestError(&'static str);

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(3600)
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_without_retry() {
        let executor = RetryExecutor::new(RetryConfig {
            max_attempts: 3,
            base: Duration::from_millis(1),
            cap: Duration::from_millis(10),
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);

        let result = executor
            .run(
                far_deadline(),
                || {
                    let c = Arc::clone(&c);
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, TestError>("ok")
                    }
                },
                |_: &TestError| Classification::Retryable,
            )
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_then_succeeds() {
        // S4: fails twice with retryable, succeeds third.
        let executor = RetryExecutor::new(RetryConfig {
            max_attempts: 3,
            base: Duration::from_millis(1),
            cap: Duration::from_millis(10),
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);

        let result = executor
            .run(
                far_deadline(),
                || {
                    let c = Arc::clone(&c);
                    async move {
                        let n = c.fetch_add(1, Ordering::SeqCst);
                        if n < 2 {
                            Err(TestError("transient"))
                        } else {
                            Ok("ok")
                        }
                    }
                },
                |_: &TestError| Classification::Retryable,
            )
            .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn terminal_error_stops_immediately() {
        let executor = RetryExecutor::new(RetryConfig::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);

        let result = executor
            .run(
                far_deadline(),
                || {
                    let c = Arc::clone(&c);
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(TestError("bad request"))
                    }
                },
                |_: &TestError| Classification::Terminal,
            )
            .await;

        let outcome = result.unwrap_err();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausts_attempts_and_annotates_count() {
        let executor = RetryExecutor::new(RetryConfig {
            max_attempts: 3,
            base: Duration::from_millis(1),
            cap: Duration::from_millis(10),
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);

        let result = executor
            .run(
                far_deadline(),
                || {
                    let c = Arc::clone(&c);
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(TestError("always fails"))
                    }
                },
                |_: &TestError| Classification::Retryable,
            )
            .await;

        let outcome = result.unwrap_err();
        assert_eq!(outcome.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cuts_off_further_retries() {
        let executor = RetryExecutor::new(RetryConfig {
            max_attempts: 10,
            base: Duration::from_secs(10),
            cap: Duration::from_secs(60),
        });
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);

        // Deadline is far shorter than even one backoff interval.
        let deadline = Instant::now() + Duration::from_millis(1);

        let result = executor
            .run(
                deadline,
                || {
                    let c = Arc::clone(&c);
                    async move {
                        c.fetch_add(1, Ordering::SeqCst);
                        Err::<(), _>(TestError("slow upstream"))
                    }
                },
                |_: &TestError| Classification::Retryable,
            )
            .await;

        let outcome = result.unwrap_err();
        assert_eq!(outcome.attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
