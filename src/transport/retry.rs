use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::error::{DriverError, ErrorKind};

type RetryPredicate = Arc<dyn Fn(ErrorKind) -> bool + Send + Sync>;

/// Bounded or unbounded retry with a fixed delay.
///
/// `max_retries` counts retries after the first attempt, so `Some(n)` makes at
/// most `n + 1` attempts. Only kinds accepted by the predicate are retried;
/// the default accepts `ConnectionFailure` alone.
#[derive(Clone)]
pub struct Retrier {
    max_retries: Option<u32>,
    delay: Duration,
    retry_on: RetryPredicate,
}

impl Retrier {
    pub fn new(max_retries: Option<u32>, delay: Duration) -> Self {
        Self {
            max_retries,
            delay,
            retry_on: Arc::new(|kind| kind == ErrorKind::ConnectionFailure),
        }
    }

    pub fn unbounded(delay: Duration) -> Self {
        Self::new(None, delay)
    }

    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(ErrorKind) -> bool + Send + Sync + 'static,
    {
        self.retry_on = Arc::new(predicate);
        self
    }

    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn is_retryable(&self, kind: ErrorKind) -> bool {
        (self.retry_on)(kind)
    }

    /// Run `op` until it succeeds, fails with a non-retryable kind, or the
    /// retries are used up. The last failure is returned unchanged.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, DriverError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, DriverError>>,
    {
        let mut retries = 0u32;
        loop {
            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let exhausted = self.max_retries.is_some_and(|max| retries >= max);
            if exhausted || !self.is_retryable(err.kind()) {
                return Err(err);
            }

            retries += 1;
            warn!(
                attempt = retries,
                max_retries = ?self.max_retries,
                delay_ms = self.delay.as_millis() as u64,
                error = %err,
                "retrying after failure"
            );
            tokio::time::sleep(self.delay).await;
        }
    }
}

impl fmt::Debug for Retrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retrier")
            .field("max_retries", &self.max_retries)
            .field("delay", &self.delay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
