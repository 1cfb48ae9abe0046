use std::{future::Future, time::Duration};

use tracing::warn;

use crate::token_bucket::TokenBucket;

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// `base_delay × 2^attempt`, where attempt 0 is the first retry.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Single gateway for upstream calls. Every request first takes a token from
/// the shared bucket, and gateway or rate limit failures are retried with
/// exponential backoff.
#[derive(Debug)]
pub struct FetchClient {
    bucket: TokenBucket,
    retry: RetryPolicy,
}

impl FetchClient {
    pub fn new(bucket: TokenBucket, retry: RetryPolicy) -> Self {
        Self { bucket, retry }
    }

    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }

    /// Runs `request` once a token is available. `request` is called again
    /// for every retry, so it must build a fresh request each time.
    pub async fn acquire_and_call<T, F, Fut>(&self, label: &str, request: F) -> crate::Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = crate::Result<T>>,
    {
        let mut attempt = 0;
        loop {
            self.bucket.acquire(label).await?;

            match request().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt + 1 < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    attempt += 1;
                    warn!(
                        label,
                        attempt,
                        ?delay,
                        error = %err,
                        "upstream asked to back off, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
