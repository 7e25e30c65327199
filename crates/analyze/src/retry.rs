use extract::AnalysisFailure;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            // The cap applies to the first delay too.
            initial_backoff: Duration::from_millis(initial_backoff_ms.min(max_backoff_ms)),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.initial_backoff_ms,
            config.max_backoff_ms,
        )
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Run `f` until it succeeds, fails terminally, or attempts run out.
    ///
    /// Rate limiting and network failures are retried with exponential backoff.
    /// An empty response is retried once; a second one is terminal. Everything
    /// else is returned on the first occurrence.
    pub async fn retry<F, Fut, T>(&self, operation_name: &str, mut f: F) -> Result<T, AnalysisFailure>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, AnalysisFailure>>,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;
        let mut empty_seen = false;

        loop {
            attempt += 1;
            match f().await {
                Ok(result) => {
                    if attempt > 1 {
                        info!(
                            operation = operation_name,
                            attempts = attempt,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(result);
                }
                Err(e) => {
                    let retryable = match &e {
                        AnalysisFailure::RateLimited(_) | AnalysisFailure::TransientNetwork(_) => true,
                        AnalysisFailure::EmptyResponse => !std::mem::replace(&mut empty_seen, true),
                        AnalysisFailure::AuthFailure(_) | AnalysisFailure::BackendError(_) => false,
                    };

                    if !retryable {
                        warn!(
                            operation = operation_name,
                            attempts = attempt,
                            failure = e.kind(),
                            error = %e,
                            "Operation failed with terminal error"
                        );
                        return Err(e);
                    }

                    if attempt >= self.max_attempts {
                        warn!(
                            operation = operation_name,
                            attempts = attempt,
                            failure = e.kind(),
                            error = %e,
                            "Operation failed after max attempts"
                        );
                        return Err(e);
                    }

                    let delay = self.with_jitter(backoff);
                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        max_attempts = self.max_attempts,
                        backoff_ms = delay.as_millis() as u64,
                        failure = e.kind(),
                        "Operation failed, retrying"
                    );

                    sleep(delay).await;

                    backoff = std::cmp::min(backoff * 2, self.max_backoff);
                }
            }
        }
    }

    /// Half the backoff is fixed, the other half random.
    fn with_jitter(&self, backoff: Duration) -> Duration {
        let ms = backoff.as_millis() as u64;
        if ms == 0 {
            return backoff;
        }
        let jittered = rand::thread_rng().gen_range(ms / 2..=ms);
        Duration::from_millis(jittered)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
