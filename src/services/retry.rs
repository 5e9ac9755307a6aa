use std::future::Future;
use std::time::Duration;

/// Bounded retry with a fixed or growing delay between attempts
///
/// Attempts run strictly one after another: attempt N+1 starts only after
/// attempt N has failed and the delay has elapsed. The delay before attempt
/// N+1 is `delay * backoff_factor^(N-1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
            backoff_factor: if backoff_factor.is_finite() && backoff_factor > 0.0 {
                backoff_factor
            } else {
                1.0
            },
        }
    }

    /// Same delay before every retry
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self::new(max_attempts, delay, 1.0)
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        self.delay.mul_f64(self.backoff_factor.powi(exponent))
    }

    /// Runs `op` until it succeeds or attempts are exhausted
    ///
    /// `op` receives the 1-based attempt number. The error of the last
    /// attempt is returned when every attempt fails.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= max_attempts => {
                    tracing::warn!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        error = %e,
                        "All attempts failed"
                    );
                    return Err(e);
                }
                Err(e) => {
                    let wait = self.delay_after(attempt);
                    tracing::info!(
                        attempt = attempt,
                        max_attempts = max_attempts,
                        retry_in_ms = wait.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}
