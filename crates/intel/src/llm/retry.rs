use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::llm::provider::GenerationError;

/// Bounded retry schedule with an injected delay function, so tests can
/// substitute a zero-delay clock.
pub struct RetryPolicy {
    pub max_attempts: u32,
    delay_for: Box<dyn Fn(u32) -> Duration + Send + Sync>,
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        delay_for: impl Fn(u32) -> Duration + Send + Sync + 'static,
    ) -> Self {
        Self {
            max_attempts,
            delay_for: Box::new(delay_for),
        }
    }

    /// Three attempts, exponential backoff plus jitter.
    pub fn standard() -> Self {
        Self::new(3, |attempt| {
            let jitter_ms = rand::thread_rng().gen_range(0..250);
            Duration::from_secs(2_u64.pow(attempt)) + Duration::from_millis(jitter_ms)
        })
    }

    /// Zero-delay schedule for tests.
    pub fn immediate() -> Self {
        Self::new(3, |_| Duration::ZERO)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        (self.delay_for)(attempt)
    }
}

/// Runs `op` until it succeeds, fails permanently, or exhausts the
/// transient-retry budget. Only errors the provider classifies as
/// transient are retried.
pub async fn with_retries<T, F, Fut>(
    policy: &RetryPolicy,
    mut op: F,
) -> Result<T, GenerationError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GenerationError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < policy.max_attempts => {
                let wait = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    wait_ms = wait.as_millis() as u64,
                    "transient generation failure: {error}; retrying"
                );
                tokio::time::sleep(wait).await;
            }
            Err(error) => return Err(error),
        }
    }
}
