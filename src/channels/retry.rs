use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

/// How long to wait between attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    Fixed(Duration),
    /// Doubles each attempt, capped at `max`.
    Exponential { initial: Duration, max: Duration },
}

/// Bounded retry with backoff, injected into the chat channel so call sites
/// never hand-roll their own sleep loops.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Delay after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::Fixed(d) => *d,
            Backoff::Exponential { initial, max } => {
                let shift = attempt.saturating_sub(1).min(16);
                let scaled = initial.saturating_mul(1u32 << shift);
                std::cmp::min(scaled, *max)
            }
        }
    }

    /// Run `op` until it succeeds or attempts run out. The last error is
    /// returned; every failure is logged with the attempt number.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(what, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!(what, attempt, max = self.max_attempts, "Attempt failed: {}", e);
                    if attempt >= self.max_attempts {
                        return Err(e);
                    }
                    let delay = self.delay_for(attempt);
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Backoff::Fixed(Duration::from_secs(5)))
    }
}
