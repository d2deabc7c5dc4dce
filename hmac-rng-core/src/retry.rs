//! Retry with exponential backoff, and a circuit breaker, for blocking
//! sources that reach over the network

use crate::Result;
use rand::Rng;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_backoff: Duration,
    /// Upper bound on any single delay
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays
    pub multiplier: f64,
    /// Add up to 25% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the `failed`-th failed attempt (1-based)
    pub fn backoff(&self, failed: u32) -> Duration {
        let exp = self.multiplier.powi(failed.saturating_sub(1) as i32);
        let millis = (self.initial_backoff.as_millis() as f64 * exp).min(self.max_backoff.as_millis() as f64);
        let delay = Duration::from_millis(millis as u64);

        if self.jitter {
            let spread = delay.as_millis() as u64 / 4;
            delay + Duration::from_millis(rand::thread_rng().gen_range(0..=spread))
        } else {
            delay
        }
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of attempts. Blocks the calling thread between attempts.
    pub fn execute<F, T>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            match operation() {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.backoff(attempt);
                    warn!(attempt, max = self.max_attempts, ?delay, "Attempt failed: {}", e);
                    sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Skips a failing source for `reset_timeout` once it has failed
/// `failure_threshold` times in a row
#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    reset_timeout: Duration,
    failures: u32,
    opened_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, reset_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            reset_timeout,
            failures: 0,
            opened_at: None,
        }
    }

    /// Whether calls should be skipped. An expired breaker closes again and
    /// lets the next call through.
    pub fn is_open(&mut self) -> bool {
        match self.opened_at {
            Some(at) if at.elapsed() < self.reset_timeout => true,
            Some(_) => {
                self.record_success();
                false
            }
            None => false,
        }
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
        self.opened_at = None;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
        if self.failures >= self.failure_threshold {
            self.opened_at = Some(Instant::now());
        }
    }
}
