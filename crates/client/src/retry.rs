//! Retry policy, backoff and the retry scheduler port.
//!
//! Delays grow exponentially (`base * 2^(attempt-1)`), are capped, and get a
//! symmetric random jitter. Waiting happens through [`RetryScheduler`] so
//! tests can substitute a fake clock.

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::remote::RemoteError;

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// Jitter factor (0.0-1.0): delays vary by up to this fraction either way.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Create a policy with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Un-jittered delay before retry number `attempt` (1-indexed).
    pub fn base_delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base_ms = self.base_delay.as_millis() as f64;
        let max_ms = self.max_delay.as_millis() as f64;
        let exp = 2_f64.powi(attempt.saturating_sub(1).min(62) as i32);

        Duration::from_millis((base_ms * exp).min(max_ms) as u64)
    }

    /// Apply jitter to `delay`; `unit` is a sample from `[-1.0, 1.0]`.
    pub fn jittered(&self, delay: Duration, unit: f64) -> Duration {
        let unit = unit.clamp(-1.0, 1.0);
        let delay_ms = delay.as_millis() as f64;
        let offset = delay_ms * self.jitter * unit;
        Duration::from_millis((delay_ms + offset).max(0.0).round() as u64)
    }

    /// Jittered delay before retry number `attempt`.
    pub fn delay_for_attempt<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let unit = rng.gen_range(-1.0..=1.0);
        self.jittered(self.base_delay_for_attempt(attempt), unit)
    }

    /// Check if another attempt is allowed after `attempt` attempts.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Waits before a retry.
#[async_trait]
pub trait RetryScheduler: Send + Sync {
    /// Resolve once retry number `attempt` (1 = first retry) may run.
    async fn schedule_retry(&self, attempt: u32);
}

/// Real scheduler: sleeps the jittered backoff delay on the tokio timer.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler {
    policy: RetryPolicy,
}

impl TokioScheduler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl RetryScheduler for TokioScheduler {
    async fn schedule_retry(&self, attempt: u32) {
        let delay = {
            let mut rng = rand::thread_rng();
            self.policy.delay_for_attempt(attempt, &mut rng)
        };
        tracing::debug!(attempt, ?delay, "waiting before retry");
        tokio::time::sleep(delay).await;
    }
}

/// Fake-clock scheduler: records each requested retry and its un-jittered
/// delay, advancing a virtual clock instead of sleeping.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    policy: RetryPolicy,
    requests: Mutex<Vec<(u32, Duration)>>,
}

impl ManualScheduler {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Attempt numbers requested so far.
    pub fn attempts(&self) -> Vec<u32> {
        self.requests
            .lock()
            .map(|r| r.iter().map(|(a, _)| *a).collect())
            .unwrap_or_default()
    }

    /// Total virtual time spent waiting.
    pub fn elapsed(&self) -> Duration {
        self.requests
            .lock()
            .map(|r| r.iter().map(|(_, d)| *d).sum())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RetryScheduler for ManualScheduler {
    async fn schedule_retry(&self, attempt: u32) {
        let delay = self.policy.base_delay_for_attempt(attempt);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((attempt, delay));
        }
    }
}

/// Run `op`, retrying transient failures per `policy`.
///
/// Permanent errors are returned immediately; transient ones are returned
/// once `policy.max_attempts` attempts have been made.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    scheduler: &dyn RetryScheduler,
    what: &str,
    mut op: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!("{what} succeeded after {} retries", attempt - 1);
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && policy.should_retry(attempt) => {
                tracing::warn!("{what} failed on attempt {attempt}: {err}, retrying");
                scheduler.schedule_retry(attempt).await;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::error!("{what} failed after {attempt} attempts: {err}");
                }
                return Err(err);
            }
        }
    }
}
