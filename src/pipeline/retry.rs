//! Bounded, fixed-delay retry for pipeline stages.
//!
//! A stage is re-executed from scratch on every attempt; nothing from a
//! failed attempt is carried into the next one.

use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tracing::{debug, error, warn};

use super::Stage;
use crate::constants::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_SECS};
use crate::error::{EtlError, Result};

/// How many times a stage may run and how long to wait between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Fixed pause between consecutive attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Policy without waits, for tests and dry runs
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO)
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the policy's attempt budget is spent.
///
/// Returns the value together with the number of attempts it took. Any
/// terminal failure is wrapped in [`EtlError::StageFailed`] so the caller
/// can tell which stage gave up.
pub async fn retry_stage<T, F, Fut, P>(
    policy: &RetryPolicy,
    stage: Stage,
    is_retryable: P,
    mut operation: F,
) -> Result<(T, u32)>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&EtlError) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        counter!("etl_stage_attempts_total", "stage" => stage.as_str()).increment(1);
        debug!("Running stage '{}' (attempt {}/{})", stage, attempt, max_attempts);

        match operation(attempt).await {
            Ok(value) => return Ok((value, attempt)),
            Err(err) => {
                if !is_retryable(&err) {
                    error!("Stage '{}' hit a non-retryable error: {}", stage, err);
                    counter!("etl_stage_failures_total", "stage" => stage.as_str()).increment(1);
                    return Err(EtlError::StageFailed {
                        stage,
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }

                if attempt >= max_attempts {
                    error!(
                        "Stage '{}' exhausted {} attempt(s), last error: {}",
                        stage, attempt, err
                    );
                    counter!("etl_stage_failures_total", "stage" => stage.as_str()).increment(1);
                    return Err(EtlError::StageFailed {
                        stage,
                        attempts: attempt,
                        source: Box::new(err),
                    });
                }

                warn!(
                    "Stage '{}' failed (attempt {}/{}), retrying after {:?}: {}",
                    stage, attempt, max_attempts, policy.delay, err
                );
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }
}
