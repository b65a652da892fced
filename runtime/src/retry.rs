// Copyright 2026 OMMS Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Layered retry policy shared by navigation, selection and extraction.
//!
//! A policy names which error kinds it retries, how many attempts it allows
//! and the uniform backoff window between attempts. Call sites own their loop
//! and hand each failure to [`RetryState::failed`], which either sleeps and
//! lets the loop continue or ends it with a [`RetryError`]:
//!
//! ```ignore
//! let mut retry = policy.begin("navigation");
//! loop {
//!     match attempt(session).await {
//!         Ok(v) => break Ok(v),
//!         Err(e) => retry.failed(e).await?,
//!     }
//! }
//! ```

use crate::error::{RetryError, SessionError};
use anyhow::{bail, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Which session errors a policy treats as retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryOn {
    /// Only timeouts, stale elements and missing elements.
    Transient,
    /// Every session error.
    Any,
}

/// Attempt bound and backoff distribution for one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_min_ms: u64,
    pub backoff_max_ms: u64,
    pub retry_on: RetryOn,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_min_ms: u64, backoff_max_ms: u64, retry_on: RetryOn) -> Self {
        Self {
            max_attempts,
            backoff_min_ms,
            backoff_max_ms,
            retry_on,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.backoff_min_ms > self.backoff_max_ms {
            bail!(
                "backoff range is inverted: {}ms > {}ms",
                self.backoff_min_ms,
                self.backoff_max_ms
            );
        }
        Ok(())
    }

    /// Whether `err` may be retried under this policy.
    pub fn retries(&self, err: &SessionError) -> bool {
        match self.retry_on {
            RetryOn::Transient => err.is_transient(),
            RetryOn::Any => true,
        }
    }

    /// Draw one backoff delay.
    pub fn backoff(&self) -> Duration {
        uniform_delay(self.backoff_min_ms, self.backoff_max_ms)
    }

    /// Start tracking attempts for one retried operation.
    pub fn begin(&self, what: impl Into<String>) -> RetryState<'_> {
        RetryState {
            policy: self,
            what: what.into(),
            attempts: 0,
        }
    }
}

/// Attempt counter for one retried operation.
#[derive(Debug)]
pub struct RetryState<'a> {
    policy: &'a RetryPolicy,
    what: String,
    attempts: u32,
}

impl RetryState<'_> {
    /// Record a failed attempt.
    ///
    /// Returns `Ok(())` after sleeping the backoff when another attempt is
    /// allowed. Never sleeps after the final attempt.
    pub async fn failed(&mut self, err: SessionError) -> Result<(), RetryError> {
        self.attempts += 1;
        if !self.policy.retries(&err) {
            return Err(RetryError::Fatal(err));
        }
        if self.attempts >= self.policy.max_attempts {
            return Err(RetryError::Exhausted {
                attempts: self.attempts,
                last: err,
            });
        }
        warn!(
            "{} attempt {} failed: {err}. Retrying...",
            self.what, self.attempts
        );
        let delay = self.policy.backoff();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }

    /// Number of failed attempts recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// A delay drawn uniformly from `[min_ms, max_ms]`.
pub fn uniform_delay(min_ms: u64, max_ms: u64) -> Duration {
    if min_ms >= max_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found() -> SessionError {
        SessionError::NotFound("//select".into())
    }

    #[tokio::test]
    async fn test_exhausts_after_max_attempts() {
        let policy = RetryPolicy::new(3, 0, 0, RetryOn::Transient);
        let mut retry = policy.begin("select");

        assert!(retry.failed(not_found()).await.is_ok());
        assert!(retry.failed(not_found()).await.is_ok());
        let err = retry.failed(not_found()).await.unwrap_err();

        assert_eq!(retry.attempts(), 3);
        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_single_attempt_policy_never_retries() {
        let policy = RetryPolicy::new(1, 0, 0, RetryOn::Any);
        let mut retry = policy.begin("fetch");
        let err = retry.failed(SessionError::Closed).await.unwrap_err();
        assert!(matches!(err, RetryError::Exhausted { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_transient_policy_stops_on_fatal_error() {
        let policy = RetryPolicy::new(3, 0, 0, RetryOn::Transient);
        let mut retry = policy.begin("navigation");
        let err = retry
            .failed(SessionError::Script("target closed".into()))
            .await
            .unwrap_err();
        assert_eq!(err, RetryError::Fatal(SessionError::Script("target closed".into())));
        assert_eq!(retry.attempts(), 1);
    }

    #[tokio::test]
    async fn test_any_policy_retries_everything() {
        let policy = RetryPolicy::new(2, 0, 0, RetryOn::Any);
        let mut retry = policy.begin("fetch");
        assert!(retry.failed(SessionError::Frame("detached".into())).await.is_ok());
        let err = retry.failed(SessionError::Closed).await.unwrap_err();
        assert_eq!(err.last_error(), &SessionError::Closed);
    }

    #[test]
    fn test_backoff_within_range() {
        let policy = RetryPolicy::new(3, 2_000, 5_000, RetryOn::Any);
        for _ in 0..100 {
            let d = policy.backoff();
            assert!(d >= Duration::from_millis(2_000) && d <= Duration::from_millis(5_000));
        }
    }

    #[test]
    fn test_uniform_delay_degenerate_range() {
        assert_eq!(uniform_delay(0, 0), Duration::ZERO);
        assert_eq!(uniform_delay(3_000, 3_000), Duration::from_secs(3));
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::new(0, 0, 0, RetryOn::Any).validate().is_err());
        assert!(RetryPolicy::new(3, 5, 1, RetryOn::Any).validate().is_err());
        assert!(RetryPolicy::new(3, 1, 5, RetryOn::Any).validate().is_ok());
    }
}
