// Copyright 2026 OMMS Harvest Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types raised by remote sessions and the retry layer.

use std::time::Duration;

/// Failures reported by a [`RemoteSession`](crate::session::RemoteSession).
///
/// Only `Timeout`, `StaleElement` and `NotFound` are transient; everything
/// else means the session itself is unusable or the page is not what the
/// protocol expects.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("timed out after {}ms waiting for {what}", .after.as_millis())]
    Timeout { what: String, after: Duration },

    #[error("stale element: {0}")]
    StaleElement(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("frame error: {0}")]
    Frame(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("browser launch failed: {0}")]
    Launch(String),

    #[error("session closed")]
    Closed,
}

impl SessionError {
    /// Whether the error is one of the recognised transient kinds.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SessionError::Timeout { .. } | SessionError::StaleElement(_) | SessionError::NotFound(_)
        )
    }

    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        SessionError::Timeout {
            what: what.into(),
            after,
        }
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Outcome of a retried operation that did not succeed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: SessionError },

    #[error("non-retryable failure: {0}")]
    Fatal(SessionError),
}

impl RetryError {
    /// The session error that ended the retry loop.
    pub fn last_error(&self) -> &SessionError {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Fatal(e) => e,
        }
    }
}
