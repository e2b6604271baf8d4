// Copyright 2024-Present Kegcore Contributors
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// The three-way error taxonomy every manager that talks to the backend
/// discriminates on: transient failures are retried or skipped depending
/// on the caller, not-found failures mean the resource does not exist
/// upstream, and everything else is an unexpected, logged-only failure.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("connection to backend failed: {0}")]
    Transient(String),

    #[error("timed out waiting for backend")]
    TimedOut,

    #[error("backend reported {what} as not found")]
    NotFound { what: String },

    #[error("backend rejected request: {status} {body}")]
    RequestFailed { status: u16, body: String },

    #[error("backend returned malformed response: {0}")]
    Malformed(String),

    #[error("backend client misconfigured: {0}")]
    InvalidConfig(String),
}

impl BackendError {
    /// True for errors worth retrying later (network blips, 5xx). Mirrors
    /// the `is_retryable` classification used by this codebase's HTTP
    /// retry layer, specialized to the three-way taxonomy §7 requires.
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Transient(_) | BackendError::TimedOut => true,
            BackendError::RequestFailed { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound { .. })
            || matches!(self, BackendError::RequestFailed { status: 404, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_and_timeout_are_transient() {
        assert!(BackendError::Transient("refused".into()).is_transient());
        assert!(BackendError::TimedOut.is_transient());
    }

    #[test]
    fn server_error_status_is_transient() {
        assert!(BackendError::RequestFailed {
            status: 503,
            body: "unavailable".into()
        }
        .is_transient());
    }

    #[test]
    fn not_found_status_is_not_transient_but_is_not_found() {
        let err = BackendError::RequestFailed {
            status: 404,
            body: "no such meter".into(),
        };
        assert!(!err.is_transient());
        assert!(err.is_not_found());
    }

    #[test]
    fn invalid_config_is_neither() {
        let err = BackendError::InvalidConfig("missing api key".into());
        assert!(!err.is_transient());
        assert!(!err.is_not_found());
    }
}
