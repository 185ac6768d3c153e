use std::fmt;

use {thiserror::Error, tunepress_common::FailureKind};

/// How a single source call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Network error, timeout or any unrecognized extractor failure.
    Transient,
    /// Explicit anti-automation or verification challenge.
    Blocked,
    /// The requested format token is not available for this media.
    UnsupportedFormat,
}

impl SourceErrorKind {
    pub fn failure_kind(self) -> FailureKind {
        match self {
            Self::Transient => FailureKind::Transient,
            Self::Blocked => FailureKind::Blocked,
            Self::UnsupportedFormat => FailureKind::UnsupportedFormat,
        }
    }
}

impl fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.failure_kind().fmt(f)
    }
}

/// Failure reported by a [`MediaSource`](crate::MediaSource) or
/// [`MediaSearch`](crate::MediaSearch).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct SourceError {
    pub kind: SourceErrorKind,
    pub message: String,
}

impl SourceError {
    #[must_use]
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Transient, message)
    }

    #[must_use]
    pub fn blocked(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Blocked, message)
    }

    #[must_use]
    pub fn unsupported_format(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::UnsupportedFormat, message)
    }

    pub fn is_blocked(&self) -> bool {
        self.kind == SourceErrorKind::Blocked
    }
}

/// Why an acquisition did not produce audio.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no results found for '{query}'")]
    NotFound { query: String },

    #[error("search failed: {0}")]
    SearchFailed(SourceError),

    #[error("metadata probe failed: {0}")]
    MetadataProbeFailed(SourceError),

    /// Every attempt in the budget failed. `blocked` is set when the final
    /// attempt hit an anti-automation challenge.
    #[error("all {attempts} attempts failed, last error: {last_error}")]
    AllStrategiesFailed {
        attempts: u32,
        last_error: SourceError,
        blocked: bool,
    },
}

impl AcquisitionError {
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidRequest(_) => FailureKind::InvalidRequest,
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::SearchFailed(e) => e.kind.failure_kind(),
            Self::MetadataProbeFailed(_) => FailureKind::MetadataProbeFailed,
            Self::AllStrategiesFailed { blocked: true, .. } => FailureKind::Blocked,
            Self::AllStrategiesFailed { .. } => FailureKind::Transient,
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_kind_follows_blocked_flag() {
        let blocked = AcquisitionError::AllStrategiesFailed {
            attempts: 3,
            last_error: SourceError::blocked("Sign in to confirm you're not a bot"),
            blocked: true,
        };
        assert_eq!(blocked.kind(), FailureKind::Blocked);
        assert!(blocked.kind().is_retryable());

        let transient = AcquisitionError::AllStrategiesFailed {
            attempts: 3,
            last_error: SourceError::transient("timed out"),
            blocked: false,
        };
        assert_eq!(transient.kind(), FailureKind::Transient);
        assert_eq!(
            transient.to_string(),
            "all 3 attempts failed, last error: transient: timed out"
        );
    }

    #[test]
    fn client_errors() {
        assert!(
            AcquisitionError::NotFound { query: "x".into() }
                .kind()
                .is_client_error()
        );
        assert!(
            AcquisitionError::invalid_request("no query")
                .kind()
                .is_client_error()
        );
        assert!(
            !AcquisitionError::MetadataProbeFailed(SourceError::transient("boom"))
                .kind()
                .is_client_error()
        );
    }
}
