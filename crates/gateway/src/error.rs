use {thiserror::Error, tunepress_acquire::AcquisitionError, tunepress_common::FailureKind};

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error("packaging failed: {message}")]
    Packaging { message: String },

    #[error("publish failed: {0}")]
    Publish(#[from] tunepress_publish::Error),

    #[error(transparent)]
    Queue(#[from] tunepress_queue::Error),

    #[error("not found: {what}")]
    NotFound { what: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn packaging(message: impl std::fmt::Display) -> Self {
        Self::Packaging {
            message: message.to_string(),
        }
    }

    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    /// Classification used for job errors and HTTP status codes.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InvalidRequest { .. } => FailureKind::InvalidRequest,
            Self::Acquisition(e) => e.kind(),
            Self::Packaging { .. } => FailureKind::PackagingFailed,
            Self::Publish(_) => FailureKind::PublishFailed,
            Self::NotFound { .. } => FailureKind::NotFound,
            Self::Queue(tunepress_queue::Error::JobNotFound { .. }) => FailureKind::NotFound,
            Self::Queue(tunepress_queue::Error::Message { .. }) => FailureKind::InvalidRequest,
            Self::Queue(_) | Self::Io(_) | Self::Sqlx(_) | Self::Message { .. } => {
                FailureKind::Transient
            },
        }
    }
}

impl tunepress_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

tunepress_common::impl_context!();

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, tunepress_acquire::SourceError};

    #[test]
    fn kinds_follow_the_failing_stage() {
        assert_eq!(
            Error::from(AcquisitionError::NotFound { query: "x".into() }).kind(),
            FailureKind::NotFound
        );
        assert_eq!(
            Error::from(AcquisitionError::AllStrategiesFailed {
                attempts: 3,
                last_error: SourceError::blocked("not a bot"),
                blocked: true,
            })
            .kind(),
            FailureKind::Blocked
        );
        assert_eq!(Error::packaging("disk full").kind(), FailureKind::PackagingFailed);
        assert_eq!(
            Error::from(tunepress_publish::Error::Timeout { secs: 600 }).kind(),
            FailureKind::PublishFailed
        );
        assert_eq!(Error::not_found("a.m3ew").kind(), FailureKind::NotFound);
    }
}
