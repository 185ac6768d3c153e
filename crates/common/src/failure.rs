//! Failure taxonomy shared by the acquisition pipeline, the job queue and the
//! HTTP surface.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Classification of a pipeline failure.
///
/// `Transient`, `UnsupportedFormat` and `Blocked` are absorbed by the acquirer
/// up to its attempt budget; they only reach callers as the `last_error` of an
/// exhausted acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// Search yielded nothing.
    NotFound,
    /// Metadata probe failed; never retried.
    MetadataProbeFailed,
    /// Anti-automation challenge from the media source.
    Blocked,
    /// Network error or timeout.
    Transient,
    /// The requested format token was rejected.
    UnsupportedFormat,
    /// Local I/O error while writing the container.
    PackagingFailed,
    /// Remote store rejected the upload or timed out.
    PublishFailed,
    /// Catalog write failed after a successful publish.
    CatalogWriteFailed,
    /// Malformed request (missing query, foreign URL).
    InvalidRequest,
}

impl FailureKind {
    /// Stable machine-readable code, also used as the prefix of job errors.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::NotFound => "notFound",
            Self::MetadataProbeFailed => "metadataProbeFailed",
            Self::Blocked => "blocked",
            Self::Transient => "transient",
            Self::UnsupportedFormat => "unsupportedFormat",
            Self::PackagingFailed => "packagingFailed",
            Self::PublishFailed => "publishFailed",
            Self::CatalogWriteFailed => "catalogWriteFailed",
            Self::InvalidRequest => "invalidRequest",
        }
    }

    /// Whether the failure was caused by the caller's input.
    #[must_use]
    pub fn is_client_error(self) -> bool {
        matches!(self, Self::NotFound | Self::InvalidRequest)
    }

    /// Whether retrying later may succeed without changing the input.
    #[must_use]
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Blocked | Self::Transient)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}
