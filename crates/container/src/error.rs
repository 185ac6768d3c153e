use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("container too short: {len} bytes")]
    TooShort { len: usize },

    #[error("bad magic: expected M3EW, found {found:?}")]
    BadMagic { found: [u8; 4] },

    #[error("metadata block of {len} bytes exceeds the 4-byte length field")]
    MetadataTooLarge { len: usize },

    #[error("metadata block truncated: header declares {declared} bytes, {available} available")]
    TruncatedMetadata { declared: usize, available: usize },

    #[error("missing {marker} marker")]
    MissingMarker { marker: &'static str },

    #[error("header version {header} does not match metadata version {metadata}")]
    VersionMismatch { header: u8, metadata: u8 },
}

impl Error {
    #[must_use]
    pub fn missing_marker(marker: &'static str) -> Self {
        Self::MissingMarker { marker }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
