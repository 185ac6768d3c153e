/// Why artwork could not be turned into a [`crate::NormalizedImage`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("thumbnail request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("thumbnail request returned HTTP {status}")]
    Status { status: u16 },

    #[error("thumbnail body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("{message}")]
    Image { message: String },
}

impl Error {
    #[must_use]
    pub fn status(status: u16) -> Self {
        Self::Status { status }
    }

    #[must_use]
    pub fn too_large(limit: usize) -> Self {
        Self::TooLarge { limit }
    }
}

impl tunepress_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Image { message }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

tunepress_common::impl_context!();
