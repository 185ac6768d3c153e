//! Capabilities the acquirer drives: search and the media source itself.

use std::path::Path;

use async_trait::async_trait;

use crate::{error::SourceError, info::MediaInfo, strategy::AcquisitionStrategy};

/// Parameters of one byte-acquisition call.
#[derive(Debug, Clone)]
pub struct AttemptPlan<'a> {
    pub strategy: &'a AcquisitionStrategy,
    pub user_agent: Option<&'a str>,
    pub format: &'a str,
}

/// Downloaded audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedAudio {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

#[async_trait]
pub trait MediaSearch: Send + Sync {
    /// URL of the single top result, or `None` when nothing matched.
    async fn search(&self, query: &str) -> Result<Option<String>, SourceError>;
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Fetch descriptive metadata without downloading media.
    async fn probe(&self, url: &str) -> Result<MediaInfo, SourceError>;

    /// Download the audio of `url` using `plan`. Intermediate files go under
    /// `scratch_dir`, which the caller owns and removes.
    async fn fetch_audio(
        &self,
        url: &str,
        plan: &AttemptPlan<'_>,
        scratch_dir: &Path,
    ) -> Result<FetchedAudio, SourceError>;
}
