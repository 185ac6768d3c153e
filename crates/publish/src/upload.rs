use std::time::Duration;

use tunepress_config::PublishConfig;

/// Transport chosen for one upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    Direct,
    Chunked { chunk_size: u64 },
}

/// Size threshold, chunk size and timeout applied to every upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Sizes at or below this go up in a single request.
    pub threshold_bytes: u64,
    pub chunk_size_bytes: u64,
    pub timeout: Duration,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            threshold_bytes: 10 * 1024 * 1024,
            chunk_size_bytes: 20 * 1024 * 1024,
            timeout: Duration::from_secs(600),
        }
    }
}

impl From<&PublishConfig> for UploadPolicy {
    fn from(cfg: &PublishConfig) -> Self {
        Self {
            threshold_bytes: cfg.chunk_threshold_bytes,
            chunk_size_bytes: cfg.chunk_size_bytes.max(1),
            timeout: Duration::from_secs(cfg.upload_timeout_secs),
        }
    }
}

impl UploadPolicy {
    pub fn mode_for(&self, size_bytes: u64) -> UploadMode {
        select_upload_mode(size_bytes, self.threshold_bytes, self.chunk_size_bytes)
    }
}

/// Direct when `size_bytes <= threshold_bytes`, chunked otherwise.
pub fn select_upload_mode(size_bytes: u64, threshold_bytes: u64, chunk_size: u64) -> UploadMode {
    if size_bytes <= threshold_bytes {
        UploadMode::Direct
    } else {
        UploadMode::Chunked { chunk_size }
    }
}
