use std::{path::Path, time::Duration};

use async_trait::async_trait;

use crate::Result;

/// Remote (or local) store that makes a container publicly reachable.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &str;

    /// Upload the whole file in one request. Returns the public URL.
    async fn upload_direct(&self, path: &Path, public_id: &str, timeout: Duration)
    -> Result<String>;

    /// Upload in `chunk_size` pieces. `timeout` bounds each chunk request.
    async fn upload_chunked(
        &self,
        path: &Path,
        public_id: &str,
        size_bytes: u64,
        chunk_size: u64,
        timeout: Duration,
    ) -> Result<String>;
}
