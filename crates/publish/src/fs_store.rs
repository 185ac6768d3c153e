//! Local-directory blob store, for single-host deployments and tests.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use {
    async_trait::async_trait,
    tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    tracing::debug,
};

use crate::{Error, Result, blob::BlobStore, error::Context};

const EXTENSION: &str = "m3ew";

pub struct FsBlobStore {
    root: PathBuf,
    base_url: Option<String>,
}

impl FsBlobStore {
    /// `base_url` prefixes returned URLs; without it a `file://` URL is returned.
    pub fn new(root: impl Into<PathBuf>, base_url: Option<String>) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.map(|u| u.trim_end_matches('/').to_string()),
        }
    }

    fn target(&self, public_id: &str) -> PathBuf {
        self.root.join(format!("{public_id}.{EXTENSION}"))
    }

    fn url_for(&self, target: &Path, public_id: &str) -> String {
        match &self.base_url {
            Some(base) => format!("{base}/{public_id}.{EXTENSION}"),
            None => format!("file://{}", target.display()),
        }
    }

    async fn prepare(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create {}", self.root.display()))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn upload_direct(
        &self,
        path: &Path,
        public_id: &str,
        timeout: Duration,
    ) -> Result<String> {
        self.prepare().await?;
        let target = self.target(public_id);
        tokio::time::timeout(timeout, tokio::fs::copy(path, &target))
            .await
            .map_err(|_| Error::Timeout {
                secs: timeout.as_secs(),
            })??;
        debug!(target = %target.display(), "container copied");
        Ok(self.url_for(&target, public_id))
    }

    async fn upload_chunked(
        &self,
        path: &Path,
        public_id: &str,
        size_bytes: u64,
        chunk_size: u64,
        timeout: Duration,
    ) -> Result<String> {
        self.prepare().await?;
        let target = self.target(public_id);
        let partial = target.with_extension("part");

        let mut src = tokio::fs::File::open(path).await?;
        let copied = copy_in_chunks(&mut src, &partial, chunk_size, timeout).await;
        let (written, chunks) = match copied {
            Ok(done) => done,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            },
        };

        if written != size_bytes {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(Error::message(format!(
                "size mismatch: expected {size_bytes} bytes, copied {written}"
            )));
        }
        if let Err(e) = tokio::fs::rename(&partial, &target).await {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.into());
        }
        debug!(target = %target.display(), chunks, "container copied in chunks");
        Ok(self.url_for(&target, public_id))
    }
}

/// Copy `src` into a fresh file at `partial`, one chunk per write, each
/// write bounded by `timeout`. Returns bytes and chunks written.
async fn copy_in_chunks(
    src: &mut tokio::fs::File,
    partial: &Path,
    chunk_size: u64,
    timeout: Duration,
) -> Result<(u64, u32)> {
    let mut dst = tokio::fs::File::create(partial).await?;
    let mut buf = vec![0u8; chunk_size.clamp(1, 64 * 1024 * 1024) as usize];
    let mut written = 0u64;
    let mut chunks = 0u32;
    loop {
        let n = read_full(src, &mut buf).await?;
        if n == 0 {
            break;
        }
        tokio::time::timeout(timeout, dst.write_all(&buf[..n]))
            .await
            .map_err(|_| Error::Timeout {
                secs: timeout.as_secs(),
            })??;
        written += n as u64;
        chunks += 1;
    }
    dst.flush().await?;
    Ok((written, chunks))
}

/// Fill `buf` from `reader` unless EOF comes first.
pub(crate) async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
