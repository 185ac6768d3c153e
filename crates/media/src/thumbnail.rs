//! Best-effort artwork retrieval.
//!
//! A fetcher never fails into its caller: any network, HTTP or decode problem
//! is logged and turns into `None`, and the pipeline packages without artwork.

use std::time::Duration;

use {
    async_trait::async_trait,
    rand::seq::IndexedRandom,
    tracing::{debug, warn},
};

use crate::{
    error::{Error, Result},
    image_ops::{NormalizedImage, normalize_to_png},
};

/// Largest artwork body accepted before decoding.
pub const MAX_THUMBNAIL_BYTES: usize = 8 * 1024 * 1024;

#[async_trait]
pub trait ThumbnailFetcher: Send + Sync {
    /// Download and normalize the artwork at `url`. `None` when there is no
    /// URL or anything along the way fails.
    async fn fetch(&self, url: Option<&str>) -> Option<NormalizedImage>;
}

/// Fetcher that never returns artwork.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoThumbnails;

#[async_trait]
impl ThumbnailFetcher for NoThumbnails {
    async fn fetch(&self, _url: Option<&str>) -> Option<NormalizedImage> {
        None
    }
}

/// Plain HTTP GET with a rotating user agent, followed by PNG normalization.
pub struct HttpThumbnailFetcher {
    client: reqwest::Client,
    user_agents: Vec<String>,
    timeout: Duration,
    max_dimension: Option<u32>,
    max_bytes: usize,
}

impl HttpThumbnailFetcher {
    pub fn new(user_agents: Vec<String>, timeout: Duration, max_dimension: Option<u32>) -> Self {
        Self::with_client(reqwest::Client::new(), user_agents, timeout, max_dimension)
    }

    pub fn with_client(
        client: reqwest::Client,
        user_agents: Vec<String>,
        timeout: Duration,
        max_dimension: Option<u32>,
    ) -> Self {
        Self {
            client,
            user_agents,
            timeout,
            max_dimension,
            max_bytes: MAX_THUMBNAIL_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn pick_user_agent(&self) -> Option<&str> {
        self.user_agents
            .choose(&mut rand::rng())
            .map(String::as_str)
    }

    async fn try_fetch(&self, url: &str) -> Result<NormalizedImage> {
        let mut req = self.client.get(url).timeout(self.timeout);
        if let Some(ua) = self.pick_user_agent() {
            req = req.header(reqwest::header::USER_AGENT, ua);
        }
        let mut resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::status(status.as_u16()));
        }
        if resp
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(Error::too_large(self.max_bytes));
        }
        // Content-Length may be absent or wrong, so the stream is capped too.
        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await? {
            if body.len() + chunk.len() > self.max_bytes {
                return Err(Error::too_large(self.max_bytes));
            }
            body.extend_from_slice(&chunk);
        }
        normalize_to_png(&body, self.max_dimension)
    }
}

#[async_trait]
impl ThumbnailFetcher for HttpThumbnailFetcher {
    async fn fetch(&self, url: Option<&str>) -> Option<NormalizedImage> {
        let url = url.filter(|u| !u.trim().is_empty())?;
        match self.try_fetch(url).await {
            Ok(image) => {
                debug!(
                    url,
                    width = image.width,
                    height = image.height,
                    bytes = image.data.len(),
                    "thumbnail normalized"
                );
                Some(image)
            },
            Err(e) => {
                warn!(url, error = %e, "thumbnail unavailable, continuing without artwork");
                None
            },
        }
    }
}
