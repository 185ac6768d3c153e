//! One request through the whole chain:
//! acquire → thumbnail → pack → write → publish.
//!
//! Intermediate downloads live in a per-run scratch directory that is removed
//! when the run ends, whichever way it ends. Only the finished container is
//! written to the destination folder.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use {
    chrono::{DateTime, SecondsFormat, Utc},
    serde::Serialize,
    tracing::{info, warn},
    tunepress_acquire::{LiveStatus, MediaAcquirer, MediaRequest, sanitize::sanitize_filename},
    tunepress_container::{ContainerMetadata, FORMAT_VERSION, pack},
    tunepress_media::ThumbnailFetcher,
    tunepress_publish::{ArtifactDetails, ArtifactPublisher, CatalogOutcome},
};

use crate::{Error, Result};

pub const CONTAINER_EXTENSION: &str = "m3ew";

/// What a successful run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOutcome {
    pub title: String,
    pub artist: String,
    pub duration: String,
    pub artifact_url: String,
    pub filename: String,
    #[serde(skip)]
    pub container_path: PathBuf,
    pub size_bytes: u64,
    pub strategy_used: String,
    pub attempt_count: u32,
    pub has_artwork: bool,
    pub catalog_written: bool,
}

pub struct Pipeline {
    acquirer: Arc<MediaAcquirer>,
    thumbnails: Arc<dyn ThumbnailFetcher>,
    publisher: Arc<ArtifactPublisher>,
    source_label: String,
}

impl Pipeline {
    pub fn new(
        acquirer: Arc<MediaAcquirer>,
        thumbnails: Arc<dyn ThumbnailFetcher>,
        publisher: Arc<ArtifactPublisher>,
        source_label: impl Into<String>,
    ) -> Self {
        Self {
            acquirer,
            thumbnails,
            publisher,
            source_label: source_label.into(),
        }
    }

    pub fn publisher(&self) -> &Arc<ArtifactPublisher> {
        &self.publisher
    }

    /// Run `request` and leave the container in `destination`.
    pub async fn run(&self, request: &MediaRequest, destination: &Path) -> Result<PipelineOutcome> {
        self.run_at(request, destination, Utc::now()).await
    }

    /// Same as [`run`](Self::run) with an explicit creation timestamp.
    pub async fn run_at(
        &self,
        request: &MediaRequest,
        destination: &Path,
        created_at: DateTime<Utc>,
    ) -> Result<PipelineOutcome> {
        let scratch = tempfile::Builder::new()
            .prefix("tunepress-")
            .tempdir()
            .map_err(Error::packaging)?;

        let acquired = self.acquirer.acquire(request, scratch.path()).await?;
        let info = &acquired.info;

        let image = self.thumbnails.fetch(info.thumbnail_url.as_deref()).await;
        if image.is_none() && info.thumbnail_url.is_some() {
            warn!(title = %info.title, "packaging without artwork");
        }

        let duration = info.display_duration();
        let live_known = info.live_status != LiveStatus::None;
        let metadata = ContainerMetadata {
            title: info.title.clone(),
            artist: info.artist.clone(),
            audio_type: acquired.mime_type.clone(),
            image_type: image.as_ref().map(|i| i.media_type.clone()),
            duration: duration.clone(),
            source: self.source_label.clone(),
            created_at: created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            version: FORMAT_VERSION,
            is_live: live_known.then(|| info.is_live()),
            was_live: live_known.then(|| info.was_live()),
        };
        let bytes = pack(
            &metadata,
            image.as_ref().map(|i| i.data.as_slice()),
            &acquired.audio_bytes,
        )
        .map_err(Error::packaging)?;

        let unix_ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let filename = format!(
            "{}.{CONTAINER_EXTENSION}",
            sanitize_filename(&info.title, unix_ts)
        );
        let container_path = destination.join(&filename);
        write_container(&container_path, &bytes).await?;
        let size_bytes = bytes.len() as u64;
        info!(
            path = %container_path.display(),
            size_bytes,
            artwork = image.is_some(),
            "container written"
        );

        let details = ArtifactDetails {
            title: info.title.clone(),
            artist: info.artist.clone(),
            duration: duration.clone(),
            source: self.source_label.clone(),
            source_url: Some(acquired.source_url.clone()),
            thumbnail_url: info.thumbnail_url.clone(),
            audio_type: acquired.mime_type.clone(),
            image_type: metadata.image_type.clone(),
            version: FORMAT_VERSION,
            is_live: info.is_live(),
            was_live: info.was_live(),
            created_at,
        };
        let published = self
            .publisher
            .publish(&container_path, size_bytes, &details)
            .await?;

        Ok(PipelineOutcome {
            title: info.title.clone(),
            artist: info.artist.clone(),
            duration,
            artifact_url: published.url,
            filename,
            container_path,
            size_bytes,
            strategy_used: acquired.strategy_used.clone(),
            attempt_count: acquired.attempt_count,
            has_artwork: image.is_some(),
            catalog_written: matches!(published.catalog, CatalogOutcome::Written { .. }),
        })
    }
}

async fn write_container(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(Error::packaging)?;
    }
    tokio::fs::write(path, bytes)
        .await
        .map_err(Error::packaging)
}
