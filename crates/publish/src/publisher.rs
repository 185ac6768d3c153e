use std::{path::Path, sync::Arc};

use {
    chrono::{DateTime, Utc},
    tracing::{info, warn},
};

use crate::{
    Result,
    blob::BlobStore,
    catalog::{CatalogRecord, CatalogStore},
    naming::public_id,
    upload::{UploadMode, UploadPolicy},
};

const CONTAINER_CONTENT_TYPE: &str = "application/x-m3ew";

/// Descriptive fields of a container, supplied by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDetails {
    pub title: String,
    pub artist: String,
    pub duration: String,
    pub source: String,
    pub source_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub audio_type: String,
    pub image_type: Option<String>,
    pub version: u8,
    pub is_live: bool,
    pub was_live: bool,
    pub created_at: DateTime<Utc>,
}

/// What happened to the catalog write that follows an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogOutcome {
    Written { id: String },
    /// Non-fatal: the upload stands.
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub url: String,
    pub public_id: String,
    pub mode: UploadMode,
    pub catalog: CatalogOutcome,
}

/// Uploads containers and records them in the catalog.
pub struct ArtifactPublisher {
    blobs: Arc<dyn BlobStore>,
    catalog: Arc<dyn CatalogStore>,
    policy: UploadPolicy,
}

impl ArtifactPublisher {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        catalog: Arc<dyn CatalogStore>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            blobs,
            catalog,
            policy,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogStore> {
        &self.catalog
    }

    /// Upload `path` (direct or chunked by `size_bytes`), then write the
    /// catalog record. Only the upload can fail this call.
    pub async fn publish(
        &self,
        path: &Path,
        size_bytes: u64,
        details: &ArtifactDetails,
    ) -> Result<PublishOutcome> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(details.title.as_str());
        let public_id = public_id(name);
        let mode = self.policy.mode_for(size_bytes);

        info!(
            store = self.blobs.name(),
            public_id = %public_id,
            size_bytes,
            mode = ?mode,
            "publishing container"
        );
        let url = match mode {
            UploadMode::Direct => {
                self.blobs
                    .upload_direct(path, &public_id, self.policy.timeout)
                    .await?
            },
            UploadMode::Chunked { chunk_size } => {
                self.blobs
                    .upload_chunked(path, &public_id, size_bytes, chunk_size, self.policy.timeout)
                    .await?
            },
        };

        let record = CatalogRecord {
            title: details.title.clone(),
            artist: details.artist.clone(),
            duration: details.duration.clone(),
            artifact_url: url.clone(),
            created_at: details.created_at,
            source: details.source.clone(),
            source_url: details.source_url.clone(),
            thumbnail_url: details.thumbnail_url.clone(),
            local_path: Some(path.display().to_string()),
            status: "completed".into(),
            audio_type: details.audio_type.clone(),
            image_type: details.image_type.clone(),
            content_type: CONTAINER_CONTENT_TYPE.into(),
            size_bytes,
            version: details.version,
            is_live: details.is_live,
            was_live: details.was_live,
        };
        let catalog = match self.catalog.insert(&record).await {
            Ok(id) => CatalogOutcome::Written { id },
            Err(e) => {
                warn!(public_id = %public_id, error = %e, "catalog write failed, publish stands");
                CatalogOutcome::Failed {
                    error: e.to_string(),
                }
            },
        };

        Ok(PublishOutcome {
            url,
            public_id,
            mode,
            catalog,
        })
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{sync::Mutex, time::Duration};

    use async_trait::async_trait;

    use {
        super::*,
        crate::{
            Error,
            catalog::{InMemoryCatalog, StoredRecord},
        },
    };

    const MIB: u64 = 1024 * 1024;

    #[derive(Default)]
    struct RecordingStore {
        calls: Mutex<Vec<&'static str>>,
        fail: bool,
    }

    #[async_trait]
    impl BlobStore for RecordingStore {
        fn name(&self) -> &str {
            "recording"
        }

        async fn upload_direct(&self, _: &Path, id: &str, _: Duration) -> Result<String> {
            self.calls.lock().unwrap().push("direct");
            if self.fail {
                return Err(Error::Timeout { secs: 600 });
            }
            Ok(format!("https://cdn.test/{id}"))
        }

        async fn upload_chunked(
            &self,
            _: &Path,
            id: &str,
            _: u64,
            chunk_size: u64,
            _: Duration,
        ) -> Result<String> {
            assert_eq!(chunk_size, 20 * MIB);
            self.calls.lock().unwrap().push("chunked");
            Ok(format!("https://cdn.test/{id}"))
        }
    }

    struct BrokenCatalog;

    #[async_trait]
    impl CatalogStore for BrokenCatalog {
        async fn insert(&self, _: &CatalogRecord) -> Result<String> {
            Err(Error::message("catalog offline"))
        }

        async fn recent(&self, _: usize) -> Result<Vec<StoredRecord>> {
            Ok(Vec::new())
        }

        async fn is_available(&self) -> bool {
            false
        }
    }

    fn details() -> ArtifactDetails {
        ArtifactDetails {
            title: "Song A".into(),
            artist: "Band".into(),
            duration: "2:05".into(),
            source: "YouTube".into(),
            source_url: Some("https://youtu.be/U".into()),
            thumbnail_url: None,
            audio_type: "audio/mpeg".into(),
            image_type: None,
            version: 1,
            is_live: false,
            was_live: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn large_container_goes_chunked_small_goes_direct() {
        let blobs = Arc::new(RecordingStore::default());
        let catalog = Arc::new(InMemoryCatalog::new());
        let publisher = ArtifactPublisher::new(blobs.clone(), catalog.clone(), UploadPolicy::default());
        let path = Path::new("/tmp/Song_A.m3ew");

        let big = publisher.publish(path, 50 * MIB, &details()).await.unwrap();
        let small = publisher.publish(path, 2 * MIB, &details()).await.unwrap();

        assert!(matches!(big.mode, UploadMode::Chunked { .. }));
        assert_eq!(small.mode, UploadMode::Direct);
        assert_eq!(*blobs.calls.lock().unwrap(), vec!["chunked", "direct"]);
        assert_eq!(catalog.len(), 2);
        assert!(big.public_id.starts_with("Song_A.m3ew_"));
    }

    #[tokio::test]
    async fn catalog_record_carries_url() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let publisher = ArtifactPublisher::new(
            Arc::new(RecordingStore::default()),
            catalog.clone(),
            UploadPolicy::default(),
        );
        let out = publisher
            .publish(Path::new("/tmp/Song_A.m3ew"), 1024, &details())
            .await
            .unwrap();

        let CatalogOutcome::Written { id } = out.catalog else {
            panic!("catalog write should succeed");
        };
        let stored = catalog.recent(1).await.unwrap().remove(0);
        assert_eq!(stored.id, id);
        assert_eq!(stored.record.artifact_url, out.url);
        assert_eq!(stored.record.status, "completed");
        assert_eq!(stored.record.size_bytes, 1024);
    }

    #[tokio::test]
    async fn catalog_failure_is_not_fatal() {
        let publisher = ArtifactPublisher::new(
            Arc::new(RecordingStore::default()),
            Arc::new(BrokenCatalog),
            UploadPolicy::default(),
        );
        let out = publisher
            .publish(Path::new("/tmp/x.m3ew"), 10, &details())
            .await
            .unwrap();
        assert!(out.url.starts_with("https://cdn.test/"));
        assert_eq!(out.catalog, CatalogOutcome::Failed {
            error: "catalog offline".into()
        });
    }

    #[tokio::test]
    async fn upload_failure_skips_catalog() {
        let catalog = Arc::new(InMemoryCatalog::new());
        let publisher = ArtifactPublisher::new(
            Arc::new(RecordingStore {
                fail: true,
                ..Default::default()
            }),
            catalog.clone(),
            UploadPolicy::default(),
        );
        let err = publisher
            .publish(Path::new("/tmp/x.m3ew"), 10, &details())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
        assert!(catalog.is_empty());
    }
}
