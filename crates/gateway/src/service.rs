//! Service surface shared by the HTTP routes and the CLI: submit a request,
//! sweep the backlog, serve artifacts, and report history, health and storage.

use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use {
    chrono::{DateTime, Utc},
    serde::Serialize,
    tracing::{debug, info},
    tunepress_acquire::MediaRequest,
    tunepress_publish::{CatalogStore, StoredRecord},
    tunepress_queue::{Job, JobFailure, JobQueueProcessor, ProcessFn, SweepReport},
};

use crate::{
    Error, Result,
    pipeline::{Pipeline, PipelineOutcome},
};

/// `{status, timestamp, catalogAvailable}`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub catalog_available: bool,
}

/// Usage of the downloads folder.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatus {
    pub downloads_count: usize,
    pub storage_usage_bytes: u64,
}

pub struct DownloadService {
    pipeline: Arc<Pipeline>,
    processor: Arc<JobQueueProcessor>,
    catalog: Arc<dyn CatalogStore>,
    downloads_dir: PathBuf,
    history_limit: usize,
}

impl DownloadService {
    pub fn new(
        pipeline: Arc<Pipeline>,
        processor: Arc<JobQueueProcessor>,
        catalog: Arc<dyn CatalogStore>,
        downloads_dir: PathBuf,
        history_limit: usize,
    ) -> Self {
        Self {
            pipeline,
            processor,
            catalog,
            downloads_dir,
            history_limit: history_limit.max(1),
        }
    }

    pub fn downloads_dir(&self) -> &Path {
        &self.downloads_dir
    }

    pub fn processor(&self) -> &Arc<JobQueueProcessor> {
        &self.processor
    }

    /// Build the queue callback that runs each job's song name as a search
    /// and writes its container under `destination`.
    pub fn job_runner(pipeline: Arc<Pipeline>, destination: PathBuf) -> ProcessFn {
        Arc::new(move |job: Job| {
            let pipeline = Arc::clone(&pipeline);
            let destination = destination.clone();
            Box::pin(async move {
                let request = MediaRequest::from_parts(Some(job.song_name.clone()), None)
                    .map_err(|e| JobFailure::new(e.kind(), e.to_string()))?;
                pipeline
                    .run(&request, &destination)
                    .await
                    .map(|out| out.artifact_url)
                    .map_err(|e| JobFailure::new(e.kind(), e.to_string()))
            })
        })
    }

    /// Run one request synchronously through the pipeline.
    pub async fn submit(
        &self,
        query: Option<String>,
        url: Option<String>,
        destination: Option<&str>,
    ) -> Result<PipelineOutcome> {
        let request = MediaRequest::from_parts(query, url)?;
        let destination = self.resolve_destination(destination)?;
        info!(request = %request.label(), destination = %destination.display(), "submit");
        self.pipeline.run(&request, &destination).await
    }

    /// Sweep the backlog once, writing containers to `destination` when given.
    pub async fn sweep(&self, destination: Option<&str>) -> Result<SweepReport> {
        if destination.is_none() {
            return Ok(self.processor.sweep().await?);
        }
        let destination = self.resolve_destination(destination)?;
        let runner = Self::job_runner(Arc::clone(&self.pipeline), destination);
        Ok(self.processor.sweep_with(&runner).await?)
    }

    pub async fn enqueue(&self, song_name: &str) -> Result<Job> {
        if song_name.trim().is_empty() {
            return Err(Error::invalid_request("songName is required"));
        }
        Ok(self.processor.enqueue(song_name).await?)
    }

    pub async fn jobs(&self) -> Result<Vec<Job>> {
        Ok(self.processor.store().list().await?)
    }

    /// Path of a container in the downloads folder. Only plain file names
    /// (or relative paths without `..`) are accepted.
    pub async fn artifact_path(&self, name: &str) -> Result<PathBuf> {
        let relative = safe_relative(name).ok_or_else(|| Error::not_found(name))?;
        let path = self.downloads_dir.join(relative);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(path),
            _ => {
                debug!(path = %path.display(), "artifact not found");
                Err(Error::not_found(name))
            },
        }
    }

    /// Most recent catalog records, newest first.
    pub async fn history(&self, limit: Option<usize>) -> Result<Vec<StoredRecord>> {
        let limit = limit.unwrap_or(self.history_limit).clamp(1, 500);
        Ok(self.catalog.recent(limit).await?)
    }

    pub async fn health(&self) -> HealthReport {
        HealthReport {
            status: "ok",
            timestamp: Utc::now(),
            catalog_available: self.catalog.is_available().await,
        }
    }

    /// Number and total size of the files in the downloads folder.
    pub async fn storage_status(&self) -> Result<StorageStatus> {
        let mut status = StorageStatus::default();
        let mut entries = match tokio::fs::read_dir(&self.downloads_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(status),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let meta = entry.metadata().await?;
            if meta.is_file() {
                status.downloads_count += 1;
                status.storage_usage_bytes += meta.len();
            }
        }
        Ok(status)
    }

    /// Destination folder for a request: the downloads folder, or a relative
    /// subfolder of it.
    fn resolve_destination(&self, destination: Option<&str>) -> Result<PathBuf> {
        match destination.map(str::trim).filter(|d| !d.is_empty()) {
            None => Ok(self.downloads_dir.clone()),
            Some(d) => safe_relative(d)
                .map(|rel| self.downloads_dir.join(rel))
                .ok_or_else(|| {
                    Error::invalid_request(format!(
                        "destination must be a relative folder without '..': {d}"
                    ))
                }),
        }
    }
}

fn safe_relative(name: &str) -> Option<PathBuf> {
    let path = Path::new(name);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {},
            _ => return None,
        }
    }
    (!out.as_os_str().is_empty()).then_some(out)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::pipeline::tests::{FakeSource, acquirer},
        rstest::rstest,
        tunepress_acquire::SourceError,
        tunepress_common::FailureKind,
        tunepress_media::NoThumbnails,
        tunepress_publish::{ArtifactPublisher, FsBlobStore, InMemoryCatalog, UploadPolicy},
        tunepress_queue::{InMemoryJobStore, JobStatus, ProcessorConfig, SweepOutcome},
    };

    fn service(
        dir: &Path,
        script: Vec<std::result::Result<Vec<u8>, SourceError>>,
    ) -> DownloadService {
        let catalog = Arc::new(InMemoryCatalog::new());
        let publisher = ArtifactPublisher::new(
            Arc::new(FsBlobStore::new(dir.join("published"), None)),
            catalog.clone(),
            UploadPolicy::default(),
        );
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(acquirer(Arc::new(FakeSource::new("Song A", script)))),
            Arc::new(NoThumbnails),
            Arc::new(publisher),
            "YouTube",
        ));
        let downloads = dir.join("downloads");
        let processor = JobQueueProcessor::new(
            Arc::new(InMemoryJobStore::new()),
            DownloadService::job_runner(Arc::clone(&pipeline), downloads.clone()),
            ProcessorConfig {
                cooldown: std::time::Duration::ZERO,
                ..Default::default()
            },
        );
        DownloadService::new(pipeline, processor, catalog, downloads, 20)
    }

    #[rstest]
    #[case("song.m3ew", Some("song.m3ew"))]
    #[case("./sub/song.m3ew", Some("sub/song.m3ew"))]
    #[case("../etc/passwd", None)]
    #[case("/etc/passwd", None)]
    #[case("", None)]
    fn relative_paths_only(#[case] input: &str, #[case] expected: Option<&str>) {
        assert_eq!(safe_relative(input), expected.map(PathBuf::from));
    }

    #[tokio::test]
    async fn submit_then_fetch_and_history() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), vec![Ok(b"audio".to_vec())]);

        let out = svc.submit(Some("Song A".into()), None, None).await.unwrap();
        assert_eq!(out.title, "Song A");

        let path = svc.artifact_path(&out.filename).await.unwrap();
        assert!(path.starts_with(svc.downloads_dir()));
        assert!(matches!(
            svc.artifact_path("missing.m3ew").await.unwrap_err(),
            Error::NotFound { .. }
        ));
        assert!(svc.artifact_path("../published").await.is_err());

        let history = svc.history(None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].record.artifact_url, out.artifact_url);

        let status = svc.storage_status().await.unwrap();
        assert_eq!(status.downloads_count, 1);
        assert_eq!(status.storage_usage_bytes, out.size_bytes);
    }

    #[tokio::test]
    async fn submit_rejects_bad_requests() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), vec![]);

        let err = svc.submit(None, None, None).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidRequest);
        let err = svc
            .submit(None, Some("https://vimeo.com/1".into()), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidRequest);
        let err = svc
            .submit(Some("x".into()), None, Some("../outside"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidRequest);
    }

    #[tokio::test]
    async fn sweep_into_custom_destination() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), vec![Ok(b"audio".to_vec())]);
        let job = svc.enqueue("Song A").await.unwrap();

        let report = svc.sweep(Some("batch")).await.unwrap();
        assert!(matches!(report.results[0].result, SweepOutcome::Completed { .. }));
        assert!(dir.path().join("downloads/batch/Song_A.m3ew").exists());

        let jobs = svc.jobs().await.unwrap();
        assert_eq!(jobs[0].id, job.id);
        assert_eq!(jobs[0].status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn failed_job_records_classified_error() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), vec![]);
        svc.enqueue("nothing").await.unwrap();

        let report = svc.sweep(None).await.unwrap();
        let SweepOutcome::Failed { error } = &report.results[0].result else {
            panic!("expected failure");
        };
        assert!(error.starts_with("notFound: "), "{error}");
    }

    #[tokio::test]
    async fn storage_status_of_missing_folder_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path(), vec![]);
        assert_eq!(svc.storage_status().await.unwrap(), StorageStatus::default());
        assert!(svc.health().await.catalog_available);
    }
}
