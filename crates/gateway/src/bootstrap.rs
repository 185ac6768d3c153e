//! Wire a [`TunepressConfig`] into a running service.

use std::{sync::Arc, time::Duration};

use {
    sqlx::{SqlitePool, sqlite::SqlitePoolOptions},
    tracing::{info, warn},
    tunepress_acquire::{JitterBackoff, MediaAcquirer, StrategySet, YtDlp},
    tunepress_config::{JobStoreKind, PublishProvider, TunepressConfig},
    tunepress_media::HttpThumbnailFetcher,
    tunepress_publish::{
        ArtifactPublisher, BlobStore, CloudinaryStore, FsBlobStore, SqliteCatalog, UploadPolicy,
    },
    tunepress_queue::{FileJobStore, JobQueueProcessor, JobStore, ProcessorConfig, SqliteJobStore},
};

use crate::{
    Error, Result,
    pipeline::Pipeline,
    retention::spawn_retention,
    server,
    service::DownloadService,
};

/// Open the shared database and run every crate's migrations.
pub async fn open_database(config: &TunepressConfig) -> Result<SqlitePool> {
    let url = config.storage.resolved_database_url();
    if let Some(path) = url
        .strip_prefix("sqlite://")
        .map(|rest| rest.split('?').next().unwrap_or(rest))
        .and_then(|p| std::path::Path::new(p).parent())
        && !path.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(path).await?;
    }
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;
    tunepress_queue::run_migrations(&pool).await?;
    tunepress_publish::run_migrations(&pool).await?;
    Ok(pool)
}

fn blob_store(config: &TunepressConfig) -> Result<Arc<dyn BlobStore>> {
    let publish = &config.publish;
    let store: Arc<dyn BlobStore> = match publish.provider {
        PublishProvider::Cloudinary => Arc::new(CloudinaryStore::from_config(&publish.cloudinary)?),
        PublishProvider::Filesystem => {
            let root = publish
                .filesystem
                .root
                .clone()
                .unwrap_or_else(|| config.storage.resolved_data_dir().join("published"));
            Arc::new(FsBlobStore::new(root, publish.filesystem.base_url.clone()))
        },
    };
    Ok(store)
}

/// The configured backlog store. `pool` is used only by the SQLite backend.
pub fn job_store(config: &TunepressConfig, pool: SqlitePool) -> Arc<dyn JobStore> {
    match config.storage.job_store {
        JobStoreKind::Sqlite => Arc::new(SqliteJobStore::with_pool(pool)),
        JobStoreKind::File => Arc::new(FileJobStore::new(config.storage.jobs_file())),
    }
}

fn acquirer(config: &TunepressConfig) -> Result<MediaAcquirer> {
    let acq = &config.acquisition;
    let ytdlp = YtDlp::discover(
        &acq.ytdlp,
        Duration::from_secs(acq.probe_timeout_secs),
        Duration::from_secs(acq.search_timeout_secs),
    )
    .ok_or_else(|| {
        Error::message("yt-dlp not found; install it or set acquisition.ytdlp.binary")
    })?;
    let strategies = StrategySet::from_config(&acq.strategies)
        .ok_or_else(|| Error::message("acquisition.strategies must not be empty"))?;
    let ytdlp = Arc::new(ytdlp);

    Ok(MediaAcquirer::new(ytdlp.clone(), ytdlp, strategies)
        .with_max_attempts(acq.max_attempts)
        .with_user_agents(acq.user_agents.clone())
        .with_backoff(Arc::new(JitterBackoff::from_millis(
            acq.backoff_min_ms,
            acq.backoff_max_ms,
        ))))
}

/// Build the full service: acquirer, thumbnails, publisher, catalog and the
/// job queue, all from `config`.
pub async fn build_service(config: &TunepressConfig) -> Result<Arc<DownloadService>> {
    let pool = open_database(config).await?;

    let catalog = Arc::new(SqliteCatalog::with_pool(
        pool.clone(),
        config.catalog.collection.clone(),
    ));
    let publisher = ArtifactPublisher::new(
        blob_store(config)?,
        catalog.clone(),
        UploadPolicy::from(&config.publish),
    );
    let thumbnails = HttpThumbnailFetcher::new(
        config.acquisition.user_agents.clone(),
        Duration::from_secs(config.thumbnail.timeout_secs),
        config.thumbnail.max_dimension,
    );
    let pipeline = Arc::new(Pipeline::new(
        Arc::new(acquirer(config)?),
        Arc::new(thumbnails),
        Arc::new(publisher),
        config.source_label.clone(),
    ));

    let jobs = job_store(config, pool);
    let downloads_dir = config.storage.resolved_downloads_dir();
    let processor = JobQueueProcessor::new(
        jobs,
        DownloadService::job_runner(Arc::clone(&pipeline), downloads_dir.clone()),
        ProcessorConfig::from(&config.queue),
    );

    Ok(Arc::new(DownloadService::new(
        pipeline,
        processor,
        catalog,
        downloads_dir,
        config.catalog.history_limit,
    )))
}

/// Run the HTTP server with the queue worker and retention sweeper until
/// Ctrl-C.
pub async fn start_gateway(config: &TunepressConfig) -> Result<()> {
    let service = build_service(config).await?;
    tokio::fs::create_dir_all(service.downloads_dir()).await?;

    if config.queue.enabled {
        service.processor().start().await;
    } else {
        info!("queue worker disabled");
    }

    let retention = (config.storage.retention_hours > 0).then(|| {
        spawn_retention(
            service.downloads_dir().to_path_buf(),
            Duration::from_secs(config.storage.retention_hours * 3600),
            Duration::from_secs(config.storage.retention_interval_secs),
        )
    });

    let result = tokio::select! {
        r = server::serve(&config.server.bind, config.server.port, Arc::clone(&service)) => r,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            Ok(())
        },
    };

    service.processor().stop().await;
    if let Some(handle) = retention {
        handle.abort();
    }
    if let Err(ref e) = result {
        warn!(error = %e, "server exited with error");
    }
    result
}
