//! Publishing: upload a packaged container to a blob store (direct or
//! chunked, by size) and record it in the catalog.

pub mod blob;
pub mod catalog;
pub mod cloudinary;
pub mod error;
pub mod fs_store;
pub mod naming;
pub mod publisher;
pub mod upload;

pub use {
    blob::BlobStore,
    catalog::{CatalogRecord, CatalogStore, InMemoryCatalog, SqliteCatalog, StoredRecord},
    cloudinary::CloudinaryStore,
    error::{Error, Result},
    fs_store::FsBlobStore,
    naming::public_id,
    publisher::{ArtifactDetails, ArtifactPublisher, CatalogOutcome, PublishOutcome},
    upload::{UploadMode, UploadPolicy, select_upload_mode},
};

/// Run database migrations for the catalog table.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
