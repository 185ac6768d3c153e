//! Job backlog and the processor that drives each pending job through the
//! pipeline exactly once.
//!
//! Jobs move `pending → processing → completed | failed`. Storage is
//! pluggable: in-memory, a JSON document file, or SQLite.

pub mod error;
pub mod processor;
pub mod store;
pub mod store_file;
pub mod store_memory;
pub mod store_sqlite;
pub mod types;

pub use {
    error::{Error, Result},
    processor::{JobFailure, JobQueueProcessor, ProcessFn, ProcessorConfig, SweepEntry, SweepOutcome, SweepReport},
    store::JobStore,
    store_file::FileJobStore,
    store_memory::InMemoryJobStore,
    store_sqlite::SqliteJobStore,
    types::{Job, JobRecord, JobStatus},
};

/// Run database migrations for the `jobs` table.
pub async fn run_migrations(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .set_ignore_missing(true)
        .run(pool)
        .await?;
    Ok(())
}
