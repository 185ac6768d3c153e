//! Gateway: runs requests through the acquire → package → publish pipeline
//! and exposes it over HTTP next to the job queue worker.
//!
//! Lifecycle of `serve`:
//! 1. Open the database and run migrations
//! 2. Build the pipeline and the job queue from config
//! 3. Start the queue worker and the retention sweeper
//! 4. Serve HTTP until Ctrl-C

pub mod bootstrap;
pub mod error;
pub mod pipeline;
pub mod retention;
pub mod server;
pub mod service;

pub use {
    bootstrap::{build_service, job_store, open_database, start_gateway},
    error::{Error, Result},
    pipeline::{Pipeline, PipelineOutcome},
    server::build_app,
    service::{DownloadService, HealthReport, StorageStatus},
};
