//! Configuration loading, validation and env substitution.
//!
//! Config files: `tunepress.toml`, `tunepress.yaml` or `tunepress.json`,
//! searched in `./` then the user config directory.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod template;
pub mod validate;

pub use {
    error::{Error, Result},
    loader::{apply_env_overrides, config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        AcquisitionConfig, CatalogConfig, CloudinaryConfig, FilesystemPublishConfig,
        JobStoreKind, NetworkPosture, PublishConfig, PublishProvider, QueueConfig, ServerConfig,
        StorageConfig, StrategyConfig, ThumbnailConfig, TunepressConfig, YtDlpConfig,
    },
    template::default_config_template,
    validate::{Diagnostic, Severity, validate},
};
