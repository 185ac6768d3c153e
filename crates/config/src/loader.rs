use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    Error, Result,
    env_subst::substitute_env,
    schema::TunepressConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "tunepress.toml",
    "tunepress.yaml",
    "tunepress.yml",
    "tunepress.json",
];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<TunepressConfig> {
    let raw = std::fs::read_to_string(path).map_err(|e| Error::read(path, e))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./tunepress.{toml,yaml,yml,json}` (project-local)
/// 2. `<user config dir>/tunepress.{toml,yaml,yml,json}`
///
/// Returns `TunepressConfig::default()` if no config file is found or the
/// file fails to parse. Environment overrides are applied either way.
pub fn discover_and_load() -> TunepressConfig {
    let mut config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                TunepressConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            TunepressConfig::default()
        },
    };
    apply_env_overrides(&mut config);
    config
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists());
    if local.is_some() {
        return local;
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/tunepress/` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "tunepress").map(|d| d.config_dir().to_path_buf())
}

/// Apply `TUNEPRESS_*` environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: &mut TunepressConfig) {
    apply_env_overrides_with(config, |name| std::env::var(name).ok());
}

fn apply_env_overrides_with(config: &mut TunepressConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(bind) = lookup("TUNEPRESS_BIND") {
        config.server.bind = bind;
    }
    if let Some(port) = lookup("TUNEPRESS_PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(_) => warn!(value = %port, "ignoring invalid TUNEPRESS_PORT"),
        }
    }
    if let Some(url) = lookup("TUNEPRESS_DATABASE_URL") {
        config.storage.database_url = Some(url);
    }
    if let Some(dir) = lookup("TUNEPRESS_DATA_DIR") {
        config.storage.data_dir = Some(PathBuf::from(dir));
    }
    if let Some(dir) = lookup("TUNEPRESS_DOWNLOADS_DIR") {
        config.storage.downloads_dir = Some(PathBuf::from(dir));
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<TunepressConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        other => Err(Error::UnsupportedFormat {
            extension: other.to_string(),
        }),
    }
}
