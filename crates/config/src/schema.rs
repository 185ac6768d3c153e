//! Config schema: server, storage, acquisition strategies, thumbnails,
//! publishing, catalog and the job queue.

use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

const APP_NAME: &str = "tunepress";

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TunepressConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub acquisition: AcquisitionConfig,
    pub thumbnail: ThumbnailConfig,
    pub publish: PublishConfig,
    pub catalog: CatalogConfig,
    pub queue: QueueConfig,
    /// Value written to the `source` field of containers and catalog records.
    pub source_label: String,
}

impl Default for TunepressConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            acquisition: AcquisitionConfig::default(),
            thumbnail: ThumbnailConfig::default(),
            publish: PublishConfig::default(),
            catalog: CatalogConfig::default(),
            queue: QueueConfig::default(),
            source_label: "YouTube".into(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    /// Port to listen on. Defaults to 5000.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 5000,
        }
    }
}

/// Which backend holds the job backlog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStoreKind {
    #[default]
    Sqlite,
    File,
}

/// Local directories, database location and artifact retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base directory for databases and published files.
    pub data_dir: Option<PathBuf>,
    /// Default destination folder for packaged containers.
    pub downloads_dir: Option<PathBuf>,
    /// sqlx connection string. Defaults to `<data_dir>/tunepress.db`.
    pub database_url: Option<String>,
    pub job_store: JobStoreKind,
    /// Artifacts older than this are deleted from the downloads folder. 0 disables.
    pub retention_hours: u64,
    pub retention_interval_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            downloads_dir: None,
            database_url: None,
            job_store: JobStoreKind::default(),
            retention_hours: 1,
            retention_interval_secs: 3600,
        }
    }
}

impl StorageConfig {
    /// Configured data dir, or the platform data dir for `tunepress`.
    pub fn resolved_data_dir(&self) -> PathBuf {
        if let Some(ref dir) = self.data_dir {
            return dir.clone();
        }
        directories::ProjectDirs::from("", "", APP_NAME)
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".tunepress"))
    }

    pub fn resolved_downloads_dir(&self) -> PathBuf {
        self.downloads_dir
            .clone()
            .unwrap_or_else(|| self.resolved_data_dir().join("downloads"))
    }

    pub fn resolved_database_url(&self) -> String {
        self.database_url.clone().unwrap_or_else(|| {
            format!(
                "sqlite://{}?mode=rwc",
                self.resolved_data_dir().join("tunepress.db").display()
            )
        })
    }

    /// Path of the JSON job file used by [`JobStoreKind::File`].
    pub fn jobs_file(&self) -> PathBuf {
        self.resolved_data_dir().join("jobs.json")
    }
}

/// Network posture applied by one strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkPosture {
    pub geo_bypass: bool,
    pub geo_bypass_country: Option<String>,
    pub force_ipv4: bool,
}

/// One acquisition parameter profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    /// Extractor client identity (`android`, `web`, `mweb`, `ios`, ...).
    pub client_profile: String,
    /// Fixed user agent. When absent one is picked from `acquisition.user_agents`.
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub network: NetworkPosture,
    /// Format tokens, tried in order when the previous one is unsupported.
    pub formats: Vec<String>,
    pub timeout_secs: u64,
}

/// yt-dlp adapter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YtDlpConfig {
    /// Explicit binary path. Defaults to `yt-dlp` on `PATH`.
    pub binary: Option<String>,
    pub ffmpeg_location: Option<String>,
    pub cookies_file: Option<PathBuf>,
    pub audio_codec: String,
    pub audio_quality: String,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary: None,
            ffmpeg_location: None,
            cookies_file: None,
            audio_codec: "mp3".into(),
            audio_quality: "192".into(),
        }
    }
}

/// Media acquisition: attempt budget, pacing and the strategy list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Total attempts across strategies; strategies cycle when this exceeds their count.
    pub max_attempts: u32,
    /// Lower bound of the randomized pause between attempts.
    pub backoff_min_ms: u64,
    /// Upper bound of the randomized pause between attempts.
    pub backoff_max_ms: u64,
    pub probe_timeout_secs: u64,
    pub search_timeout_secs: u64,
    /// Pool used for client-identity rotation.
    pub user_agents: Vec<String>,
    pub strategies: Vec<StrategyConfig>,
    pub ytdlp: YtDlpConfig,
}

const CHROME_WINDOWS_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
const FIREFOX_WINDOWS_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/115.0";
const CHROME_MAC_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_min_ms: 1_000,
            backoff_max_ms: 3_000,
            probe_timeout_secs: 30,
            search_timeout_secs: 30,
            user_agents: vec![
                CHROME_WINDOWS_UA.into(),
                FIREFOX_WINDOWS_UA.into(),
                CHROME_MAC_UA.into(),
            ],
            strategies: default_strategies(),
            ytdlp: YtDlpConfig::default(),
        }
    }
}

fn default_strategies() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig {
            name: "android".into(),
            client_profile: "android".into(),
            user_agent: None,
            network: NetworkPosture {
                geo_bypass: true,
                geo_bypass_country: Some("US".into()),
                force_ipv4: false,
            },
            formats: vec!["bestaudio".into(), "best".into()],
            timeout_secs: 30,
        },
        StrategyConfig {
            name: "web".into(),
            client_profile: "web".into(),
            user_agent: Some(FIREFOX_WINDOWS_UA.into()),
            network: NetworkPosture {
                geo_bypass: true,
                geo_bypass_country: Some("US".into()),
                force_ipv4: true,
            },
            formats: vec!["bestaudio".into(), "best".into()],
            timeout_secs: 45,
        },
        StrategyConfig {
            name: "mweb".into(),
            client_profile: "mweb".into(),
            user_agent: Some(CHROME_MAC_UA.into()),
            network: NetworkPosture {
                geo_bypass: false,
                geo_bypass_country: None,
                force_ipv4: true,
            },
            formats: vec![
                "bestaudio[ext=m4a]".into(),
                "bestaudio".into(),
                "best".into(),
            ],
            timeout_secs: 60,
        },
    ]
}

/// Artwork retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub timeout_secs: u64,
    /// Downscale artwork so neither edge exceeds this. `None` keeps the source size.
    pub max_dimension: Option<u32>,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            max_dimension: Some(1280),
        }
    }
}

/// Where containers are published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishProvider {
    Cloudinary,
    #[default]
    Filesystem,
}

/// Cloudinary credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudinaryConfig {
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    #[serde(serialize_with = "serialize_option_secret")]
    pub api_secret: Option<Secret<String>>,
    /// Folder prefix for public ids.
    pub folder: Option<String>,
    /// API base override. Defaults to `https://api.cloudinary.com/v1_1`.
    pub api_base: Option<String>,
}

/// Local directory standing in for a blob store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemPublishConfig {
    /// Defaults to `<data_dir>/published`.
    pub root: Option<PathBuf>,
    /// Public URL prefix. Defaults to a `file://` URL of `root`.
    pub base_url: Option<String>,
}

/// Upload policy and provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    pub provider: PublishProvider,
    /// Sizes at or below this use a direct upload; larger ones are chunked.
    pub chunk_threshold_bytes: u64,
    pub chunk_size_bytes: u64,
    pub upload_timeout_secs: u64,
    pub cloudinary: CloudinaryConfig,
    pub filesystem: FilesystemPublishConfig,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            provider: PublishProvider::default(),
            chunk_threshold_bytes: 10 * 1024 * 1024,
            chunk_size_bytes: 20 * 1024 * 1024,
            upload_timeout_secs: 600,
            cloudinary: CloudinaryConfig::default(),
            filesystem: FilesystemPublishConfig::default(),
        }
    }
}

/// Catalog of published artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub collection: String,
    pub history_limit: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            collection: "recommendedSongs".into(),
            history_limit: 20,
        }
    }
}

/// Backlog processing cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub enabled: bool,
    pub poll_interval_secs: u64,
    /// Pause between two jobs of the same sweep.
    pub cooldown_secs: u64,
    /// Jobs in `processing` longer than this are reported by each sweep.
    pub stuck_after_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 300,
            cooldown_secs: 5,
            stuck_after_secs: 2 * 60 * 60,
        }
    }
}

// ── Serde helpers for Secret<String> ────────────────────────────────────────

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_three_strategies_with_increasing_timeouts() {
        let cfg = TunepressConfig::default();
        let timeouts: Vec<u64> = cfg
            .acquisition
            .strategies
            .iter()
            .map(|s| s.timeout_secs)
            .collect();
        assert_eq!(timeouts, vec![30, 45, 60]);
        assert_eq!(cfg.acquisition.max_attempts, 3);
        assert_eq!(cfg.publish.chunk_threshold_bytes, 10 * 1024 * 1024);
        assert_eq!(cfg.queue.poll_interval_secs, 300);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: TunepressConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [publish]
            provider = "cloudinary"

            [publish.cloudinary]
            cloud_name = "demo"
            api_key = "123"
            api_secret = "shh"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.server.port, 9000);
        assert_eq!(cfg.server.bind, "127.0.0.1");
        assert_eq!(cfg.publish.provider, PublishProvider::Cloudinary);
        assert_eq!(
            cfg.publish
                .cloudinary
                .api_secret
                .as_ref()
                .map(|s| s.expose_secret().as_str()),
            Some("shh")
        );
        assert_eq!(cfg.acquisition.strategies.len(), 3);
    }

    #[test]
    fn strategy_list_parses_as_value_objects() {
        let cfg: TunepressConfig = toml::from_str(
            r#"
            [[acquisition.strategies]]
            name = "only"
            client_profile = "ios"
            formats = ["bestaudio"]
            timeout_secs = 20

            [acquisition.strategies.network]
            force_ipv4 = true
            "#,
        )
        .unwrap();
        let strategies = &cfg.acquisition.strategies;
        assert_eq!(strategies.len(), 1);
        assert_eq!(strategies[0].client_profile, "ios");
        assert!(strategies[0].network.force_ipv4);
        assert!(strategies[0].user_agent.is_none());
    }

    #[test]
    fn database_url_defaults_under_data_dir() {
        let storage = StorageConfig {
            data_dir: Some(PathBuf::from("/srv/tp")),
            ..Default::default()
        };
        assert_eq!(
            storage.resolved_database_url(),
            "sqlite:///srv/tp/tunepress.db?mode=rwc"
        );
        assert_eq!(
            storage.resolved_downloads_dir(),
            PathBuf::from("/srv/tp/downloads")
        );
    }
}
