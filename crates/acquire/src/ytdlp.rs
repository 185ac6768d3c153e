//! `yt-dlp` adapter: search, probe and audio download through the CLI.
//!
//! Every call is a child process. Failures are classified from stderr into
//! [`SourceErrorKind`]s so the acquirer can decide between format fallback,
//! strategy rotation and giving up.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use {
    async_trait::async_trait,
    serde::Deserialize,
    tokio::{process::Command, time::timeout},
    tracing::{debug, warn},
    tunepress_config::YtDlpConfig,
    tunepress_media::mime::mime_for_extension,
};

use crate::{
    error::{SourceError, SourceErrorKind},
    info::{LiveStatus, MediaInfo},
    source::{AttemptPlan, FetchedAudio, MediaSearch, MediaSource},
};

const DEFAULT_BINARY: &str = "yt-dlp";

/// Output stem inside the scratch dir; the extension is chosen by yt-dlp.
const OUTPUT_STEM: &str = "audio";

const UNKNOWN_ARTIST: &str = "Unknown Artist";
const UNKNOWN_TITLE: &str = "Unknown Title";

/// stderr fragments that signal an anti-automation wall.
const BLOCKED_MARKERS: &[&str] = &[
    "sign in to confirm",
    "not a bot",
    "http error 429",
    "too many requests",
    "confirm your age",
];

const UNSUPPORTED_FORMAT_MARKERS: &[&str] = &["requested format is not available"];

#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: PathBuf,
    config: YtDlpConfig,
    probe_timeout: Duration,
    search_timeout: Duration,
}

impl YtDlp {
    pub fn new(
        binary: PathBuf,
        config: YtDlpConfig,
        probe_timeout: Duration,
        search_timeout: Duration,
    ) -> Self {
        Self {
            binary,
            config,
            probe_timeout,
            search_timeout,
        }
    }

    /// Locate the binary (explicit path first, then `PATH`).
    pub fn discover(
        config: &YtDlpConfig,
        probe_timeout: Duration,
        search_timeout: Duration,
    ) -> Option<Self> {
        let binary = find_binary(DEFAULT_BINARY, config.binary.as_deref())?;
        debug!(binary = %binary.display(), "found yt-dlp");
        Some(Self::new(
            binary,
            config.clone(),
            probe_timeout,
            search_timeout,
        ))
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    async fn run(&self, args: &[String], limit: Duration) -> Result<Vec<u8>, SourceError> {
        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let output = match timeout(limit, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(SourceError::transient(format!(
                    "failed to run {}: {e}",
                    self.binary.display()
                )));
            },
            Err(_) => {
                return Err(SourceError::transient(format!(
                    "yt-dlp timed out after {}s",
                    limit.as_secs()
                )));
            },
        };

        if output.status.success() {
            return Ok(output.stdout);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = last_error_line(&stderr);
        Err(SourceError::new(classify_stderr(&stderr), message))
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = vec!["--no-warnings".to_string(), "--no-playlist".to_string()];
        if let Some(cookies) = &self.config.cookies_file {
            args.push("--cookies".into());
            args.push(cookies.display().to_string());
        }
        args
    }

    fn fetch_args(&self, url: &str, plan: &AttemptPlan<'_>, scratch_dir: &Path) -> Vec<String> {
        let strategy = plan.strategy;
        let mut args = self.common_args();
        args.extend([
            "--no-progress".to_string(),
            "-f".into(),
            plan.format.to_string(),
            "-x".into(),
            "--audio-format".into(),
            self.config.audio_codec.clone(),
            "--audio-quality".into(),
            self.config.audio_quality.clone(),
            "-o".into(),
            scratch_dir
                .join(format!("{OUTPUT_STEM}.%(ext)s"))
                .display()
                .to_string(),
            "--print".into(),
            "after_move:filepath".into(),
            "--socket-timeout".into(),
            strategy.timeout.as_secs().max(1).to_string(),
            "--extractor-args".into(),
            format!("youtube:player_client={}", strategy.client_profile),
        ]);
        if let Some(ua) = plan.user_agent {
            args.push("--user-agent".into());
            args.push(ua.to_string());
        }
        match (&strategy.network.geo_bypass_country, strategy.network.geo_bypass) {
            (Some(country), true) => {
                args.push("--geo-bypass-country".into());
                args.push(country.clone());
            },
            (None, true) => args.push("--geo-bypass".into()),
            (_, false) => {},
        }
        if strategy.network.force_ipv4 {
            args.push("--force-ipv4".into());
        }
        if let Some(ffmpeg) = &self.config.ffmpeg_location {
            args.push("--ffmpeg-location".into());
            args.push(ffmpeg.clone());
        }
        args.push(url.to_string());
        args
    }
}

#[async_trait]
impl MediaSearch for YtDlp {
    async fn search(&self, query: &str) -> Result<Option<String>, SourceError> {
        let mut args = self.common_args();
        args.extend([
            "--flat-playlist".to_string(),
            "--dump-single-json".into(),
            format!("ytsearch1:{query}"),
        ]);
        let stdout = self.run(&args, self.search_timeout).await?;
        parse_search(&stdout)
    }
}

#[async_trait]
impl MediaSource for YtDlp {
    async fn probe(&self, url: &str) -> Result<MediaInfo, SourceError> {
        let mut args = self.common_args();
        args.extend([
            "--dump-single-json".to_string(),
            "--skip-download".into(),
            url.to_string(),
        ]);
        let stdout = self.run(&args, self.probe_timeout).await?;
        parse_probe(&stdout)
    }

    async fn fetch_audio(
        &self,
        url: &str,
        plan: &AttemptPlan<'_>,
        scratch_dir: &Path,
    ) -> Result<FetchedAudio, SourceError> {
        let args = self.fetch_args(url, plan, scratch_dir);
        let stdout = self.run(&args, plan.strategy.timeout).await?;

        let printed = String::from_utf8_lossy(&stdout);
        let path = locate_output(printed.lines().last(), scratch_dir, OUTPUT_STEM)
            .ok_or_else(|| SourceError::transient("download finished but no output file was found"))?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| SourceError::transient(format!("failed to read {}: {e}", path.display())))?;
        if bytes.is_empty() {
            return Err(SourceError::transient("downloaded audio file is empty"));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Ok(FetchedAudio {
            bytes,
            mime_type: mime_for_extension(ext).to_string(),
        })
    }
}

/// Find a binary at `config_path`, or in `PATH`.
pub fn find_binary(name: &str, config_path: Option<&str>) -> Option<PathBuf> {
    if let Some(path_str) = config_path {
        let path = PathBuf::from(path_str);
        if path.is_file() {
            return Some(path);
        }
        if let Ok(found) = which::which(path_str) {
            return Some(found);
        }
        warn!(path = path_str, "configured yt-dlp binary not found, searching PATH");
    }
    which::which(name).ok()
}

/// Map extractor stderr to a failure kind. Anything unrecognized is transient.
pub fn classify_stderr(stderr: &str) -> SourceErrorKind {
    let lower = stderr.to_ascii_lowercase();
    if BLOCKED_MARKERS.iter().any(|m| lower.contains(m)) {
        SourceErrorKind::Blocked
    } else if UNSUPPORTED_FORMAT_MARKERS.iter().any(|m| lower.contains(m)) {
        SourceErrorKind::UnsupportedFormat
    } else {
        SourceErrorKind::Transient
    }
}

fn last_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| l.starts_with("ERROR"))
        .or_else(|| stderr.lines().rev().map(str::trim).find(|l| !l.is_empty()))
        .unwrap_or("yt-dlp exited with an error")
        .to_string()
}

/// The downloaded file: the path yt-dlp printed if it exists, otherwise the
/// first file in `dir` whose name starts with `stem`.
fn locate_output(printed: Option<&str>, dir: &Path, stem: &str) -> Option<PathBuf> {
    if let Some(line) = printed.map(str::trim).filter(|l| !l.is_empty()) {
        let path = PathBuf::from(line);
        if path.is_file() {
            return Some(path);
        }
    }
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(stem) && !n.ends_with(".part"))
        })
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

#[derive(Debug, Deserialize)]
struct SearchJson {
    #[serde(default)]
    entries: Vec<SearchEntry>,
}

#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
}

fn parse_search(stdout: &[u8]) -> Result<Option<String>, SourceError> {
    let parsed: SearchJson = serde_json::from_slice(stdout)
        .map_err(|e| SourceError::transient(format!("unreadable search output: {e}")))?;
    Ok(parsed.entries.into_iter().next().and_then(|e| {
        e.webpage_url
            .or(e.url.filter(|u| u.starts_with("http")))
            .or_else(|| e.id.map(|id| format!("https://www.youtube.com/watch?v={id}")))
    }))
}

#[derive(Debug, Deserialize)]
struct ProbeJson {
    title: Option<String>,
    uploader: Option<String>,
    channel: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    is_live: Option<bool>,
    #[serde(default)]
    was_live: Option<bool>,
    live_status: Option<String>,
    thumbnail: Option<String>,
}

fn parse_probe(stdout: &[u8]) -> Result<MediaInfo, SourceError> {
    let p: ProbeJson = serde_json::from_slice(stdout)
        .map_err(|e| SourceError::transient(format!("unreadable probe output: {e}")))?;

    let live_status = match p.live_status.as_deref() {
        Some("is_live") => LiveStatus::Live,
        Some("was_live" | "post_live") => LiveStatus::WasLive,
        Some("is_upcoming") => LiveStatus::Upcoming,
        Some(_) => LiveStatus::None,
        None if p.is_live == Some(true) => LiveStatus::Live,
        None if p.was_live == Some(true) => LiveStatus::WasLive,
        None => LiveStatus::None,
    };

    Ok(MediaInfo {
        title: p
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_TITLE.into()),
        artist: p
            .uploader
            .or(p.channel)
            .filter(|a| !a.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_ARTIST.into()),
        duration_seconds: p
            .duration
            .filter(|d| d.is_finite() && *d > 0.0)
            .map(|d| d.round() as u64),
        live_status,
        thumbnail_url: p.thumbnail,
    })
}
