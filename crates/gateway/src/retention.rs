//! Periodic cleanup of old containers in the downloads folder.

use std::{
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use {
    tokio::task::JoinHandle,
    tracing::{debug, info, warn},
};

use crate::Result;

/// Delete regular files directly under `dir` last modified before
/// `now - max_age`. Returns how many were removed.
pub async fn purge_expired(dir: &Path, max_age: Duration, now: SystemTime) -> Result<usize> {
    let Some(cutoff) = now.checked_sub(max_age) else {
        return Ok(0);
    };
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        if modified >= cutoff {
            continue;
        }
        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                debug!(path = %entry.path().display(), "expired artifact removed");
                removed += 1;
            },
            Err(e) => warn!(path = %entry.path().display(), error = %e, "could not remove artifact"),
        }
    }
    Ok(removed)
}

/// Run [`purge_expired`] every `interval` until the handle is aborted.
pub fn spawn_retention(dir: PathBuf, max_age: Duration, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        loop {
            ticker.tick().await;
            match purge_expired(&dir, max_age, SystemTime::now()).await {
                Ok(0) => {},
                Ok(removed) => info!(removed, dir = %dir.display(), "retention sweep"),
                Err(e) => warn!(error = %e, "retention sweep failed"),
            }
        }
    })
}
