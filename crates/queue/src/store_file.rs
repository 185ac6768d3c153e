//! JSON document store with atomic writes.
//!
//! The file holds one object keyed by job id, each value a [`JobRecord`].
//! Every mutation is a read-modify-write under one lock, so `claim` is a
//! compare-and-set within the process.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    tokio::{fs, sync::Mutex},
    tracing::warn,
};

use crate::{
    Error, Result,
    store::{JobStore, claim_in, finish, sorted_oldest_first},
    types::{Job, JobRecord, JobStatus},
};

pub struct FileJobStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileJobStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_dirs(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Job>> {
        if !fs::try_exists(&self.path).await.unwrap_or(false) {
            return Ok(Vec::new());
        }
        let data = fs::read_to_string(&self.path).await?;
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        let docs: BTreeMap<String, JobRecord> = serde_json::from_str(&data)?;
        Ok(docs
            .into_iter()
            .map(|(id, record)| Job::from_record(id, record))
            .collect())
    }

    /// Write to a temp file, keep the previous file as `.bak`, rename over.
    async fn atomic_write(&self, jobs: &[Job]) -> Result<()> {
        self.ensure_dirs().await?;
        let docs: BTreeMap<&str, JobRecord> =
            jobs.iter().map(|j| (j.id.as_str(), j.to_record())).collect();
        let json = serde_json::to_string_pretty(&docs)?;
        let tmp = self.path.with_extension("json.tmp");

        fs::write(&tmp, json.as_bytes()).await?;

        if fs::try_exists(&self.path).await.unwrap_or(false) {
            let bak = self.path.with_extension("json.bak");
            if let Err(e) = fs::rename(&self.path, &bak).await {
                warn!(path = %self.path.display(), error = %e, "could not keep job file backup");
            }
        }

        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn mutate<T>(&self, f: impl FnOnce(&mut Vec<Job>) -> Result<(T, bool)>) -> Result<T> {
        let _guard = self.lock.lock().await;
        let mut jobs = self.load().await?;
        let (out, dirty) = f(&mut jobs)?;
        if dirty {
            self.atomic_write(&jobs).await?;
        }
        Ok(out)
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        self.mutate(|jobs| {
            if jobs.iter().any(|j| j.id == job.id) {
                return Err(Error::message(format!("job already exists: {}", job.id)));
            }
            jobs.push(job.clone());
            Ok(((), true))
        })
        .await
    }

    async fn get(&self, id: &str) -> Result<Option<Job>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_iter().find(|j| j.id == id))
    }

    async fn list(&self) -> Result<Vec<Job>> {
        let _guard = self.lock.lock().await;
        Ok(sorted_oldest_first(self.load().await?))
    }

    async fn pending(&self) -> Result<Vec<Job>> {
        let _guard = self.lock.lock().await;
        let jobs = self.load().await?;
        Ok(sorted_oldest_first(
            jobs.into_iter()
                .filter(|j| j.status == JobStatus::Pending)
                .collect(),
        ))
    }

    async fn claim(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        self.mutate(|jobs| {
            let won = claim_in(jobs, id, now);
            Ok((won, won))
        })
        .await
    }

    async fn complete(&self, id: &str, artifact_url: &str, now: DateTime<Utc>) -> Result<()> {
        self.mutate(|jobs| {
            finish(jobs, id, JobStatus::Completed, artifact_url, now)?;
            Ok(((), true))
        })
        .await
    }

    async fn fail(&self, id: &str, error: &str, now: DateTime<Utc>) -> Result<()> {
        self.mutate(|jobs| {
            finish(jobs, id, JobStatus::Failed, error, now)?;
            Ok(((), true))
        })
        .await
    }
}
