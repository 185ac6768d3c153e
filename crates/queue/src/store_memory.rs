//! In-memory job store for tests and ephemeral runs.

use std::sync::Mutex;

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
};

use crate::{
    Error, Result,
    store::{JobStore, claim_in, finish, sorted_oldest_first},
    types::{Job, JobStatus},
};

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<Vec<Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        if jobs.iter().any(|j| j.id == job.id) {
            return Err(Error::message(format!("job already exists: {}", job.id)));
        }
        jobs.push(job.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Job>> {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<Job>> {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sorted_oldest_first(jobs.clone()))
    }

    async fn pending(&self) -> Result<Vec<Job>> {
        let jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(sorted_oldest_first(
            jobs.iter()
                .filter(|j| j.status == JobStatus::Pending)
                .cloned()
                .collect(),
        ))
    }

    async fn claim(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(claim_in(&mut jobs, id, now))
    }

    async fn complete(&self, id: &str, artifact_url: &str, now: DateTime<Utc>) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        finish(&mut jobs, id, JobStatus::Completed, artifact_url, now)
    }

    async fn fail(&self, id: &str, error: &str, now: DateTime<Utc>) -> Result<()> {
        let mut jobs = self.jobs.lock().unwrap_or_else(|e| e.into_inner());
        finish(&mut jobs, id, JobStatus::Failed, error, now)
    }
}
