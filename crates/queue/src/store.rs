//! Persistence trait for the job backlog.

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
};

use crate::{
    Error, Result,
    types::{Job, JobStatus},
};

/// Persistence backend for queued jobs.
///
/// `claim` is the only way out of `pending` and must be an atomic
/// compare-and-set: when several processors race for the same job exactly
/// one of them sees `true`.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: &Job) -> Result<()>;
    async fn get(&self, id: &str) -> Result<Option<Job>>;
    /// All jobs, oldest first.
    async fn list(&self) -> Result<Vec<Job>>;
    /// Pending jobs, oldest first.
    async fn pending(&self) -> Result<Vec<Job>>;
    /// Move `id` from pending to processing. `false` when the job is gone
    /// or no longer pending.
    async fn claim(&self, id: &str, now: DateTime<Utc>) -> Result<bool>;
    /// Move a processing job to completed.
    async fn complete(&self, id: &str, artifact_url: &str, now: DateTime<Utc>) -> Result<()>;
    /// Move a processing job to failed.
    async fn fail(&self, id: &str, error: &str, now: DateTime<Utc>) -> Result<()>;

    /// Processing jobs whose claim is older than `cutoff`.
    async fn stuck(&self, cutoff: DateTime<Utc>) -> Result<Vec<Job>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|j| j.status == JobStatus::Processing)
            .filter(|j| j.started_at.is_none_or(|t| t < cutoff))
            .collect())
    }
}

/// Shared in-place transition used by the document-style stores.
pub(crate) fn finish(
    jobs: &mut [Job],
    id: &str,
    to: JobStatus,
    detail: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let job = jobs
        .iter_mut()
        .find(|j| j.id == id)
        .ok_or_else(|| Error::job_not_found(id))?;
    if job.status != JobStatus::Processing {
        return Err(Error::invalid_transition(id, job.status, to));
    }
    match to {
        JobStatus::Completed => job.mark_completed(detail, now),
        _ => job.mark_failed(detail, now),
    }
    Ok(())
}

/// Shared claim used by the document-style stores.
pub(crate) fn claim_in(jobs: &mut [Job], id: &str, now: DateTime<Utc>) -> bool {
    match jobs.iter_mut().find(|j| j.id == id) {
        Some(job) if job.status == JobStatus::Pending => {
            job.mark_processing(now);
            true
        },
        _ => false,
    }
}

pub(crate) fn sorted_oldest_first(mut jobs: Vec<Job>) -> Vec<Job> {
    jobs.sort_by_key(|j| j.created_at);
    jobs
}
