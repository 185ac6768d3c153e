//! Queue processor: claims pending jobs one at a time and runs each through
//! the injected pipeline callback.
//!
//! A sweep holds an async mutex for its whole duration, so manual and timed
//! sweeps never overlap inside one process. Cross-process exclusivity comes
//! from [`JobStore::claim`].

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use {
    chrono::Utc,
    serde::Serialize,
    tokio::{
        sync::{Mutex, Notify, RwLock},
        task::JoinHandle,
    },
    tracing::{debug, error, info, warn},
    tunepress_common::FailureKind,
    tunepress_config::QueueConfig,
};

use crate::{
    Error, Result,
    store::JobStore,
    types::{Job, JobStatus},
};

/// Why a job's pipeline run failed. Stored on the job as `"<code>: <message>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl JobFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Runs one job through the pipeline, yielding the artifact URL.
pub type ProcessFn = Arc<
    dyn Fn(Job) -> Pin<Box<dyn Future<Output = std::result::Result<String, JobFailure>> + Send>>
        + Send
        + Sync,
>;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SweepOutcome {
    Completed { url: String },
    Failed { error: String },
    /// Another processor claimed the job first.
    Skipped,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SweepEntry {
    pub job_id: String,
    pub song_name: String,
    pub result: SweepOutcome,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub results: Vec<SweepEntry>,
    /// Ids of jobs that have been processing longer than the stuck threshold.
    pub stuck: Vec<String>,
}

impl SweepReport {
    pub fn count(&self, pred: impl Fn(&SweepOutcome) -> bool) -> usize {
        self.results.iter().filter(|e| pred(&e.result)).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    pub poll_interval: Duration,
    pub cooldown: Duration,
    pub stuck_after: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self::from(&QueueConfig::default())
    }
}

impl From<&QueueConfig> for ProcessorConfig {
    fn from(cfg: &QueueConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(cfg.poll_interval_secs.max(1)),
            cooldown: Duration::from_secs(cfg.cooldown_secs),
            stuck_after: Duration::from_secs(cfg.stuck_after_secs),
        }
    }
}

pub struct JobQueueProcessor {
    store: Arc<dyn JobStore>,
    process: ProcessFn,
    config: ProcessorConfig,
    sweep_lock: Mutex<()>,
    timer_handle: Mutex<Option<JoinHandle<()>>>,
    wake_notify: Arc<Notify>,
    running: RwLock<bool>,
}

impl JobQueueProcessor {
    pub fn new(store: Arc<dyn JobStore>, process: ProcessFn, config: ProcessorConfig) -> Arc<Self> {
        Arc::new(Self {
            store,
            process,
            config,
            sweep_lock: Mutex::new(()),
            timer_handle: Mutex::new(None),
            wake_notify: Arc::new(Notify::new()),
            running: RwLock::new(false),
        })
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Add a pending job for `song_name`.
    pub async fn enqueue(&self, song_name: &str) -> Result<Job> {
        let song_name = song_name.trim();
        if song_name.is_empty() {
            return Err(Error::message("song name must not be empty"));
        }
        let job = Job::new(song_name);
        self.store.insert(&job).await?;
        info!(job_id = %job.id, song = %job.song_name, "job enqueued");
        self.wake();
        Ok(job)
    }

    /// Process every pending job once, oldest first.
    pub async fn sweep(&self) -> Result<SweepReport> {
        self.sweep_with(&self.process).await
    }

    /// Like [`sweep`](Self::sweep) but with a one-off pipeline callback,
    /// e.g. one that writes containers to a different folder.
    pub async fn sweep_with(&self, process: &ProcessFn) -> Result<SweepReport> {
        let _guard = self.sweep_lock.lock().await;
        let mut report = SweepReport {
            stuck: self.audit_stuck().await,
            ..Default::default()
        };

        let pending = self.store.pending().await?;
        if pending.is_empty() {
            debug!("no pending jobs");
            return Ok(report);
        }
        info!(count = pending.len(), "sweeping pending jobs");

        let mut processed = 0usize;
        for job in pending {
            if !self.store.claim(&job.id, Utc::now()).await? {
                debug!(job_id = %job.id, "job claimed elsewhere, skipping");
                report.results.push(SweepEntry {
                    job_id: job.id,
                    song_name: job.song_name,
                    result: SweepOutcome::Skipped,
                });
                continue;
            }

            if processed > 0 && !self.config.cooldown.is_zero() {
                tokio::time::sleep(self.config.cooldown).await;
            }
            processed += 1;

            let result = self.run_claimed(process, &job).await;
            report.results.push(SweepEntry {
                job_id: job.id,
                song_name: job.song_name,
                result,
            });
        }

        info!(
            completed = report.count(|r| matches!(r, SweepOutcome::Completed { .. })),
            failed = report.count(|r| matches!(r, SweepOutcome::Failed { .. })),
            skipped = report.count(|r| matches!(r, SweepOutcome::Skipped)),
            "sweep finished"
        );
        Ok(report)
    }

    async fn run_claimed(&self, process: &ProcessFn, job: &Job) -> SweepOutcome {
        info!(job_id = %job.id, song = %job.song_name, "processing job");
        let mut claimed = job.clone();
        claimed.status = JobStatus::Processing;

        match process(claimed).await {
            Ok(url) => match self.store.complete(&job.id, &url, Utc::now()).await {
                Ok(()) => {
                    info!(job_id = %job.id, url = %url, "job completed");
                    SweepOutcome::Completed { url }
                },
                // The job stays processing and surfaces in the stuck audit.
                Err(e) => {
                    error!(job_id = %job.id, url = %url, error = %e, "failed to record job completion");
                    SweepOutcome::Failed {
                        error: format!("could not record completion: {e}"),
                    }
                },
            },
            Err(failure) => {
                let message = failure.to_string();
                warn!(job_id = %job.id, kind = %failure.kind, error = %failure.message, "job failed");
                match self.store.fail(&job.id, &message, Utc::now()).await {
                    Ok(()) => SweepOutcome::Failed { error: message },
                    Err(e) => {
                        error!(job_id = %job.id, error = %e, "failed to record job failure");
                        SweepOutcome::Failed {
                            error: format!("{message} (could not record failure: {e})"),
                        }
                    },
                }
            },
        }
    }

    /// Log jobs stuck in processing. They are not reclaimed automatically.
    async fn audit_stuck(&self) -> Vec<String> {
        let Ok(window) = chrono::Duration::from_std(self.config.stuck_after) else {
            return Vec::new();
        };
        let cutoff = Utc::now() - window;
        match self.store.stuck(cutoff).await {
            Ok(jobs) => jobs
                .into_iter()
                .map(|job| {
                    warn!(
                        job_id = %job.id,
                        song = %job.song_name,
                        started_at = ?job.started_at,
                        "job stuck in processing"
                    );
                    job.id
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "stuck job audit failed");
                Vec::new()
            },
        }
    }

    /// Start the periodic sweep loop. The first sweep runs immediately.
    pub async fn start(self: &Arc<Self>) {
        let mut handle = self.timer_handle.lock().await;
        if handle.is_some() {
            return;
        }
        *self.running.write().await = true;

        let svc = Arc::clone(self);
        *handle = Some(tokio::spawn(async move {
            svc.timer_loop().await;
        }));
        info!(
            poll_secs = self.config.poll_interval.as_secs(),
            "queue processor started"
        );
    }

    /// Stop the loop. A sweep in flight is aborted; its claimed job stays
    /// `processing` and shows up in the next stuck audit.
    pub async fn stop(&self) {
        *self.running.write().await = false;
        self.wake_notify.notify_one();

        let mut handle = self.timer_handle.lock().await;
        if let Some(h) = handle.take() {
            h.abort();
        }
        info!("queue processor stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Cut the current poll wait short.
    pub fn wake(&self) {
        self.wake_notify.notify_one();
    }

    async fn timer_loop(self: &Arc<Self>) {
        loop {
            if !*self.running.read().await {
                break;
            }

            if let Err(e) = self.sweep().await {
                error!(error = %e, "queue sweep failed");
            }

            if !*self.running.read().await {
                break;
            }

            let notify = Arc::clone(&self.wake_notify);
            tokio::select! {
                () = tokio::time::sleep(self.config.poll_interval) => {},
                () = notify.notified() => {
                    debug!("queue loop woken by notify");
                },
            }
        }
    }
}
