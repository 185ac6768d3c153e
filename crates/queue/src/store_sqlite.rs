//! SQLite-backed job store. Claims are a conditional `UPDATE`, so they stay
//! exclusive across processes sharing the database.

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    sqlx::{
        Row, SqlitePool,
        sqlite::{SqlitePoolOptions, SqliteRow},
    },
};

use crate::{
    Error, Result,
    store::JobStore,
    types::{Job, JobStatus},
};

const COLUMNS: &str = "id, song_name, status, created_at, started_at, completed_at, \
                       artifact_url, error, last_update";

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    /// Connect with an own pool and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        crate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Use an existing pool; [`crate::run_migrations`] must already have run.
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn transition(
        &self,
        id: &str,
        to: JobStatus,
        url: Option<&str>,
        error: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let ts = now.to_rfc3339();
        let result = sqlx::query(
            "UPDATE jobs
             SET status = ?, artifact_url = ?, error = ?, completed_at = ?, last_update = ?
             WHERE id = ? AND status = 'processing'",
        )
        .bind(to.as_str())
        .bind(url)
        .bind(error)
        .bind(&ts)
        .bind(&ts)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }
        match self.get(id).await? {
            Some(job) => Err(Error::invalid_transition(id, job.status, to)),
            None => Err(Error::job_not_found(id)),
        }
    }
}

fn parse_ts(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn row_to_job(row: &SqliteRow) -> Result<Job> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    let status = JobStatus::parse(&status)
        .ok_or_else(|| Error::message(format!("job {id} has unknown status '{status}'")))?;
    let created_at = parse_ts(Some(row.get("created_at")))
        .ok_or_else(|| Error::message(format!("job {id} has an unreadable created_at")))?;
    Ok(Job {
        song_name: row.get("song_name"),
        status,
        created_at,
        started_at: parse_ts(row.get("started_at")),
        completed_at: parse_ts(row.get("completed_at")),
        artifact_url: row.get("artifact_url"),
        error: row.get("error"),
        last_update: parse_ts(row.get("last_update")),
        id,
    })
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, job: &Job) -> Result<()> {
        sqlx::query(&format!(
            "INSERT INTO jobs ({COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(&job.id)
        .bind(&job.song_name)
        .bind(job.status.as_str())
        .bind(job.created_at.to_rfc3339())
        .bind(job.started_at.map(|t| t.to_rfc3339()))
        .bind(job.completed_at.map(|t| t.to_rfc3339()))
        .bind(&job.artifact_url)
        .bind(&job.error)
        .bind(job.last_update.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Job>> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM jobs WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_job).transpose()
    }

    async fn list(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM jobs ORDER BY created_at ASC, rowid ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_job).collect()
    }

    async fn pending(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM jobs WHERE status = 'pending'
             ORDER BY created_at ASC, rowid ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_job).collect()
    }

    async fn claim(&self, id: &str, now: DateTime<Utc>) -> Result<bool> {
        let ts = now.to_rfc3339();
        let result = sqlx::query(
            "UPDATE jobs SET status = 'processing', started_at = ?, last_update = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(&ts)
        .bind(&ts)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn complete(&self, id: &str, artifact_url: &str, now: DateTime<Utc>) -> Result<()> {
        self.transition(id, JobStatus::Completed, Some(artifact_url), None, now)
            .await
    }

    async fn fail(&self, id: &str, error: &str, now: DateTime<Utc>) -> Result<()> {
        self.transition(id, JobStatus::Failed, None, Some(error), now)
            .await
    }
}
