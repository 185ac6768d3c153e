use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// Lifecycle of a queued job. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A backlog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub song_name: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

impl Job {
    /// A fresh pending job with a random id.
    pub fn new(song_name: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), song_name, Utc::now())
    }

    pub fn with_id(
        id: impl Into<String>,
        song_name: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            song_name: song_name.into(),
            status: JobStatus::Pending,
            created_at,
            started_at: None,
            completed_at: None,
            artifact_url: None,
            error: None,
            last_update: None,
        }
    }

    /// Apply `pending → processing`.
    pub(crate) fn mark_processing(&mut self, now: DateTime<Utc>) {
        self.status = JobStatus::Processing;
        self.started_at = Some(now);
        self.last_update = Some(now);
    }

    pub(crate) fn mark_completed(&mut self, url: &str, now: DateTime<Utc>) {
        self.status = JobStatus::Completed;
        self.artifact_url = Some(url.to_string());
        self.completed_at = Some(now);
        self.last_update = Some(now);
    }

    pub(crate) fn mark_failed(&mut self, error: &str, now: DateTime<Utc>) {
        self.status = JobStatus::Failed;
        self.error = Some(error.to_string());
        self.completed_at = Some(now);
        self.last_update = Some(now);
    }

    /// Convert to the document shape used by the file store and the API.
    pub fn to_record(&self) -> JobRecord {
        JobRecord {
            song_name: self.song_name.clone(),
            finished: self.status.is_terminal(),
            processing: match self.status {
                JobStatus::Pending => None,
                s => Some(s == JobStatus::Processing),
            },
            created_at: Some(self.created_at),
            started_at: self.started_at,
            completed_at: self.completed_at,
            cloudinary_url: self.artifact_url.clone(),
            error: self.error.clone(),
            last_update: self.last_update,
        }
    }

    /// Rebuild a job from its document. Status is derived from the flags:
    /// finished with an error is failed, finished without one is completed,
    /// a set `processing` flag is processing, anything else is pending.
    pub fn from_record(id: impl Into<String>, record: JobRecord) -> Self {
        let status = match (record.finished, record.processing, &record.error) {
            (true, _, Some(_)) => JobStatus::Failed,
            (true, ..) => JobStatus::Completed,
            (false, Some(true), _) => JobStatus::Processing,
            _ => JobStatus::Pending,
        };
        let created_at = record
            .created_at
            .or(record.started_at)
            .or(record.last_update)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        Self {
            id: id.into(),
            song_name: record.song_name,
            status,
            created_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
            artifact_url: record.cloudinary_url,
            error: record.error,
            last_update: record.last_update,
        }
    }
}

/// Document form of a job: `finished`/`processing` flags instead of a status
/// enum, and the artifact URL under `cloudinaryUrl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub song_name: String,
    #[serde(default)]
    pub finished: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloudinary_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}
