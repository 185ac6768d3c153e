//! Catalog of published artifacts: one descriptive record per successful publish.

use std::sync::Mutex;

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    sqlx::{Row, SqlitePool, sqlite::SqlitePoolOptions},
};

use crate::Result;

/// Document written after a publish. Field names follow the catalog's
/// document shape (`cloudinaryUrl` regardless of the blob provider).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub title: String,
    pub artist: String,
    pub duration: String,
    #[serde(rename = "cloudinaryUrl")]
    pub artifact_url: String,
    pub created_at: DateTime<Utc>,
    pub source: String,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub local_path: Option<String>,
    pub status: String,
    pub audio_type: String,
    pub image_type: Option<String>,
    pub content_type: String,
    pub size_bytes: u64,
    pub version: u8,
    pub is_live: bool,
    pub was_live: bool,
}

/// A record with the id the store assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: String,
    #[serde(flatten)]
    pub record: CatalogRecord,
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Persist `record`, returning its new id.
    async fn insert(&self, record: &CatalogRecord) -> Result<String>;

    /// Most recent records first.
    async fn recent(&self, limit: usize) -> Result<Vec<StoredRecord>>;

    /// Whether the backend currently answers.
    async fn is_available(&self) -> bool;
}

/// Process-local catalog.
#[derive(Default)]
pub struct InMemoryCatalog {
    records: Mutex<Vec<StoredRecord>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalog {
    async fn insert(&self, record: &CatalogRecord) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(StoredRecord {
                id: id.clone(),
                record: record.clone(),
            });
        Ok(id)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<StoredRecord>> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<_> = records.clone();
        // Newest first; among equal timestamps the latest insert wins.
        out.sort_by_key(|r| r.record.created_at);
        out.reverse();
        out.truncate(limit);
        Ok(out)
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// SQLite-backed catalog. Records are stored as JSON under a collection name.
pub struct SqliteCatalog {
    pool: SqlitePool,
    collection: String,
}

impl SqliteCatalog {
    /// Connect with an own pool and run migrations.
    pub async fn new(database_url: &str, collection: impl Into<String>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        crate::run_migrations(&pool).await?;
        Ok(Self::with_pool(pool, collection))
    }

    /// Use an existing pool; [`crate::run_migrations`] must already have run.
    pub fn with_pool(pool: SqlitePool, collection: impl Into<String>) -> Self {
        Self {
            pool,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn insert(&self, record: &CatalogRecord) -> Result<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let data = serde_json::to_string(record)?;
        sqlx::query("INSERT INTO catalog (id, collection, created_at, data) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(&self.collection)
            .bind(record.created_at.to_rfc3339())
            .bind(&data)
            .execute(&self.pool)
            .await?;
        Ok(id)
    }

    async fn recent(&self, limit: usize) -> Result<Vec<StoredRecord>> {
        let rows = sqlx::query(
            "SELECT id, data FROM catalog
             WHERE collection = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
        )
        .bind(&self.collection)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let data: String = row.get("data");
            out.push(StoredRecord {
                id: row.get("id"),
                record: serde_json::from_str(&data)?,
            });
        }
        Ok(out)
    }

    async fn is_available(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, chrono::TimeZone};

    fn record(title: &str, minute: u32) -> CatalogRecord {
        CatalogRecord {
            title: title.into(),
            artist: "Band".into(),
            duration: "2:05".into(),
            artifact_url: format!("https://cdn.test/{title}.m3ew"),
            created_at: Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap(),
            source: "YouTube".into(),
            source_url: None,
            thumbnail_url: None,
            local_path: None,
            status: "completed".into(),
            audio_type: "audio/mpeg".into(),
            image_type: None,
            content_type: "application/x-m3ew".into(),
            size_bytes: 1024,
            version: 1,
            is_live: false,
            was_live: false,
        }
    }

    async fn sqlite(dir: &tempfile::TempDir, collection: &str) -> SqliteCatalog {
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("catalog.db").display());
        SqliteCatalog::new(&url, collection).await.unwrap()
    }

    #[test]
    fn record_uses_document_field_names() {
        let json = serde_json::to_value(record("Song A", 0)).unwrap();
        assert_eq!(json["cloudinaryUrl"], "https://cdn.test/Song A.m3ew");
        assert_eq!(json["audioType"], "audio/mpeg");
        assert!(json["imageType"].is_null());
        assert_eq!(json["isLive"], false);
        assert!(json.get("artifactUrl").is_none());
    }

    #[tokio::test]
    async fn memory_recent_is_newest_first() {
        let store = InMemoryCatalog::new();
        store.insert(&record("old", 1)).await.unwrap();
        store.insert(&record("new", 5)).await.unwrap();
        store.insert(&record("mid", 3)).await.unwrap();

        let titles: Vec<_> = store
            .recent(2)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.record.title)
            .collect();
        assert_eq!(titles, vec!["new", "mid"]);
    }

    #[tokio::test]
    async fn sqlite_roundtrip_and_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = sqlite(&dir, "recommendedSongs").await;
        assert!(store.is_available().await);

        let id = store.insert(&record("a", 1)).await.unwrap();
        store.insert(&record("b", 2)).await.unwrap();
        store.insert(&record("c", 3)).await.unwrap();

        let recent = store.recent(2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].record.title, "c");
        assert_eq!(recent[1].record, record("b", 2));

        let all = store.recent(10).await.unwrap();
        assert_eq!(all.last().unwrap().id, id);
    }

    #[tokio::test]
    async fn sqlite_collections_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        let songs = sqlite(&dir, "songs").await;
        let other = SqliteCatalog::with_pool(songs.pool.clone(), "other");
        songs.insert(&record("a", 1)).await.unwrap();
        assert!(other.recent(10).await.unwrap().is_empty());
        assert_eq!(songs.recent(10).await.unwrap().len(), 1);
    }
}
