//! Object store over SQLite via sqlx.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::batch::BatchReport;
use crate::error::StoreError;
use crate::migrations;
use crate::models::{ConfigEntry, NewFile, VaultFile};

/// Config key holding the vault passcode.
pub const PASSWORD_KEY: &str = "password";

const FILE_COLUMNS: &str = "id, name, mime_type, size, data, created_at";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub busy_timeout: Duration,
    pub max_connections: u32,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: Duration::from_secs(5),
            max_connections: 4,
        }
    }
}

/// Central store handle.  Cheap to clone (Arc internally).
///
/// Constructing a handle does not touch disk; the database is opened on the
/// first operation and the pool is then shared by every clone.
#[derive(Clone)]
pub struct ObjectStore {
    inner: Arc<Inner>,
}

struct Inner {
    config: StoreConfig,
    pool: OnceCell<SqlitePool>,
    clock: CreationClock,
}

impl ObjectStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                pool: OnceCell::new(),
                clock: CreationClock::default(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.config.path
    }

    /// Open (or create) the database and run pending migrations.
    ///
    /// Idempotent. Concurrent first callers wait on the same initialisation
    /// and all receive the same pool. A failed open is not remembered, so
    /// the next call tries again.
    pub async fn open(&self) -> Result<&SqlitePool, StoreError> {
        self.inner
            .pool
            .get_or_try_init(|| async {
                let pool = connect(&self.inner.config).await?;
                let newest: i64 =
                    sqlx::query_scalar("SELECT COALESCE(MAX(created_at), 0) FROM files")
                        .fetch_one(&pool)
                        .await
                        .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                self.inner.clock.observe(newest);
                info!("[store] opened {}", self.inner.config.path.display());
                Ok::<_, StoreError>(pool)
            })
            .await
    }

    // ── Config collection ───────────────────────────────────────────────────

    pub async fn get_config(&self, key: &str) -> Result<Option<ConfigEntry>, StoreError> {
        let pool = self.open().await?;
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM config WHERE key = ?")
            .bind(key)
            .fetch_optional(pool)
            .await?;

        raw.map(|text| {
            serde_json::from_str(&text)
                .map(|value| ConfigEntry {
                    key: key.to_string(),
                    value,
                })
                .map_err(|source| StoreError::Corrupt {
                    key: key.to_string(),
                    source,
                })
        })
        .transpose()
    }

    /// Upsert a config entry. Last write wins; no history is kept.
    pub async fn set_config(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        let text = serde_json::to_string(value)?;
        let pool = self.open().await?;

        let mut tx = pool.begin().await?;
        sqlx::query(
            "INSERT INTO config (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(text)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!("[store] config {key} updated");
        Ok(())
    }

    pub async fn has_password(&self) -> Result<bool, StoreError> {
        let pool = self.open().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM config WHERE key = ?")
            .bind(PASSWORD_KEY)
            .fetch_one(pool)
            .await?;
        Ok(count > 0)
    }

    /// Store the passcode in plaintext, replacing any previous value.
    pub async fn set_password(&self, plaintext: &str) -> Result<(), StoreError> {
        self.set_config(PASSWORD_KEY, &serde_json::Value::String(plaintext.to_string()))
            .await
    }

    /// Exact string comparison against the stored passcode.
    ///
    /// Returns `false` when no passcode is set, or when the stored value is
    /// not a JSON string.
    pub async fn verify_password(&self, candidate: &str) -> Result<bool, StoreError> {
        let entry = self.get_config(PASSWORD_KEY).await?;
        Ok(matches!(
            entry.map(|e| e.value),
            Some(serde_json::Value::String(stored)) if stored == candidate
        ))
    }

    // ── Files collection ────────────────────────────────────────────────────

    pub async fn save_file(&self, file: NewFile) -> Result<VaultFile, StoreError> {
        let pool = self.open().await?;
        let NewFile {
            name,
            mime_type,
            data,
        } = file;
        let record = VaultFile {
            id: Uuid::new_v4().to_string(),
            name,
            mime_type,
            size: data.len() as i64,
            data,
            created_at: self.inner.clock.stamp(),
        };

        let mut tx = pool.begin().await?;
        sqlx::query(
            "INSERT INTO files (id, name, mime_type, size, data, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.mime_type)
        .bind(record.size)
        .bind(&record.data)
        .bind(record.created_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        info!("[store] saved file id={} size={}", record.id, record.size);
        Ok(record)
    }

    /// Save each file in order, one transaction per file.
    pub async fn save_files(&self, files: Vec<NewFile>) -> BatchReport<VaultFile> {
        let mut report = BatchReport::new();
        for file in files {
            let name = file.name.clone();
            let outcome = self.save_file(file).await;
            if let Err(e) = &outcome {
                warn!("[store] save of {name} failed: {e}");
            }
            report.record(name, outcome);
        }
        report
    }

    /// All files, newest first.
    pub async fn get_files(&self) -> Result<Vec<VaultFile>, StoreError> {
        let pool = self.open().await?;
        let files = sqlx::query_as::<_, VaultFile>(&format!(
            "SELECT {FILE_COLUMNS} FROM files ORDER BY created_at DESC, rowid DESC"
        ))
        .fetch_all(pool)
        .await?;
        Ok(files)
    }

    pub async fn get_file(&self, id: &str) -> Result<Option<VaultFile>, StoreError> {
        let pool = self.open().await?;
        let file = sqlx::query_as::<_, VaultFile>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?;
        Ok(file)
    }

    /// Files whose name contains `query`, ignoring case. Newest first.
    pub async fn search_files(&self, query: &str) -> Result<Vec<VaultFile>, StoreError> {
        let files = self.get_files().await?;
        if query.is_empty() {
            return Ok(files);
        }
        let needle = query.to_lowercase();
        Ok(files
            .into_iter()
            .filter(|f| f.name.to_lowercase().contains(&needle))
            .collect())
    }

    pub async fn file_count(&self) -> Result<i64, StoreError> {
        let pool = self.open().await?;
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM files")
            .fetch_one(pool)
            .await?;
        Ok(count)
    }

    /// Remove a file. Deleting an unknown id is a no-op.
    pub async fn delete_file(&self, id: &str) -> Result<(), StoreError> {
        let pool = self.open().await?;
        let mut tx = pool.begin().await?;
        let removed = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        debug!("[store] delete id={id} removed={removed}");
        Ok(())
    }

    /// Delete each id in order. Each delete commits on its own.
    pub async fn delete_files<S: AsRef<str>>(&self, ids: &[S]) -> BatchReport<String> {
        let mut report = BatchReport::new();
        for id in ids {
            let id = id.as_ref();
            let outcome = self.delete_file(id).await.map(|()| id.to_string());
            if let Err(e) = &outcome {
                warn!("[store] delete of {id} failed: {e}");
            }
            report.record(id, outcome);
        }
        report
    }

    /// Wipe both collections in one transaction.
    pub async fn reset(&self) -> Result<(), StoreError> {
        let pool = self.open().await?;
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM files").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM config").execute(&mut *tx).await?;
        tx.commit().await?;

        warn!("[store] vault reset: all files and config removed");
        Ok(())
    }
}

async fn connect(config: &StoreConfig) -> Result<SqlitePool, StoreError> {
    if let Some(parent) = config.path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("cannot create {}: {e}", parent.display()))
            })?;
        }
    }

    let opts = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(config.busy_timeout);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(opts)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

    migrations::run(&pool).await?;
    Ok(pool)
}

/// Millisecond timestamps that strictly increase across calls, so a file
/// saved after another always sorts after it.
#[derive(Default)]
struct CreationClock {
    last: AtomicI64,
}

impl CreationClock {
    fn stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now.max(prev + 1)
    }

    fn observe(&self, millis: i64) {
        self.last.fetch_max(millis, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &Path) -> ObjectStore {
        ObjectStore::new(StoreConfig::new(dir.join("vault.db")))
    }

    #[test]
    fn clock_is_strictly_increasing() {
        let clock = CreationClock::default();
        let mut prev = clock.stamp();
        for _ in 0..1000 {
            let next = clock.stamp();
            assert!(next > prev);
            prev = next;
        }
    }

    #[test]
    fn clock_never_goes_behind_observed_value() {
        let clock = CreationClock::default();
        let future = Utc::now().timestamp_millis() + 60_000;
        clock.observe(future);
        assert_eq!(clock.stamp(), future + 1);
    }

    #[tokio::test]
    async fn concurrent_opens_share_one_pool() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let other = store.clone();

        let (a, b) = tokio::join!(store.open(), other.open());
        let a = a.expect("first open");
        let b = b.expect("second open");
        assert!(std::ptr::eq(a, b));
    }

    #[tokio::test]
    async fn open_reports_unavailable_and_retries() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let store = ObjectStore::new(StoreConfig::new(blocker.join("vault.db")));

        let err = store.has_password().await.unwrap_err();
        assert!(err.is_unavailable(), "got {err:?}");

        // Not cached: once the obstacle is gone the same handle opens.
        std::fs::remove_file(&blocker).unwrap();
        assert!(!store.has_password().await.expect("retry open"));
    }

    #[tokio::test]
    async fn corrupt_password_entry_is_an_error_not_absent() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        let pool = store.open().await.unwrap();
        sqlx::query("INSERT INTO config (key, value) VALUES ('password', 'not json')")
            .execute(pool)
            .await
            .unwrap();

        let err = store.verify_password("not json").await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref key, .. } if key == PASSWORD_KEY));
        assert!(store.has_password().await.unwrap());
    }

    #[tokio::test]
    async fn non_string_password_never_matches() {
        let dir = tempdir().unwrap();
        let store = store_in(dir.path());
        store
            .set_config(PASSWORD_KEY, &serde_json::json!(1234))
            .await
            .unwrap();

        assert!(store.has_password().await.unwrap());
        assert!(!store.verify_password("1234").await.unwrap());
    }

    #[tokio::test]
    async fn reopen_keeps_data_and_orders_new_files_first() {
        let dir = tempdir().unwrap();
        let first = {
            let store = store_in(dir.path());
            store.set_password("abcd").await.unwrap();
            store
                .save_file(NewFile::new("old.txt", "text/plain", b"old".to_vec()))
                .await
                .unwrap()
        };

        let store = store_in(dir.path());
        assert!(store.verify_password("abcd").await.unwrap());
        let second = store
            .save_file(NewFile::new("new.txt", "text/plain", b"new".to_vec()))
            .await
            .unwrap();
        assert!(second.created_at > first.created_at);

        let ids: Vec<_> = store
            .get_files()
            .await
            .unwrap()
            .into_iter()
            .map(|f| f.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }
}
