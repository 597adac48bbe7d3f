//! Directory-entry metadata store.
//!
//! A flat keyed table with string parent pointers, re-resolved on every
//! operation. There is deliberately no in-memory tree and no row locking:
//! concurrent updates to the same entry race at the database's normal
//! granularity and the last write wins.

pub mod users;

use crate::domain::DirEntry;
use crate::error::{FsError, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;

#[async_trait::async_trait]
pub trait EntryStore: Send + Sync {
    /// Creates a new row, stamping `created = modified = now`. A key
    /// collision on `(username, filename)` surfaces as `AlreadyExists`.
    async fn insert(&self, entry: &mut DirEntry) -> Result<()>;

    /// Removes the row matching the key. Returns the number of rows removed;
    /// deleting an absent row yields zero, not an error.
    async fn delete(&self, username: &str, filename: &str) -> Result<u64>;

    /// Point lookup. `NotFound` if the row is absent.
    async fn stat(&self, username: &str, filename: &str) -> Result<DirEntry>;

    /// All entries whose `parent` equals `parent`, optionally filtered by a
    /// SQL `LIKE` pattern on `filename`. Order is backend-determined;
    /// callers needing order must sort.
    async fn scan_children(
        &self,
        username: &str,
        parent: &str,
        pattern: Option<&str>,
    ) -> Result<Vec<DirEntry>>;

    /// Overwrites the mutable fields (`mode`, `size`, `modified`,
    /// `location`, `content_key`) of an existing row. `NotFound` if the row
    /// no longer exists.
    async fn update(&self, entry: &DirEntry) -> Result<()>;

    /// Liveness check of the underlying connection.
    async fn ping(&self) -> Result<()>;
}

pub struct SqliteEntryStore {
    pool: Arc<SqlitePool>,
}

impl SqliteEntryStore {
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        SqliteEntryStore { pool }
    }
}

#[async_trait::async_trait]
impl EntryStore for SqliteEntryStore {
    async fn insert(&self, entry: &mut DirEntry) -> Result<()> {
        entry.created = Utc::now();
        entry.modified = entry.created;

        sqlx::query(
            "INSERT INTO entries (username, filename, parent, location, content_key, mode, size, created, modified) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry.username)
        .bind(&entry.filename)
        .bind(&entry.parent)
        .bind(&entry.location)
        .bind(&entry.content_key)
        .bind(entry.mode)
        .bind(entry.size)
        .bind(entry.created)
        .bind(entry.modified)
        .execute(self.pool.as_ref())
        .await
        .map_err(|e| FsError::from_sqlx(e, &entry.describe()))?;
        Ok(())
    }

    async fn delete(&self, username: &str, filename: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM entries WHERE username = ? AND filename = ?")
            .bind(username)
            .bind(filename)
            .execute(self.pool.as_ref())
            .await?;
        Ok(result.rows_affected())
    }

    async fn stat(&self, username: &str, filename: &str) -> Result<DirEntry> {
        sqlx::query_as::<_, DirEntry>(
            "SELECT * FROM entries WHERE username = ? AND filename = ?",
        )
        .bind(username)
        .bind(filename)
        .fetch_optional(self.pool.as_ref())
        .await?
        .ok_or_else(|| FsError::NotFound(format!("username: {username}, filename: {filename}")))
    }

    async fn scan_children(
        &self,
        username: &str,
        parent: &str,
        pattern: Option<&str>,
    ) -> Result<Vec<DirEntry>> {
        let entries = match pattern {
            Some(pattern) => {
                sqlx::query_as::<_, DirEntry>(
                    "SELECT * FROM entries WHERE username = ? AND parent = ? AND filename LIKE ?",
                )
                .bind(username)
                .bind(parent)
                .bind(pattern)
                .fetch_all(self.pool.as_ref())
                .await?
            }
            None => {
                sqlx::query_as::<_, DirEntry>(
                    "SELECT * FROM entries WHERE username = ? AND parent = ?",
                )
                .bind(username)
                .bind(parent)
                .fetch_all(self.pool.as_ref())
                .await?
            }
        };
        Ok(entries)
    }

    async fn update(&self, entry: &DirEntry) -> Result<()> {
        let result = sqlx::query(
            "UPDATE entries SET mode = ?, size = ?, modified = ?, location = ?, content_key = ? \
             WHERE username = ? AND filename = ?",
        )
        .bind(entry.mode)
        .bind(entry.size)
        .bind(entry.modified)
        .bind(&entry.location)
        .bind(&entry.content_key)
        .bind(&entry.username)
        .bind(&entry.filename)
        .execute(self.pool.as_ref())
        .await?;

        match result.rows_affected() {
            0 => Err(FsError::NotFound(entry.describe())),
            _ => Ok(()),
        }
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }
}
