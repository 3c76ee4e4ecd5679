//! Durable storage for the pending queue.
//!
//! The queue is an ordered list of [`FeedbackRecord`]s that have not reached
//! the remote store yet. [`PendingQueueStore`] is the seam the reconciler
//! depends on; [`SqliteQueueStore`] is the implementation used by the binary.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::feedback::{rfc3339, FeedbackRecord};

/// Default namespace key for the pending queue.
pub const DEFAULT_QUEUE_KEY: &str = "pending-feedback";

/// Durable local storage for the pending queue.
///
/// Both operations are synchronous and scoped to a single namespace key.
/// `write_queue` replaces the whole queue atomically.
pub trait PendingQueueStore: Send + Sync + std::fmt::Debug {
    /// The namespace key this store reads and writes.
    fn key(&self) -> &str;

    /// Read the queue in submission order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the queue cannot be read.
    fn read_queue(&self) -> Result<Vec<FeedbackRecord>>;

    /// Replace the queue with `records`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the queue cannot be written. The previous
    /// contents are left intact in that case.
    fn write_queue(&self, records: &[FeedbackRecord]) -> Result<()>;
}

/// `SQLite`-backed pending queue.
#[derive(Debug)]
pub struct SqliteQueueStore {
    /// Path to the database file.
    path: PathBuf,
    /// Namespace key for this queue.
    key: String,
    /// Database connection.
    conn: Mutex<Connection>,
}

impl SqliteQueueStore {
    /// Open or create a queue database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>, key: impl Into<String>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening queue database at {}", path.display());
        let mut conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=FULL;")?;
        migrations::initialize_schema(&mut conn)?;

        info!("Queue database opened at {}", path.display());
        Ok(Self {
            path,
            key: key.into(),
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory queue, mainly for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory(key: impl Into<String>) -> Result<Self> {
        let mut conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&mut conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            key: key.into(),
            conn: Mutex::new(conn),
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Summarize the queue for status reporting.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue cannot be read.
    pub fn stats(&self) -> Result<QueueStats> {
        let records = self.read_queue()?;
        let oldest = records.iter().map(|r| r.created_at).min();
        let newest = records.iter().map(|r| r.created_at).max();

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(QueueStats {
            pending: records.len(),
            oldest_pending: oldest,
            newest_pending: newest,
            db_size_bytes,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::storage("queue database lock poisoned"))
    }

    fn select_rows(conn: &Connection, key: &str) -> rusqlite::Result<Vec<StoredRow>> {
        let mut stmt = conn.prepare(
            r"
            SELECT id, name, email, message, created_at
            FROM pending_feedback WHERE queue_key = ?1
            ORDER BY position ASC
            ",
        )?;
        let rows = stmt
            .query_map([key], |row| {
                Ok(StoredRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    message: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn replace_rows(
        conn: &mut Connection,
        key: &str,
        records: &[FeedbackRecord],
    ) -> rusqlite::Result<()> {
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM pending_feedback WHERE queue_key = ?1", [key])?;
        {
            let mut insert = tx.prepare(
                r"
                INSERT INTO pending_feedback (queue_key, position, id, name, email, message, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )?;
            for (position, record) in (0_i64..).zip(records) {
                insert.execute(params![
                    key,
                    position,
                    record.id,
                    record.name,
                    record.email,
                    record.message,
                    record.created_at.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                ])?;
            }
        }
        tx.commit()
    }
}

#[cfg(test)]
impl SqliteQueueStore {
    /// Insert a row without going through timestamp formatting.
    pub(crate) fn insert_raw_row(&self, id: &str, created_at: &str) {
        let conn = self.lock().unwrap();
        conn.execute(
            "INSERT INTO pending_feedback VALUES (?1, 99, ?2, 'B', 'b@x.com', 'raw message', ?3)",
            params![self.key, id, created_at],
        )
        .unwrap();
    }

    /// Number of rows under this key, parseable or not.
    pub(crate) fn raw_row_count(&self) -> usize {
        let conn = self.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM pending_feedback WHERE queue_key = ?1",
            [&self.key],
            |row| row.get(0),
        )
        .unwrap()
    }
}

impl PendingQueueStore for SqliteQueueStore {
    fn key(&self) -> &str {
        &self.key
    }

    fn read_queue(&self) -> Result<Vec<FeedbackRecord>> {
        let conn = self.lock()?;
        let rows = Self::select_rows(&conn, &self.key).map_err(|e| {
            Error::storage(format!("failed to read queue '{}': {e}", self.key))
        })?;
        rows.into_iter()
            .map(|row| row.into_record(&self.key))
            .collect()
    }

    fn write_queue(&self, records: &[FeedbackRecord]) -> Result<()> {
        let mut conn = self.lock()?;
        Self::replace_rows(&mut conn, &self.key, records).map_err(|e| {
            Error::storage(format!("failed to write queue '{}': {e}", self.key))
        })?;
        debug!(key = %self.key, len = records.len(), "Pending queue written");
        Ok(())
    }
}

/// A raw queue row before timestamp parsing.
struct StoredRow {
    id: String,
    name: String,
    email: String,
    message: String,
    created_at: String,
}

impl StoredRow {
    /// Fails on an unreadable timestamp so a later rewrite cannot drop the row.
    fn into_record(self, key: &str) -> Result<FeedbackRecord> {
        let created_at = rfc3339::parse(&self.created_at).map_err(|e| {
            warn!(id = %self.id, error = %e, "Queued record has an unreadable timestamp");
            Error::storage(format!(
                "queue '{key}' holds record {} with unreadable timestamp '{}': {e}",
                self.id, self.created_at
            ))
        })?;
        Ok(FeedbackRecord {
            id: self.id,
            name: self.name,
            email: self.email,
            message: self.message,
            created_at,
        })
    }
}

/// Statistics about the pending queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    /// Number of records waiting to be flushed.
    pub pending: usize,
    /// Creation time of the oldest pending record.
    pub oldest_pending: Option<DateTime<Utc>>,
    /// Creation time of the newest pending record.
    pub newest_pending: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
