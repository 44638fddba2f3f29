use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::backend::{KeyValueStore, KvWrite, StorageKey};
use crate::error::{GateError, Result};

/// SQLite-backed key-value store.
///
/// Uses a single `Connection` behind `Arc<Mutex<>>` so it can be shared
/// across async tasks. All blocking SQLite calls go through
/// [`with_conn`](Self::with_conn) which runs them on the Tokio blocking
/// thread-pool.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStore {
    /// Open (or create) a file-backed SQLite database at `path`, creating the
    /// parent directory when needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    GateError::Storage(format!("failed to create {}: {e}", parent.display()))
                })?;
            }
        }
        let conn = Connection::open(&path)
            .map_err(|e| GateError::Storage(format!("failed to open SQLite database: {e}")))?;

        Self::configure_and_init(conn, path)
    }

    /// Open an in-memory SQLite database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            GateError::Storage(format!("failed to open in-memory SQLite database: {e}"))
        })?;

        Self::configure_and_init(conn, PathBuf::from(":memory:"))
    }

    /// Return the path this database was opened with (`:memory:` for in-memory).
    pub fn path(&self) -> &Path {
        &self.path
    }

    // ── helpers ────────────────────────────────────────────────────────

    fn configure_and_init(conn: Connection, path: PathBuf) -> Result<Self> {
        conn.execute_batch("PRAGMA journal_mode = WAL;")
            .map_err(|e| GateError::Storage(format!("failed to set WAL mode: {e}")))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        };

        store.create_tables()?;
        Ok(store)
    }

    /// Create the kv table (idempotent).
    fn create_tables(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| GateError::Storage(format!("failed to acquire database lock: {e}")))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at TEXT NOT NULL
            );
            ",
        )
        .map_err(|e| GateError::Storage(format!("failed to create tables: {e}")))?;

        Ok(())
    }

    /// Run a blocking closure against the SQLite connection on the Tokio
    /// blocking thread-pool.
    pub(crate) async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| GateError::Storage(format!("failed to acquire database lock: {e}")))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| GateError::Storage(format!("task join error: {e}")))?
    }
}

fn upsert(conn: &Connection, key: StorageKey, value: &[u8]) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![key.as_str(), value, Utc::now().to_rfc3339()],
    )
}

fn delete(conn: &Connection, key: StorageKey) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM kv WHERE key = ?1", params![key.as_str()])
}

impl KeyValueStore for SqliteStore {
    async fn get(&self, key: StorageKey) -> Result<Option<Vec<u8>>> {
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT value FROM kv WHERE key = ?1",
                params![key.as_str()],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
            .map_err(|e| GateError::Storage(format!("failed to read '{key}': {e}")))
        })
        .await
    }

    async fn set(&self, key: StorageKey, value: Vec<u8>) -> Result<()> {
        self.with_conn(move |conn| {
            upsert(conn, key, &value)
                .map_err(|e| GateError::Storage(format!("failed to write '{key}': {e}")))?;
            Ok(())
        })
        .await
    }

    async fn clear(&self, key: StorageKey) -> Result<()> {
        self.with_conn(move |conn| {
            delete(conn, key)
                .map_err(|e| GateError::Storage(format!("failed to clear '{key}': {e}")))?;
            Ok(())
        })
        .await
    }

    async fn write_batch(&self, writes: Vec<KvWrite>) -> Result<()> {
        self.with_conn(move |conn| {
            let tx = conn
                .transaction()
                .map_err(|e| GateError::Storage(format!("failed to begin transaction: {e}")))?;
            for write in &writes {
                let outcome = match write {
                    KvWrite::Set(key, value) => upsert(&tx, *key, value),
                    KvWrite::Clear(key) => delete(&tx, *key),
                };
                outcome.map_err(|e| GateError::Storage(format!("batch write failed: {e}")))?;
            }
            tx.commit()
                .map_err(|e| GateError::Storage(format!("failed to commit transaction: {e}")))
        })
        .await
    }
}
