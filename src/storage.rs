//! Durable key-value storage and the background writer that feeds it.

use std::{
    path::Path,
    sync::{mpsc, Arc, Mutex},
    thread,
};

use log::{debug, error, warn};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StorageError;

/// String key-value store used for playlist persistence.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}

pub struct SqliteKeyValueStore {
    conn: Mutex<Connection>,
}

impl SqliteKeyValueStore {
    pub fn open(db_path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        Self::with_connection(conn)
    }

    /// Opens `mediadeck/state.db` under the platform data directory.
    pub fn open_default() -> Result<Self, StorageError> {
        let data_dir = dirs::data_dir()
            .ok_or(StorageError::NoDataDirectory)?
            .join("mediadeck");
        Self::open(&data_dir.join("state.db"))
    }

    pub fn new_in_memory() -> Result<Self, StorageError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Storage connection lock was poisoned, continuing");
                poisoned.into_inner()
            }
        }
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.lock();
        let value = conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

enum WriteJob {
    Write { key: String, value: String },
    Flush(mpsc::Sender<()>),
}

/// Serializes best-effort writes onto a dedicated thread, in submission order.
#[derive(Clone)]
pub struct PersistenceWriter {
    jobs: mpsc::Sender<WriteJob>,
}

impl PersistenceWriter {
    pub fn spawn(store: Arc<dyn KeyValueStore>) -> Self {
        let (jobs, job_receiver) = mpsc::channel::<WriteJob>();
        let spawn_result = thread::Builder::new()
            .name("persistence-writer".to_string())
            .spawn(move || {
                while let Ok(job) = job_receiver.recv() {
                    match job {
                        WriteJob::Write { key, value } => {
                            if let Err(err) = store.set(&key, &value) {
                                error!("Failed to persist key={}: {}", key, err);
                            } else {
                                debug!("Persisted key={} bytes={}", key, value.len());
                            }
                        }
                        WriteJob::Flush(ack) => {
                            let _ = ack.send(());
                        }
                    }
                }
                debug!("Persistence writer stopped");
            });
        if let Err(err) = spawn_result {
            error!("Failed to spawn persistence writer thread: {}", err);
        }
        Self { jobs }
    }

    /// Queues a write. Failures are logged, never returned.
    pub fn schedule(&self, key: impl Into<String>, value: impl Into<String>) {
        let job = WriteJob::Write {
            key: key.into(),
            value: value.into(),
        };
        if self.jobs.send(job).is_err() {
            warn!("Persistence writer is gone, dropping write");
        }
    }

    /// Blocks until every write queued before this call has been applied.
    pub fn flush(&self) {
        let (ack, done) = mpsc::channel();
        if self.jobs.send(WriteJob::Flush(ack)).is_ok() {
            let _ = done.recv();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_store_round_trips_and_overwrites_values() {
        let store = SqliteKeyValueStore::new_in_memory().expect("in-memory store");
        assert_eq!(store.get("playlists").expect("get"), None);

        store.set("playlists", "{}").expect("set");
        store.set("playlists", "{\"Rock\":[]}").expect("overwrite");
        assert_eq!(
            store.get("playlists").expect("get"),
            Some("{\"Rock\":[]}".to_string())
        );
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let db_path = std::env::temp_dir()
            .join(format!("mediadeck-kv-{}", uuid::Uuid::new_v4()))
            .join("state.db");
        {
            let store = SqliteKeyValueStore::open(&db_path).expect("open");
            store.set("video_playlists", "[]").expect("set");
        }
        let reopened = SqliteKeyValueStore::open(&db_path).expect("reopen");
        assert_eq!(
            reopened.get("video_playlists").expect("get"),
            Some("[]".to_string())
        );
        if let Some(parent) = db_path.parent() {
            let _ = std::fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn test_persistence_writer_applies_writes_in_order_before_flush_returns() {
        let store = Arc::new(SqliteKeyValueStore::new_in_memory().expect("in-memory store"));
        let writer = PersistenceWriter::spawn(store.clone());

        writer.schedule("playlists", "first");
        writer.schedule("playlists", "second");
        writer.schedule("video_playlists", "other");
        writer.flush();

        assert_eq!(store.get("playlists").expect("get"), Some("second".to_string()));
        assert_eq!(
            store.get("video_playlists").expect("get"),
            Some("other".to_string())
        );
    }
}
