//! Read-only access to the monitored application's clipboard history.
//!
//! The connection is owned by a `RecordStore`, opened on first use and closed
//! when the store is dropped or a read fails, so every monitoring run holds
//! its own short-lived handle.

mod helpers;
mod history;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rusqlite::{Connection, OpenFlags};

use crate::snapshot::{RecordCounter, RecordReading};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

/// How long a read waits for the application's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

pub struct RecordStore {
    db_path: PathBuf,
    images_dir: Option<PathBuf>,
    window: usize,
    preview_chars: usize,
    conn: Option<Connection>,
}

impl RecordStore {
    pub fn new(db_path: PathBuf, window: usize, preview_chars: usize) -> Self {
        Self {
            db_path,
            images_dir: None,
            window,
            preview_chars,
            conn: None,
        }
    }

    /// Directory used to resolve image records stored with relative paths.
    pub fn with_images_dir(mut self, images_dir: PathBuf) -> Self {
        self.images_dir = Some(images_dir);
        self
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Drops the connection; the next read reopens it.
    pub fn close(&mut self) {
        if self.conn.take().is_some() {
            log_debug!("closed record store {}", self.db_path.display());
        }
    }

    fn connection(&mut self) -> Result<&mut Connection> {
        if self.conn.is_none() {
            if !self.db_path.exists() {
                bail!("database {} does not exist", self.db_path.display());
            }

            let conn = Connection::open_with_flags(
                &self.db_path,
                OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )
            .with_context(|| format!("failed to open {}", self.db_path.display()))?;
            conn.busy_timeout(BUSY_TIMEOUT)
                .context("failed to set busy timeout")?;

            log_debug!("opened record store {}", self.db_path.display());
            self.conn = Some(conn);
        }

        self.conn
            .as_mut()
            .context("record store connection unavailable")
    }
}

impl RecordCounter for RecordStore {
    fn read(&mut self) -> Result<RecordReading> {
        let window = self.window;
        let preview_chars = self.preview_chars;
        let images_dir = self.images_dir.clone();

        let result = self.connection().and_then(|conn| {
            history::read_history(conn, window, preview_chars, images_dir.as_deref())
        });

        if let Err(err) = &result {
            log_warn!("dropping record store connection after failed read: {err:#}");
            self.close();
        }
        result
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{create_history, insert};
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_database_is_a_read_failure() {
        let dir = tempdir().unwrap();
        let mut store = RecordStore::new(dir.path().join("absent.db"), 5, 50);
        assert!(store.read().is_err());
        assert!(!store.is_open());
        // read-only open must not create the file
        assert!(!dir.path().join("absent.db").exists());
    }

    #[test]
    fn missing_table_drops_connection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.db");
        Connection::open(&path)
            .unwrap()
            .execute_batch("CREATE TABLE settings (key TEXT, value TEXT)")
            .unwrap();

        let mut store = RecordStore::new(path, 5, 50);
        assert!(store.read().is_err());
        assert!(!store.is_open());
    }

    #[test]
    fn reopens_after_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.db");
        let mut store = RecordStore::new(path.clone(), 5, 50);
        assert!(store.read().is_err());

        let conn = create_history(&path);
        insert(&conn, "a", "text", "hello", None, "2024-05-01 10:00:00");

        let reading = store.read().unwrap();
        assert_eq!(reading.counts.total, 1);
        assert!(store.is_open());

        store.close();
        assert!(!store.is_open());
    }
}
