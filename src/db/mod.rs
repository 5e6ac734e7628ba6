use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;

use crate::errors::{LauncherError, Result};

pub mod queries;

const DB_FILE: &str = "library.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl Database {
    /// Opens the snapshot database at `path` in WAL mode.
    pub fn new(path: PathBuf) -> Result<Self> {
        let conn = Connection::open(&path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let _mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(Self::wrap(conn, path))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self::wrap(conn, PathBuf::from(":memory:")))
    }

    fn wrap(conn: Connection, path: PathBuf) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        }
    }

    pub fn run_migrations(&self) -> Result<()> {
        self.connection()?
            .execute_batch(include_str!("../../migrations/001_progress.sql"))?;
        Ok(())
    }

    /// Exclusive access to the connection; a poisoned lock is reported as `Config`.
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| {
            LauncherError::Config(format!("snapshot database {} is poisoned", self.path.display()))
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Opens (creating if needed) the library database inside `cache_dir` and migrates it.
pub fn init(cache_dir: &Path) -> Result<Database> {
    std::fs::create_dir_all(cache_dir)?;
    let db = Database::new(cache_dir.join(DB_FILE))?;
    db.run_migrations()?;
    Ok(db)
}
