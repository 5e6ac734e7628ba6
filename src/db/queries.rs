use rusqlite::{params, OptionalExtension};

use crate::db::Database;
use crate::errors::Result;

pub trait SnapshotQueries {
    fn put_snapshot(&self, app_name: &str, value: &str) -> Result<()>;
    fn get_snapshot(&self, app_name: &str) -> Result<Option<String>>;
    fn delete_snapshot(&self, app_name: &str) -> Result<()>;
    fn list_snapshot_keys(&self) -> Result<Vec<String>>;
}

impl SnapshotQueries for Database {
    fn put_snapshot(&self, app_name: &str, value: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT OR REPLACE INTO progress_snapshots (app_name, value, updated_at) VALUES (?1, ?2, ?3)",
            params![app_name, value, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }

    fn get_snapshot(&self, app_name: &str) -> Result<Option<String>> {
        let conn = self.connection()?;
        let value = conn
            .query_row(
                "SELECT value FROM progress_snapshots WHERE app_name = ?1",
                params![app_name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn delete_snapshot(&self, app_name: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "DELETE FROM progress_snapshots WHERE app_name = ?1",
            params![app_name],
        )?;
        Ok(())
    }

    fn list_snapshot_keys(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut stmt = conn.prepare("SELECT app_name FROM progress_snapshots ORDER BY app_name")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut keys = Vec::new();
        for item in rows {
            keys.push(item?);
        }
        Ok(keys)
    }
}
