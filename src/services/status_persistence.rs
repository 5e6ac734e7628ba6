use crate::db::queries::SnapshotQueries;
use crate::db::Database;
use crate::errors::Result;
use crate::models::InstallProgress;

/// Last known install progress per game, keyed by app name.
#[derive(Clone)]
pub struct StatusPersistence {
    db: Database,
}

impl StatusPersistence {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Never fails: a missing, unreadable or malformed snapshot is the empty default.
    pub fn load(&self, app_name: &str) -> InstallProgress {
        let raw = match self.db.get_snapshot(app_name) {
            Ok(Some(raw)) => raw,
            Ok(None) => return InstallProgress::default(),
            Err(err) => {
                tracing::warn!("progress snapshot read failed app={} error={}", app_name, err);
                return InstallProgress::default();
            }
        };

        match serde_json::from_str::<InstallProgress>(&raw) {
            Ok(progress) => progress,
            Err(err) => {
                tracing::warn!(
                    "discarding malformed progress snapshot app={} error={}",
                    app_name,
                    err
                );
                InstallProgress::default()
            }
        }
    }

    pub fn save(&self, app_name: &str, progress: &InstallProgress) -> Result<()> {
        let value = serde_json::to_string(progress)?;
        self.db.put_snapshot(app_name, &value)
    }

    pub fn clear(&self, app_name: &str) -> Result<()> {
        self.db.delete_snapshot(app_name)
    }

    pub fn saved_apps(&self) -> Result<Vec<String>> {
        self.db.list_snapshot_keys()
    }
}
