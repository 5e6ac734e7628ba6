//! Install, update and play state for a library of games whose installs are
//! carried out by an external backend process.
//!
//! [`Library`] wires the pieces together: the snapshot database, the
//! [`InstallOrchestrator`] state machine and, through it, the progress poller.

pub mod config;
pub mod db;
pub mod errors;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

use std::sync::Arc;

use crate::config::LibraryConfig;
use crate::db::Database;
use crate::errors::Result;
use crate::services::{Backend, InstallOrchestrator, StatusPersistence, StatusReader};
use crate::utils::paths::{resolve_cache_dir, resolve_log_dir};

pub use crate::errors::LauncherError;
pub use crate::models::{GameStatus, InstallProgress, InstallRequest, LibraryEvent, StatusKind};
pub use crate::services::{RejectReason, TransitionOutcome};

#[derive(Clone)]
pub struct Library {
    pub db: Database,
    pub persistence: StatusPersistence,
    pub orchestrator: InstallOrchestrator,
}

impl Library {
    /// Routes `tracing` output to the daily log file under the configured root.
    pub fn init_logging(config: &LibraryConfig) -> Result<()> {
        logging::init(&resolve_log_dir(config.root_dir.as_deref()))
    }

    /// Opens the snapshot database under the configured root and builds the services.
    pub fn open(config: &LibraryConfig, backend: Arc<dyn Backend>) -> Result<Self> {
        let cache_dir = resolve_cache_dir(config.root_dir.as_deref());
        let db = db::init(&cache_dir)?;
        tracing::info!("library database at {}", db.path().display());
        Ok(Self::with_database(config, backend, db))
    }

    pub fn with_database(config: &LibraryConfig, backend: Arc<dyn Backend>, db: Database) -> Self {
        let persistence = StatusPersistence::new(db.clone());
        let orchestrator = InstallOrchestrator::new(backend, persistence.clone(), config);
        Self {
            db,
            persistence,
            orchestrator,
        }
    }

    pub fn statuses(&self) -> StatusReader {
        self.orchestrator.statuses()
    }

    pub fn shutdown(&self) {
        self.orchestrator.shutdown();
    }
}
