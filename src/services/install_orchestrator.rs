use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::LibraryConfig;
use crate::errors::{LauncherError, Result};
use crate::models::{
    GameStatus, InstallPayload, InstallProgress, InstallRequest, LibraryEvent, StatusKind,
};
use crate::services::progress_merger::{is_resumable, normalize_install_path};
use crate::services::progress_poller::SampleSink;
use crate::services::status_store::{BeginGuard, RejectReason, StatusStore};
use crate::services::{Backend, ProgressPoller, StatusPersistence, StatusReader};

const DEFAULT_INSTALL_TARGET: &str = "default";
const IMPORT_TARGET: &str = "import";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition ran to the end and the game is idle again.
    Completed,
    /// The request was dropped; nothing changed.
    Rejected(RejectReason),
    /// The backend answered after the game had already been moved on
    /// (cancelled, stopped, failed); its answer was ignored.
    Interrupted,
}

/// Drives the per-game life cycle and owns the only writer of the status map.
///
/// Every action goes through idle: a game in any active state rejects a new
/// one. Entering `installing`/`updating` starts the progress poller; leaving
/// it stops the poller and persists the final snapshot.
#[derive(Clone)]
pub struct InstallOrchestrator {
    backend: Arc<dyn Backend>,
    store: Arc<StatusStore>,
    poller: ProgressPoller,
    persistence: StatusPersistence,
    latest: Arc<Mutex<HashMap<String, InstallProgress>>>,
    exclusive_transfers: bool,
}

impl InstallOrchestrator {
    pub fn new(
        backend: Arc<dyn Backend>,
        persistence: StatusPersistence,
        config: &LibraryConfig,
    ) -> Self {
        let store = Arc::new(StatusStore::new());
        let poller = ProgressPoller::new(
            backend.clone(),
            persistence.clone(),
            store.reader(),
            config,
        );
        Self {
            backend,
            store,
            poller,
            persistence,
            latest: Arc::new(Mutex::new(HashMap::new())),
            exclusive_transfers: config.exclusive_transfers,
        }
    }

    pub fn statuses(&self) -> StatusReader {
        self.store.reader()
    }

    pub fn poller(&self) -> &ProgressPoller {
        &self.poller
    }

    /// Last merged sample published during the current transfer.
    pub fn latest_progress(&self, app_name: &str) -> Option<InstallProgress> {
        self.lock_latest().get(app_name).cloned()
    }

    /// Marks a game as installed, e.g. when seeding from the backend library.
    pub fn register_installed(&self, app_name: &str, folder: Option<&str>) {
        let folder = folder
            .map(normalize_install_path)
            .filter(|folder| !folder.is_empty());
        self.store.amend(app_name, |status| {
            status.installed = true;
            if folder.is_some() {
                status.folder = folder;
            }
        });
    }

    /// Percentage already downloaded into `install_path` by an earlier run.
    pub fn total_downloaded(&self, app_name: &str, install_path: &str) -> Option<f64> {
        let snapshot = self.persistence.load(app_name);
        is_resumable(&snapshot, install_path).then(|| snapshot.percent_value())
    }

    /// `None` falls back to the sticky folder, then to `"default"`, which is
    /// resolved through the backend settings.
    pub async fn resolve_install_path(
        &self,
        app_name: &str,
        requested: Option<&str>,
    ) -> Result<String> {
        let requested = requested
            .map(normalize_install_path)
            .filter(|path| !path.is_empty());
        let chosen = match requested {
            Some(path) if path == IMPORT_TARGET => {
                return Err(LauncherError::Config(format!(
                    "{app_name}: existing installs are registered with import_game"
                )));
            }
            Some(path) => path,
            None => self
                .sticky_folder(app_name)
                .unwrap_or_else(|| DEFAULT_INSTALL_TARGET.to_string()),
        };
        if chosen != DEFAULT_INSTALL_TARGET {
            return Ok(chosen);
        }

        let settings = self.backend.request_settings(DEFAULT_INSTALL_TARGET).await?;
        let path = normalize_install_path(&settings.default_install_path);
        if path.is_empty() {
            return Err(LauncherError::Config(
                "backend reported no default install path".to_string(),
            ));
        }
        Ok(path)
    }

    pub async fn install(&self, request: InstallRequest) -> Result<TransitionOutcome> {
        let app_name = request.app_name.as_str();
        let guard = self.transfer_guard(Some(false));
        if let Some(reason) = self.store.check(app_name, StatusKind::Installing, guard) {
            return Ok(self.rejected(app_name, "install", reason));
        }

        let folder = self
            .resolve_install_path(app_name, request.install_path.as_deref())
            .await?;
        let generation =
            match self
                .store
                .begin(app_name, StatusKind::Installing, Some(folder.clone()), guard)
            {
                Ok(generation) => generation,
                Err(reason) => return Ok(self.rejected(app_name, "install", reason)),
            };
        tracing::info!("install started app={} folder={}", app_name, folder);
        self.enter_transfer(app_name, &folder);

        let payload = InstallPayload {
            app_name: app_name.to_string(),
            path: folder,
            sdl_list: request.sdl_list.clone(),
            install_dlcs: request.install_dlcs,
        };
        let result = self.backend.install(&payload).await;
        self.settle(
            app_name,
            generation,
            StatusKind::Installing,
            "install",
            result,
            |status| status.installed = true,
        )
    }

    pub async fn update(&self, app_name: &str) -> Result<TransitionOutcome> {
        let folder = self.sticky_folder(app_name);
        let generation = match self.store.begin(
            app_name,
            StatusKind::Updating,
            folder.clone(),
            self.transfer_guard(Some(true)),
        ) {
            Ok(generation) => generation,
            Err(reason) => return Ok(self.rejected(app_name, "update", reason)),
        };
        tracing::info!("update started app={}", app_name);
        self.enter_transfer(app_name, folder.as_deref().unwrap_or_default());

        let result = self.backend.update(app_name).await;
        self.settle(
            app_name,
            generation,
            StatusKind::Updating,
            "update",
            result,
            |_| {},
        )
    }

    /// Resolves when the game exits (or is stopped).
    pub async fn play(&self, app_name: &str) -> Result<TransitionOutcome> {
        let generation = match self
            .store
            .begin(app_name, StatusKind::Playing, None, installed_guard())
        {
            Ok(generation) => generation,
            Err(reason) => return Ok(self.rejected(app_name, "launch", reason)),
        };
        tracing::info!("launching app={}", app_name);

        let result = self.backend.launch(app_name).await;
        self.settle(
            app_name,
            generation,
            StatusKind::Playing,
            "launch",
            result,
            |_| {},
        )
    }

    pub async fn repair(&self, app_name: &str) -> Result<TransitionOutcome> {
        let generation = match self
            .store
            .begin(app_name, StatusKind::Repairing, None, installed_guard())
        {
            Ok(generation) => generation,
            Err(reason) => return Ok(self.rejected(app_name, "repair", reason)),
        };
        tracing::info!("repair started app={}", app_name);

        let result = self.backend.repair(app_name).await;
        self.settle(
            app_name,
            generation,
            StatusKind::Repairing,
            "repair",
            result,
            |_| {},
        )
    }

    pub async fn move_install(&self, app_name: &str, new_path: &str) -> Result<TransitionOutcome> {
        let target = normalize_install_path(new_path);
        if target.is_empty() {
            return Err(LauncherError::Config("move target is empty".to_string()));
        }
        let generation = match self
            .store
            .begin(app_name, StatusKind::Moving, None, installed_guard())
        {
            Ok(generation) => generation,
            Err(reason) => return Ok(self.rejected(app_name, "move", reason)),
        };
        tracing::info!("move started app={} target={}", app_name, target);

        let result = self.backend.move_install(app_name, &target).await;
        let new_folder = target.clone();
        let outcome = self.settle(
            app_name,
            generation,
            StatusKind::Moving,
            "move",
            result,
            move |status| status.folder = Some(new_folder),
        )?;
        if outcome == TransitionOutcome::Completed {
            self.retarget_snapshot(app_name, &target);
        }
        Ok(outcome)
    }

    /// Only an idle, installed game can be uninstalled. The game stays
    /// `uninstalling` until the backend answers; on success the snapshot is
    /// cleared.
    pub async fn uninstall(&self, app_name: &str) -> Result<TransitionOutcome> {
        let generation = match self.store.begin(
            app_name,
            StatusKind::Uninstalling,
            None,
            installed_guard(),
        ) {
            Ok(generation) => generation,
            Err(reason) => return Ok(self.rejected(app_name, "uninstall", reason)),
        };
        tracing::info!("uninstall started app={}", app_name);

        let result = self.backend.uninstall(app_name).await;
        let outcome = self.settle(
            app_name,
            generation,
            StatusKind::Uninstalling,
            "uninstall",
            result,
            |status| status.installed = false,
        )?;
        if outcome == TransitionOutcome::Completed {
            self.lock_latest().remove(app_name);
            if let Err(err) = self.persistence.clear(app_name) {
                tracing::warn!("progress snapshot clear failed app={} error={}", app_name, err);
            }
        }
        Ok(outcome)
    }

    /// Registers a copy already on disk at `path` as installed. Nothing is
    /// downloaded, so no poller runs and no snapshot is written.
    pub async fn import_game(&self, app_name: &str, path: &str) -> Result<TransitionOutcome> {
        let folder = normalize_install_path(path);
        if folder.is_empty() || folder == IMPORT_TARGET {
            return Err(LauncherError::Config(
                "import needs the folder of the existing install".to_string(),
            ));
        }
        let guard = BeginGuard {
            installed: Some(false),
            exclusive_transfer: false,
        };
        let generation = match self
            .store
            .begin(app_name, StatusKind::Importing, None, guard)
        {
            Ok(generation) => generation,
            Err(reason) => return Ok(self.rejected(app_name, "import", reason)),
        };
        tracing::info!("import started app={} folder={}", app_name, folder);

        let result = self.backend.import_game(app_name, &folder).await;
        self.settle(
            app_name,
            generation,
            StatusKind::Importing,
            "import",
            result,
            move |status| {
                status.installed = true;
                status.folder = Some(folder);
            },
        )
    }

    /// Aborts an install or update, keeping the progress made so far resumable.
    pub async fn cancel(&self, app_name: &str) -> Result<TransitionOutcome> {
        let Some(previous) = self.store.force_idle_if(app_name, StatusKind::is_transfer) else {
            return Ok(self.rejected(app_name, "cancel", RejectReason::NotActive));
        };
        self.leave_transfer(app_name, false);
        tracing::info!("{} cancelled app={}", previous.status, app_name);
        self.kill(app_name).await
    }

    /// Ends a running game, update or install and tells the backend to kill it.
    pub async fn stop(&self, app_name: &str) -> Result<TransitionOutcome> {
        let stoppable = |kind: StatusKind| {
            matches!(
                kind,
                StatusKind::Playing | StatusKind::Updating | StatusKind::Installing
            )
        };
        let Some(previous) = self.store.force_idle_if(app_name, stoppable) else {
            return Ok(self.rejected(app_name, "stop", RejectReason::NotActive));
        };
        if previous.status.is_transfer() {
            self.leave_transfer(app_name, false);
        }
        tracing::info!("stopped app={} was={}", app_name, previous.status);
        self.kill(app_name).await
    }

    /// Backend-reported fatal error for a running action: back to idle, no retry.
    pub fn fail(&self, app_name: &str, message: &str) -> bool {
        let Some(previous) = self.store.force_idle(app_name) else {
            return false;
        };
        if previous.status.is_transfer() {
            self.leave_transfer(app_name, false);
        }
        tracing::error!(
            "backend failure app={} during={} error={}",
            app_name,
            previous.status,
            message
        );
        self.store.emit(LibraryEvent::ActionFailed {
            app_name: app_name.to_string(),
            action: previous.status.to_string(),
            message: message.to_string(),
        });
        true
    }

    /// Stops all pollers and persists the last sample of every running
    /// transfer. Statuses are left as they are.
    pub fn shutdown(&self) {
        self.poller.shutdown();
        let reader = self.store.reader();
        let latest: Vec<(String, InstallProgress)> = self
            .lock_latest()
            .iter()
            .map(|(app_name, progress)| (app_name.clone(), progress.clone()))
            .collect();
        for (app_name, progress) in latest {
            if !reader.is_transferring(&app_name) {
                continue;
            }
            if let Err(err) = self.persistence.save(&app_name, &progress) {
                tracing::warn!("progress snapshot write failed app={} error={}", app_name, err);
            }
        }
    }

    fn transfer_guard(&self, installed: Option<bool>) -> BeginGuard {
        BeginGuard {
            installed,
            exclusive_transfer: self.exclusive_transfers,
        }
    }

    fn sticky_folder(&self, app_name: &str) -> Option<String> {
        self.store
            .reader()
            .get(app_name)
            .and_then(|status| status.folder)
            .filter(|folder| !folder.is_empty())
            .or_else(|| {
                let folder = normalize_install_path(&self.persistence.load(app_name).folder);
                (!folder.is_empty()).then_some(folder)
            })
    }

    fn enter_transfer(&self, app_name: &str, folder: &str) {
        self.lock_latest().remove(app_name);

        let store = self.store.clone();
        let latest = self.latest.clone();
        let sink: SampleSink = Arc::new(move |app: &str, progress: &InstallProgress| {
            lock(&latest).insert(app.to_string(), progress.clone());
            store.emit(LibraryEvent::Progress {
                app_name: app.to_string(),
                progress: progress.clone(),
            });
        });

        if !self.poller.start(app_name, folder, sink) {
            tracing::warn!("progress poller not started app={}", app_name);
        }
    }

    /// A completed transfer leaves an empty snapshot bound to the folder; an
    /// interrupted one keeps its last merged sample for the next resume.
    fn leave_transfer(&self, app_name: &str, completed: bool) {
        self.poller.stop(app_name);
        let last = self.lock_latest().remove(app_name);

        let snapshot = if completed {
            let folder = self
                .store
                .reader()
                .get(app_name)
                .and_then(|status| status.folder)
                .unwrap_or_default();
            Some(InstallProgress {
                path: folder.clone(),
                folder,
                ..InstallProgress::default()
            })
        } else {
            last
        };

        if let Some(snapshot) = snapshot {
            if let Err(err) = self.persistence.save(app_name, &snapshot) {
                tracing::warn!("progress snapshot write failed app={} error={}", app_name, err);
            }
        }
    }

    fn settle(
        &self,
        app_name: &str,
        generation: u64,
        kind: StatusKind,
        action: &str,
        result: Result<()>,
        on_success: impl FnOnce(&mut GameStatus),
    ) -> Result<TransitionOutcome> {
        match result {
            Ok(()) => {
                if !self.store.finish(app_name, generation, on_success) {
                    tracing::info!("{} returned after interruption app={}", action, app_name);
                    return Ok(TransitionOutcome::Interrupted);
                }
                if kind.is_transfer() {
                    self.leave_transfer(app_name, true);
                }
                tracing::info!("{} completed app={}", action, app_name);
                Ok(TransitionOutcome::Completed)
            }
            Err(err) => {
                if !self.store.finish(app_name, generation, |_| {}) {
                    tracing::info!(
                        "{} ended after interruption app={} error={}",
                        action,
                        app_name,
                        err
                    );
                    return Ok(TransitionOutcome::Interrupted);
                }
                if kind.is_transfer() {
                    self.leave_transfer(app_name, false);
                }
                Err(self.report_failure(app_name, action, err))
            }
        }
    }

    async fn kill(&self, app_name: &str) -> Result<TransitionOutcome> {
        match self.backend.kill(app_name).await {
            Ok(()) => Ok(TransitionOutcome::Completed),
            Err(err) => Err(self.report_failure(app_name, "kill", err)),
        }
    }

    fn report_failure(&self, app_name: &str, action: &str, err: LauncherError) -> LauncherError {
        tracing::error!("{} failed app={} error={}", action, app_name, err);
        self.store.emit(LibraryEvent::ActionFailed {
            app_name: app_name.to_string(),
            action: action.to_string(),
            message: err.to_string(),
        });
        err
    }

    fn rejected(&self, app_name: &str, action: &str, reason: RejectReason) -> TransitionOutcome {
        tracing::info!("{} rejected app={} reason={:?}", action, app_name, reason);
        TransitionOutcome::Rejected(reason)
    }

    fn retarget_snapshot(&self, app_name: &str, folder: &str) {
        let mut snapshot = self.persistence.load(app_name);
        if snapshot.folder.is_empty() {
            return;
        }
        snapshot.folder = folder.to_string();
        snapshot.path = folder.to_string();
        if let Err(err) = self.persistence.save(app_name, &snapshot) {
            tracing::warn!("progress snapshot write failed app={} error={}", app_name, err);
        }
    }

    fn lock_latest(&self) -> MutexGuard<'_, HashMap<String, InstallProgress>> {
        lock(&self.latest)
    }
}

fn installed_guard() -> BeginGuard {
    BeginGuard {
        installed: Some(true),
        exclusive_transfer: false,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
