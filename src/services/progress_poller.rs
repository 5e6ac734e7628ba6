use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::config::LibraryConfig;
use crate::errors::{LauncherError, Result};
use crate::models::InstallProgress;
use crate::services::progress_merger::{merge_sample, normalize_install_path, resume_baseline};
use crate::services::{Backend, StatusPersistence, StatusReader};

/// Receives every accepted, merged sample. Called while the poller registry is
/// locked, so it must not call back into the poller.
pub type SampleSink = Arc<dyn Fn(&str, &InstallProgress) + Send + Sync>;

struct PollHandle {
    id: u64,
    task: JoinHandle<()>,
}

/// Marks a game's progress request as outstanding until dropped. Dropping
/// happens on completion and when the owning task is aborted.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    app_name: String,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<String>>>, app_name: &str) -> Option<Self> {
        let mut guard = lock(set);
        if !guard.insert(app_name.to_string()) {
            return None;
        }
        Some(Self {
            set: set.clone(),
            app_name: app_name.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.app_name);
    }
}

#[derive(Clone)]
pub struct ProgressPoller {
    backend: Arc<dyn Backend>,
    persistence: StatusPersistence,
    statuses: StatusReader,
    interval: Duration,
    request_timeout: Duration,
    registry: Arc<Mutex<HashMap<String, PollHandle>>>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    next_id: Arc<AtomicU64>,
}

impl ProgressPoller {
    pub fn new(
        backend: Arc<dyn Backend>,
        persistence: StatusPersistence,
        statuses: StatusReader,
        config: &LibraryConfig,
    ) -> Self {
        Self {
            backend,
            persistence,
            statuses,
            interval: config.poll_interval,
            request_timeout: config.progress_timeout,
            registry: Arc::new(Mutex::new(HashMap::new())),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Starts sampling `app_name` every interval. The persisted snapshot is
    /// read once here and used as the merge baseline if it belongs to
    /// `install_folder`. Returns `false` when the game is not transferring or
    /// is already being polled. Must be called from within a Tokio runtime.
    pub fn start(&self, app_name: &str, install_folder: &str, on_sample: SampleSink) -> bool {
        if !self.statuses.is_transferring(app_name) {
            tracing::debug!("progress poller not started app={} reason=not transferring", app_name);
            return false;
        }

        let mut registry = lock(&self.registry);
        if registry.contains_key(app_name) {
            return false;
        }

        let folder = normalize_install_path(install_folder);
        let baseline = resume_baseline(self.persistence.load(app_name), &folder);
        if let Some(snapshot) = baseline.as_ref() {
            tracing::info!(
                "resuming progress app={} from={} folder={}",
                app_name,
                snapshot.percent,
                folder
            );
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let poller = self.clone();
        let app = app_name.to_string();
        let task = tokio::spawn(async move {
            poller.run(&app, id, folder, baseline, on_sample).await;
            poller.release(&app, id);
        });
        registry.insert(app_name.to_string(), PollHandle { id, task });
        true
    }

    /// Cancels sampling. No sample is published after this returns. Stopping a
    /// game that is not polled is a no-op returning `false`.
    pub fn stop(&self, app_name: &str) -> bool {
        let handle = lock(&self.registry).remove(app_name);
        match handle {
            Some(handle) => {
                handle.task.abort();
                tracing::debug!("progress poller stopped app={}", app_name);
                true
            }
            None => false,
        }
    }

    pub fn is_polling(&self, app_name: &str) -> bool {
        lock(&self.registry).contains_key(app_name)
    }

    /// Stops every poller, e.g. when the observing view goes away.
    pub fn shutdown(&self) {
        let handles: Vec<(String, PollHandle)> = lock(&self.registry).drain().collect();
        for (app_name, handle) in handles {
            handle.task.abort();
            tracing::debug!("progress poller stopped app={} reason=shutdown", app_name);
        }
    }

    async fn run(
        &self,
        app_name: &str,
        id: u64,
        folder: String,
        baseline: Option<InstallProgress>,
        on_sample: SampleSink,
    ) {
        let period = self.interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if !self.statuses.is_transferring(app_name) {
                tracing::debug!("progress poller finished app={} reason=left transfer state", app_name);
                return;
            }

            let Some(_in_flight) = InFlightGuard::acquire(&self.in_flight, app_name) else {
                tracing::debug!("progress tick skipped app={} reason=request in flight", app_name);
                continue;
            };

            let Some(sample) = self.poll_once(app_name).await else {
                continue;
            };

            let mut merged = merge_sample(baseline.as_ref(), sample);
            merged.folder = folder.clone();
            if merged.path.is_empty() {
                merged.path = folder.clone();
            }

            if !self.publish(app_name, id, &merged, &on_sample) {
                return;
            }
        }
    }

    /// One progress request, bounded by the configured timeout.
    async fn request_sample(&self, app_name: &str) -> Result<Option<InstallProgress>> {
        let request = self.backend.request_progress(app_name);
        tokio::time::timeout(self.request_timeout, request)
            .await
            .map_err(|_| {
                LauncherError::Timeout(format!(
                    "{} progress after {:?}",
                    app_name, self.request_timeout
                ))
            })?
    }

    /// Errors and timeouts count as "no data".
    async fn poll_once(&self, app_name: &str) -> Option<InstallProgress> {
        match self.request_sample(app_name).await {
            Ok(Some(sample)) => Some(sample),
            Ok(None) => {
                tracing::debug!("no progress reported app={}", app_name);
                None
            }
            Err(err @ LauncherError::Timeout(_)) => {
                tracing::warn!("progress request dropped app={} error={}", app_name, err);
                None
            }
            Err(err) => {
                tracing::debug!("progress request failed app={} error={}", app_name, err);
                None
            }
        }
    }

    fn publish(
        &self,
        app_name: &str,
        id: u64,
        progress: &InstallProgress,
        on_sample: &SampleSink,
    ) -> bool {
        let registry = lock(&self.registry);
        if registry.get(app_name).map(|handle| handle.id) != Some(id) {
            return false;
        }

        on_sample(app_name, progress);
        if let Err(err) = self.persistence.save(app_name, progress) {
            tracing::warn!("progress snapshot write failed app={} error={}", app_name, err);
        }
        true
    }

    fn release(&self, app_name: &str, id: u64) {
        let mut registry = lock(&self.registry);
        if registry.get(app_name).map(|handle| handle.id) == Some(id) {
            registry.remove(app_name);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
