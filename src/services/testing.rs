use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::Notify;

use crate::errors::{LauncherError, Result};
use crate::models::{AppSettings, InstallPayload, InstallProgress};
use crate::services::Backend;

/// Scripted backend: progress answers are queued, actions can be held until
/// `release` or made to fail, and `kill` ends a held action with an error.
#[derive(Default)]
pub(crate) struct FakeBackend {
    samples: Mutex<VecDeque<Option<InstallProgress>>>,
    progress_delay: Mutex<Duration>,
    progress_calls: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    settings: Mutex<AppSettings>,
    gated: Mutex<HashSet<&'static str>>,
    failing: Mutex<HashSet<&'static str>>,
    gate: Notify,
    killed: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

struct InFlightCount(Arc<AtomicUsize>);

impl Drop for InFlightCount {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_sample(&self, percent: Option<&str>) {
        let sample = percent.map(|percent| InstallProgress {
            percent: percent.to_string(),
            bytes: "1.00GiB".to_string(),
            eta: "00:10:00".to_string(),
            ..InstallProgress::default()
        });
        self.samples.lock().unwrap().push_back(sample);
    }

    pub fn set_progress_delay(&self, delay: Duration) {
        *self.progress_delay.lock().unwrap() = delay;
    }

    pub fn set_default_install_path(&self, path: &str) {
        self.settings.lock().unwrap().default_install_path = path.to_string();
    }

    pub fn hold(&self, action: &'static str) {
        self.gated.lock().unwrap().insert(action);
    }

    pub fn fail(&self, action: &'static str) {
        self.failing.lock().unwrap().insert(action);
    }

    pub fn release(&self) {
        self.gate.notify_one();
    }

    pub fn progress_calls(&self) -> usize {
        self.progress_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    async fn action(&self, name: &'static str, app_name: &str, detail: &str) -> Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{name}:{app_name}{detail}"));
        if self.failing.lock().unwrap().contains(name) {
            return Err(LauncherError::Backend(format!("{name} failed")));
        }
        let held = self.gated.lock().unwrap().contains(name);
        if held {
            self.gate.notified().await;
        }
        if self.killed.lock().unwrap().remove(app_name) {
            return Err(LauncherError::Backend(format!("{name} killed")));
        }
        Ok(())
    }
}

impl Backend for FakeBackend {
    fn request_progress<'a>(
        &'a self,
        _app_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<InstallProgress>>> {
        async move {
            self.progress_calls.fetch_add(1, Ordering::SeqCst);
            let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            let _count = InFlightCount(self.in_flight.clone());
            self.max_in_flight.fetch_max(current, Ordering::SeqCst);

            let delay = *self.progress_delay.lock().unwrap();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let sample = self.samples.lock().unwrap().pop_front().flatten();
            Ok(sample)
        }
        .boxed()
    }

    fn request_settings<'a>(&'a self, _target: &'a str) -> BoxFuture<'a, Result<AppSettings>> {
        async move { Ok(self.settings.lock().unwrap().clone()) }.boxed()
    }

    fn install<'a>(&'a self, payload: &'a InstallPayload) -> BoxFuture<'a, Result<()>> {
        async move {
            let detail = format!(":{}", payload.path);
            self.action("install", &payload.app_name, &detail).await
        }
        .boxed()
    }

    fn update<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>> {
        self.action("update", app_name, "").boxed()
    }

    fn uninstall<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>> {
        self.action("uninstall", app_name, "").boxed()
    }

    fn launch<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>> {
        self.action("launch", app_name, "").boxed()
    }

    fn kill<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            self.calls.lock().unwrap().push(format!("kill:{app_name}"));
            if self.failing.lock().unwrap().contains("kill") {
                return Err(LauncherError::Backend("kill failed".to_string()));
            }
            self.killed.lock().unwrap().insert(app_name.to_string());
            self.gate.notify_one();
            Ok(())
        }
        .boxed()
    }

    fn repair<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>> {
        self.action("repair", app_name, "").boxed()
    }

    fn move_install<'a>(&'a self, app_name: &'a str, path: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            let detail = format!(":{path}");
            self.action("move", app_name, &detail).await
        }
        .boxed()
    }

    fn import_game<'a>(&'a self, app_name: &'a str, path: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            let detail = format!(":{path}");
            self.action("import", app_name, &detail).await
        }
        .boxed()
    }
}
