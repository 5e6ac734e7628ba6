use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{GameStatus, LibraryEvent, StatusKind};

const EVENT_CAPACITY: usize = 256;

/// Why a transition request was turned down. Rejections are not errors: the
/// request is dropped and the current state stays as it was.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum RejectReason {
    /// The game is already in another active state.
    Busy { current: StatusKind },
    /// Another game is installing or updating and transfers are exclusive.
    TransferInProgress { app_name: String },
    NotInstalled,
    AlreadyInstalled,
    /// Nothing to stop or cancel.
    NotActive,
}

#[derive(Clone, Debug)]
struct Entry {
    status: GameStatus,
    generation: u64,
}

/// Preconditions checked atomically with the transition into an active state.
#[derive(Clone, Copy, Debug)]
pub(crate) struct BeginGuard {
    pub installed: Option<bool>,
    pub exclusive_transfer: bool,
}

/// Read-only view over the shared status map.
#[derive(Clone)]
pub struct StatusReader {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    events: broadcast::Sender<LibraryEvent>,
}

impl StatusReader {
    pub fn get(&self, app_name: &str) -> Option<GameStatus> {
        self.lock().get(app_name).map(|entry| entry.status.clone())
    }

    /// Absent entries are idle.
    pub fn status(&self, app_name: &str) -> StatusKind {
        self.lock()
            .get(app_name)
            .map(|entry| entry.status.status)
            .unwrap_or_default()
    }

    pub fn is_transferring(&self, app_name: &str) -> bool {
        self.status(app_name).is_transfer()
    }

    /// First game (by name) currently installing or updating.
    pub fn active_transfer(&self) -> Option<String> {
        let map = self.lock();
        let mut names: Vec<&String> = map
            .values()
            .filter(|entry| entry.status.status.is_transfer())
            .map(|entry| &entry.status.app_name)
            .collect();
        names.sort();
        names.first().map(|name| name.to_string())
    }

    pub fn snapshot(&self) -> Vec<GameStatus> {
        let map = self.lock();
        let mut items: Vec<GameStatus> = map.values().map(|entry| entry.status.clone()).collect();
        items.sort_by(|a, b| a.app_name.cmp(&b.app_name));
        items
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// The only writer of the status map. Owned by the orchestrator.
pub struct StatusStore {
    reader: StatusReader,
    next_generation: AtomicU64,
}

impl StatusStore {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            reader: StatusReader {
                entries: Arc::new(Mutex::new(HashMap::new())),
                events,
            },
            next_generation: AtomicU64::new(1),
        }
    }

    pub fn reader(&self) -> StatusReader {
        self.reader.clone()
    }

    /// Why `begin` would be refused right now, if it would.
    pub(crate) fn check(
        &self,
        app_name: &str,
        kind: StatusKind,
        guard: BeginGuard,
    ) -> Option<RejectReason> {
        rejection(&self.reader.lock(), app_name, kind, guard)
    }

    /// Moves an idle game into `kind`. Returns the generation that identifies
    /// this run; only a `finish` carrying it may bring the game back to idle.
    pub(crate) fn begin(
        &self,
        app_name: &str,
        kind: StatusKind,
        folder: Option<String>,
        guard: BeginGuard,
    ) -> Result<u64, RejectReason> {
        let changed = {
            let mut map = self.reader.lock();

            if let Some(reason) = rejection(&map, app_name, kind, guard) {
                return Err(reason);
            }

            let entry = map.entry(app_name.to_string()).or_insert_with(|| Entry {
                status: GameStatus::idle(app_name),
                generation: 0,
            });
            let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
            entry.status.status = kind;
            if folder.is_some() {
                entry.status.folder = folder;
            }
            entry.generation = generation;
            (entry.status.clone(), generation)
        };

        self.emit(LibraryEvent::StatusChanged(changed.0));
        Ok(changed.1)
    }

    /// Returns the game to idle if `generation` is still the current run.
    pub(crate) fn finish(
        &self,
        app_name: &str,
        generation: u64,
        apply: impl FnOnce(&mut GameStatus),
    ) -> bool {
        let changed = {
            let mut map = self.reader.lock();
            match map.get_mut(app_name) {
                Some(entry) if entry.generation == generation && entry.status.status.is_active() => {
                    entry.status.status = StatusKind::Idle;
                    entry.generation = 0;
                    apply(&mut entry.status);
                    entry.status.clone()
                }
                _ => return false,
            }
        };

        self.emit(LibraryEvent::StatusChanged(changed));
        true
    }

    /// Returns the game to idle whatever run it is in, superseding that run.
    /// Yields the state it left, `None` if it was not active.
    pub(crate) fn force_idle(&self, app_name: &str) -> Option<GameStatus> {
        self.force_idle_if(app_name, StatusKind::is_active)
    }

    /// Like `force_idle`, restricted to the states `accept` lets through.
    pub(crate) fn force_idle_if(
        &self,
        app_name: &str,
        accept: impl Fn(StatusKind) -> bool,
    ) -> Option<GameStatus> {
        let (previous, changed) = {
            let mut map = self.reader.lock();
            let entry = map.get_mut(app_name)?;
            if !entry.status.status.is_active() || !accept(entry.status.status) {
                return None;
            }
            let previous = entry.status.clone();
            entry.status.status = StatusKind::Idle;
            entry.generation = 0;
            (previous, entry.status.clone())
        };

        self.emit(LibraryEvent::StatusChanged(changed));
        Some(previous)
    }

    /// Updates fields of a game without a state transition.
    pub(crate) fn amend(&self, app_name: &str, apply: impl FnOnce(&mut GameStatus)) {
        let changed = {
            let mut map = self.reader.lock();
            let entry = map.entry(app_name.to_string()).or_insert_with(|| Entry {
                status: GameStatus::idle(app_name),
                generation: 0,
            });
            let before = entry.status.clone();
            apply(&mut entry.status);
            if entry.status == before {
                return;
            }
            entry.status.clone()
        };

        self.emit(LibraryEvent::StatusChanged(changed));
    }

    pub(crate) fn emit(&self, event: LibraryEvent) {
        // No subscribers is fine.
        let _ = self.reader.events.send(event);
    }
}

fn rejection(
    map: &HashMap<String, Entry>,
    app_name: &str,
    kind: StatusKind,
    guard: BeginGuard,
) -> Option<RejectReason> {
    if guard.exclusive_transfer && kind.is_transfer() {
        let other = map.values().find(|entry| {
            entry.status.app_name != app_name && entry.status.status.is_transfer()
        });
        if let Some(other) = other {
            return Some(RejectReason::TransferInProgress {
                app_name: other.status.app_name.clone(),
            });
        }
    }

    let (current, installed) = map
        .get(app_name)
        .map(|entry| (entry.status.status, entry.status.installed))
        .unwrap_or((StatusKind::Idle, false));
    if current.is_active() {
        return Some(RejectReason::Busy { current });
    }
    match guard.installed {
        Some(true) if !installed => Some(RejectReason::NotInstalled),
        Some(false) if installed => Some(RejectReason::AlreadyInstalled),
        _ => None,
    }
}
