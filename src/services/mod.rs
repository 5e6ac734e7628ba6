pub mod backend;
pub mod http_backend;
pub mod install_orchestrator;
pub mod progress_merger;
pub mod progress_poller;
pub mod status_persistence;
pub mod status_store;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::Backend;
pub use http_backend::HttpBackend;
pub use install_orchestrator::{InstallOrchestrator, TransitionOutcome};
pub use progress_poller::{ProgressPoller, SampleSink};
pub use status_persistence::StatusPersistence;
pub use status_store::{RejectReason, StatusReader, StatusStore};
