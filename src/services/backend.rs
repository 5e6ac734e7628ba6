use futures_util::future::BoxFuture;

use crate::errors::Result;
use crate::models::{AppSettings, InstallPayload, InstallProgress};

/// The out-of-process installer/runtime the library drives.
///
/// Every action resolves once the backend is done with it: `install` returns
/// when the download finished (or was killed), `launch` when the game exited.
/// A rejected action is reported as `Err` and never retried by the caller.
pub trait Backend: Send + Sync {
    /// Progress of the running transfer, `None` when the backend has nothing to report.
    fn request_progress<'a>(&'a self, app_name: &'a str)
        -> BoxFuture<'a, Result<Option<InstallProgress>>>;

    fn request_settings<'a>(&'a self, target: &'a str) -> BoxFuture<'a, Result<AppSettings>>;

    fn install<'a>(&'a self, payload: &'a InstallPayload) -> BoxFuture<'a, Result<()>>;

    fn update<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>>;

    fn uninstall<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>>;

    fn launch<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>>;

    fn kill<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>>;

    fn repair<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>>;

    fn move_install<'a>(&'a self, app_name: &'a str, path: &'a str)
        -> BoxFuture<'a, Result<()>>;

    /// Registers a copy of the game that is already on disk at `path`.
    fn import_game<'a>(&'a self, app_name: &'a str, path: &'a str)
        -> BoxFuture<'a, Result<()>>;
}
