use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LauncherError {
    /// The backend could not be reached.
    #[error("Backend unreachable: {0}")]
    Network(#[from] reqwest::Error),
    /// The backend answered with a non-2xx status.
    #[error("Backend HTTP error: {0}")]
    Http(String),
    #[error("Snapshot database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The backend ran the action and reported that it failed.
    #[error("Backend action failed: {0}")]
    Backend(String),
    #[error("Timed out waiting for {0}")]
    Timeout(String),
    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LauncherError>;
