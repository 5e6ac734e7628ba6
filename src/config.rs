use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1500;
pub const DEFAULT_PROGRESS_TIMEOUT_SECONDS: u64 = 10;

#[derive(Clone, Debug)]
pub struct LibraryConfig {
    /// Delay between two progress requests for the same game.
    pub poll_interval: Duration,
    /// Upper bound on a single progress request; expiry counts as "no data".
    pub progress_timeout: Duration,
    /// Reject a new install/update while another game is transferring.
    pub exclusive_transfers: bool,
    pub root_dir: Option<PathBuf>,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            progress_timeout: Duration::from_secs(DEFAULT_PROGRESS_TIMEOUT_SECONDS),
            exclusive_transfers: true,
            root_dir: None,
        }
    }
}

impl LibraryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let poll_interval = parse_u64(lookup("LAUNCHER_POLL_INTERVAL_MS"))
            .map(|value| Duration::from_millis(value.clamp(100, 60_000)))
            .unwrap_or(defaults.poll_interval);
        let progress_timeout = parse_u64(lookup("LAUNCHER_PROGRESS_TIMEOUT_SECONDS"))
            .map(|value| Duration::from_secs(value.clamp(1, 120)))
            .unwrap_or(defaults.progress_timeout);
        let exclusive_transfers = parse_flag(lookup("LAUNCHER_EXCLUSIVE_TRANSFERS"))
            .unwrap_or(defaults.exclusive_transfers);
        let root_dir = lookup("LAUNCHER_ROOT_DIR")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        Self {
            poll_interval,
            progress_timeout,
            exclusive_transfers,
            root_dir,
        }
    }
}

fn parse_u64(value: Option<String>) -> Option<u64> {
    value.and_then(|raw| raw.trim().parse::<u64>().ok())
}

fn parse_flag(value: Option<String>) -> Option<bool> {
    let normalized = value?.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
