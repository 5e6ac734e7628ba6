//! Blends the progress persisted by an earlier run with the backend's own
//! per-run percentage.
//!
//! A resumed download restarts the backend counter at zero even though part
//! of the work is already on disk. The remaining `100 - previous` span is
//! scaled by the backend's fraction and the completed part is added back, so
//! the displayed value carries on from where the last run stopped.

use crate::models::InstallProgress;

/// `round(current / 100 * (100 - previous) + previous)`, clamped to `[0, 100]`.
pub fn merge_percent(previous: f64, current: f64) -> u8 {
    let previous = sanitize(previous);
    let current = sanitize(current);
    let merged = (current / 100.0) * (100.0 - previous) + previous;
    merged.round().clamp(0.0, 100.0) as u8
}

pub fn merge(previous: &InstallProgress, current: &InstallProgress) -> u8 {
    merge_percent(previous.percent_value(), current.percent_value())
}

/// Applies the merge to a live sample. Without a baseline the sample's own
/// percentage is kept (rounded).
pub fn merge_sample(baseline: Option<&InstallProgress>, mut sample: InstallProgress) -> InstallProgress {
    let previous = baseline.map(InstallProgress::percent_value).unwrap_or(0.0);
    let merged = merge_percent(previous, sample.percent_value());
    sample.set_percent(f64::from(merged));
    sample
}

/// A snapshot is a valid resume basis only for the folder it was recorded for.
pub fn is_resumable(snapshot: &InstallProgress, install_folder: &str) -> bool {
    let folder = normalize_install_path(install_folder);
    !folder.is_empty() && normalize_install_path(&snapshot.folder) == folder
}

pub fn resume_baseline(snapshot: InstallProgress, install_folder: &str) -> Option<InstallProgress> {
    if is_resumable(&snapshot, install_folder) {
        Some(snapshot)
    } else {
        None
    }
}

/// Trims whitespace and the single quotes the folder picker wraps paths in.
pub fn normalize_install_path(path: &str) -> String {
    let trimmed = path.trim();
    let unquoted = trimmed
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}
