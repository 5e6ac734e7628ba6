use std::fs;
use std::path::{Path, PathBuf};

const PORTABLE_MARKER: &str = "portable.config.json";

/// Creates `path` if needed; `None` for an empty or unwritable path.
fn existing_dir(path: &Path) -> Option<PathBuf> {
    let usable = !path.as_os_str().is_empty() && fs::create_dir_all(path).is_ok();
    usable.then(|| path.to_path_buf())
}

/// Directory of the running executable when it carries the portable marker.
fn portable_root() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let dir = exe.parent()?;
    dir.join(PORTABLE_MARKER).exists().then(|| dir.to_path_buf())
}

fn env_dir(key: &str) -> Option<PathBuf> {
    let value = std::env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    existing_dir(Path::new(trimmed))
}

pub fn resolve_root_dir(root_override: Option<&Path>) -> PathBuf {
    root_override
        .and_then(existing_dir)
        .or_else(|| env_dir("LAUNCHER_ROOT_DIR"))
        .or_else(portable_root)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn resolve_cache_dir(root_override: Option<&Path>) -> PathBuf {
    let root = resolve_root_dir(root_override);
    let cache = root.join("cache");
    existing_dir(&cache).unwrap_or(root)
}

pub fn resolve_log_dir(root_override: Option<&Path>) -> PathBuf {
    if let Some(dir) = env_dir("LAUNCHER_LOG_DIR") {
        return dir;
    }

    let root = resolve_root_dir(root_override);
    let root_logs = root.join("logs");
    if let Some(found) = existing_dir(&root_logs) {
        return found;
    }

    PathBuf::from("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_root_wins_and_subdirs_are_created() {
        let root = std::env::temp_dir().join(format!("library-paths-{}", uuid::Uuid::new_v4()));
        assert_eq!(resolve_root_dir(Some(&root)), root);

        let cache = resolve_cache_dir(Some(&root));
        assert_eq!(cache, root.join("cache"));
        assert!(cache.is_dir());
    }
}
