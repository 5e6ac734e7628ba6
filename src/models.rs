use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    #[default]
    #[serde(alias = "done")]
    Idle,
    Installing,
    Updating,
    Playing,
    Repairing,
    Moving,
    Importing,
    Uninstalling,
}

impl StatusKind {
    pub fn is_active(self) -> bool {
        !matches!(self, StatusKind::Idle)
    }

    /// Installing and updating are the only states that report progress.
    pub fn is_transfer(self) -> bool {
        matches!(self, StatusKind::Installing | StatusKind::Updating)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StatusKind::Idle => "idle",
            StatusKind::Installing => "installing",
            StatusKind::Updating => "updating",
            StatusKind::Playing => "playing",
            StatusKind::Repairing => "repairing",
            StatusKind::Moving => "moving",
            StatusKind::Importing => "importing",
            StatusKind::Uninstalling => "uninstalling",
        }
    }
}

impl std::fmt::Display for StatusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GameStatus {
    pub app_name: String,
    pub status: StatusKind,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub installed: bool,
}

impl GameStatus {
    pub fn idle(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            status: StatusKind::Idle,
            folder: None,
            installed: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct InstallProgress {
    pub bytes: String,
    pub eta: String,
    pub percent: String,
    pub path: String,
    pub folder: String,
}

impl Default for InstallProgress {
    fn default() -> Self {
        Self {
            bytes: "0.00MiB".to_string(),
            eta: "00:00:00".to_string(),
            percent: "0.00%".to_string(),
            path: String::new(),
            folder: String::new(),
        }
    }
}

impl InstallProgress {
    /// Numeric value of `percent`, clamped to `[0, 100]`. Unparseable text is `0`.
    pub fn percent_value(&self) -> f64 {
        let raw = self.percent.trim().trim_end_matches('%').trim();
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => value.clamp(0.0, 100.0),
            _ => 0.0,
        }
    }

    pub fn set_percent(&mut self, value: f64) {
        self.percent = format!("{:.2}%", value.clamp(0.0, 100.0));
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstallRequest {
    pub app_name: String,
    /// `None` picks the sticky folder, `"default"` asks the backend.
    #[serde(default)]
    pub install_path: Option<String>,
    #[serde(default)]
    pub sdl_list: Vec<String>,
    #[serde(default)]
    pub install_dlcs: bool,
}

impl InstallRequest {
    pub fn new(app_name: &str) -> Self {
        Self {
            app_name: app_name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_path(mut self, path: &str) -> Self {
        self.install_path = Some(path.to_string());
        self
    }
}

/// Body sent to the backend for an install; SDL tags and DLC choice are passed through.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InstallPayload {
    pub app_name: String,
    pub path: String,
    pub sdl_list: Vec<String>,
    pub install_dlcs: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    #[serde(default)]
    pub default_install_path: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LibraryEvent {
    StatusChanged(GameStatus),
    #[serde(rename_all = "camelCase")]
    Progress {
        app_name: String,
        progress: InstallProgress,
    },
    #[serde(rename_all = "camelCase")]
    ActionFailed {
        app_name: String,
        action: String,
        message: String,
    },
}
