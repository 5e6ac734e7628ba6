use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::{LauncherError, Result};
use crate::models::{AppSettings, InstallPayload, InstallProgress};
use crate::services::Backend;

pub const REQUEST_GAME_PROGRESS: &str = "requestGameProgress";
pub const REQUEST_SETTINGS: &str = "requestSettings";
pub const INSTALL: &str = "install";
pub const UPDATE_GAME: &str = "updateGame";
pub const UNINSTALL: &str = "uninstall";
pub const LAUNCH: &str = "launch";
pub const KILL: &str = "kill";
pub const REPAIR: &str = "repair";
pub const MOVE_INSTALL: &str = "moveInstall";
pub const IMPORT_GAME: &str = "importGame";

/// Talks to a backend sidecar that exposes its request channels as
/// `POST {base_url}/ipc/{request_name}`.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: String) -> Self {
        // Install and launch block until the backend finishes, so there is no
        // overall request timeout; progress requests are bounded by the poller.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(6))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, request_name: &str) -> String {
        format!("{}/ipc/{}", self.base_url.trim_end_matches('/'), request_name)
    }

    /// Sends one named request and returns the raw response body.
    pub async fn invoke<B: Serialize>(&self, request_name: &str, payload: &B) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint(request_name))
            .json(payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LauncherError::Http(format!(
                "{} -> HTTP {}: {}",
                request_name,
                status.as_u16(),
                text
            )));
        }

        Ok(response.text().await?)
    }

    async fn invoke_json<T: DeserializeOwned, B: Serialize>(
        &self,
        request_name: &str,
        payload: &B,
    ) -> Result<T> {
        let body = self.invoke(request_name, payload).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn invoke_action<B: Serialize>(&self, request_name: &str, payload: &B) -> Result<()> {
        let body = self.invoke(request_name, payload).await?;
        parse_action_body(request_name, &body)
    }
}

fn app_body(app_name: &str) -> serde_json::Value {
    serde_json::json!({ "appName": app_name })
}

pub(crate) fn parse_progress_body(body: &str) -> Result<Option<InstallProgress>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    Ok(serde_json::from_str::<Option<InstallProgress>>(body)?)
}

/// A 2xx action answer is a success unless it is JSON carrying
/// `{"error": "..."}`. Plain-text bodies such as `OK` are accepted.
pub(crate) fn parse_action_body(request_name: &str, body: &str) -> Result<()> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return Ok(());
    };
    match value.get("error") {
        Some(serde_json::Value::Null) | None => Ok(()),
        Some(error) => {
            let message = error
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            Err(LauncherError::Backend(format!("{request_name}: {message}")))
        }
    }
}

impl Backend for HttpBackend {
    fn request_progress<'a>(
        &'a self,
        app_name: &'a str,
    ) -> BoxFuture<'a, Result<Option<InstallProgress>>> {
        async move {
            let body = self.invoke(REQUEST_GAME_PROGRESS, &app_body(app_name)).await?;
            parse_progress_body(&body)
        }
        .boxed()
    }

    fn request_settings<'a>(&'a self, target: &'a str) -> BoxFuture<'a, Result<AppSettings>> {
        async move {
            let body = serde_json::json!({ "target": target });
            self.invoke_json(REQUEST_SETTINGS, &body).await
        }
        .boxed()
    }

    fn install<'a>(&'a self, payload: &'a InstallPayload) -> BoxFuture<'a, Result<()>> {
        self.invoke_action(INSTALL, payload).boxed()
    }

    fn update<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>> {
        async move { self.invoke_action(UPDATE_GAME, &app_body(app_name)).await }.boxed()
    }

    fn uninstall<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>> {
        async move { self.invoke_action(UNINSTALL, &app_body(app_name)).await }.boxed()
    }

    fn launch<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>> {
        async move { self.invoke_action(LAUNCH, &app_body(app_name)).await }.boxed()
    }

    fn kill<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>> {
        async move { self.invoke_action(KILL, &app_body(app_name)).await }.boxed()
    }

    fn repair<'a>(&'a self, app_name: &'a str) -> BoxFuture<'a, Result<()>> {
        async move { self.invoke_action(REPAIR, &app_body(app_name)).await }.boxed()
    }

    fn move_install<'a>(&'a self, app_name: &'a str, path: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            let body = serde_json::json!({ "appName": app_name, "path": path });
            self.invoke_action(MOVE_INSTALL, &body).await
        }
        .boxed()
    }

    fn import_game<'a>(&'a self, app_name: &'a str, path: &'a str) -> BoxFuture<'a, Result<()>> {
        async move {
            let body = serde_json::json!({ "appName": app_name, "path": path });
            self.invoke_action(IMPORT_GAME, &body).await
        }
        .boxed()
    }
}
