//! REST client for the collection backend.
//!
//! Wraps the session, relay and backup endpoints. Every call maps the
//! backend's `{success: false, error}` replies and non-2xx statuses onto
//! `anyhow` errors so callers only deal with `Result`.

use anyhow::{Context, Result, anyhow, bail};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::config::BackendConfig;
use crate::protocol::{
    BackupListResponse, BackupResponse, DataResponse, Envelope, LineKind, RelayMessage,
    SessionStatus, SessionStatusResponse, StopSessionResponse, Topic,
};

/// Result of `GET /session/stop`.
#[derive(Debug, Clone)]
pub struct StopOutcome {
    pub message: Option<String>,
    /// The automatic backup taken when a session ends.
    pub backup: Option<BackupResponse>,
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: Url,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url()?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join percent-encoded path segments onto the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("{} cannot be used as a REST base", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // -----------------------------------------------------------------------
    // Sessions
    // -----------------------------------------------------------------------

    /// `GET /session`
    pub async fn session_status(&self) -> Result<SessionStatus> {
        let resp: SessionStatusResponse = self.get(&["session"]).await?;
        ensure_success(resp.success, resp.error.as_deref())?;
        Ok(resp.into())
    }

    /// `GET /session/start/{label}`
    pub async fn start_session(&self, label: &str) -> Result<String> {
        if label.trim().is_empty() {
            bail!("session label must not be empty");
        }
        let resp: Envelope = self.get(&["session", "start", label]).await?;
        ensure_success(resp.success, resp.error.as_deref())?;
        info!(target: "backend", %label, "session started");
        Ok(resp
            .message
            .unwrap_or_else(|| format!("Session started with label: {}", label)))
    }

    /// `GET /session/stop`
    pub async fn stop_session(&self) -> Result<StopOutcome> {
        let resp: StopSessionResponse = self.get(&["session", "stop"]).await?;
        ensure_success(resp.success, resp.error.as_deref())?;
        info!(target: "backend", "session stopped");
        Ok(StopOutcome {
            message: resp.message,
            backup: resp.backup,
        })
    }

    /// `GET /sessions`
    pub async fn list_sessions(&self) -> Result<Vec<serde_json::Value>> {
        let resp: DataResponse = self.get(&["sessions"]).await?;
        ensure_success(resp.success, resp.error.as_deref())?;
        Ok(resp.data)
    }

    /// `GET /{camera,imu,robot}/{label}`: data recorded during a session.
    pub async fn session_data(&self, kind: Topic, label: &str) -> Result<Vec<serde_json::Value>> {
        if !kind.has_session_data() {
            bail!("{} has no recorded session data", kind);
        }
        let resp: DataResponse = self.get(&[kind.as_str(), label]).await?;
        ensure_success(resp.success, resp.error.as_deref())?;
        Ok(resp.data)
    }

    // -----------------------------------------------------------------------
    // Relay
    // -----------------------------------------------------------------------

    /// `POST /send/{dest}`: have the backend broadcast a line on `dest`.
    pub async fn send(&self, dest: Topic, kind: LineKind, text: &str) -> Result<()> {
        let body = RelayMessage::new(kind, text);
        let resp: Envelope = self.post(&["send", dest.as_str()], Some(&body)).await?;
        ensure_success(resp.success, resp.error.as_deref())
    }

    // -----------------------------------------------------------------------
    // Backups
    // -----------------------------------------------------------------------

    /// `GET /backup/list`
    pub async fn list_backups(&self) -> Result<Vec<String>> {
        let resp: BackupListResponse = self.get(&["backup", "list"]).await?;
        Ok(resp.files)
    }

    /// `GET /backup/`: returns the path of the new backup file, if reported.
    pub async fn create_backup(&self) -> Result<Option<String>> {
        let resp: BackupResponse = self.get(&["backup", ""]).await?;
        ensure_success(resp.success, resp.error.as_deref())?;
        Ok(resp.path)
    }

    /// `POST /backup/restore/{file}`
    pub async fn restore_backup(&self, file: &str) -> Result<()> {
        if file.trim().is_empty() {
            bail!("backup file name must not be empty");
        }
        let resp: Envelope = self
            .post::<(), _>(&["backup", "restore", file], None)
            .await?;
        ensure_success(resp.success, resp.error.as_deref())?;
        info!(target: "backend", %file, "backup restored");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Transport helpers
    // -----------------------------------------------------------------------

    async fn get<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T> {
        let url = self.endpoint(segments)?;
        debug!(target: "backend", %url, "GET");
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("GET {} failed. Is the backend running?", url))?;
        decode(url, response).await
    }

    async fn post<B: serde::Serialize, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        debug!(target: "backend", %url, "POST");
        let mut request = self.http.post(url.clone());
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("POST {} failed. Is the backend running?", url))?;
        decode(url, response).await
    }
}

async fn decode<T: DeserializeOwned>(url: Url, response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        bail!("{} returned {}: {}", url.path(), status, body.trim());
    }
    response
        .json()
        .await
        .with_context(|| format!("unexpected response body from {}", url.path()))
}

fn ensure_success(success: bool, error: Option<&str>) -> Result<()> {
    if success {
        Ok(())
    } else {
        Err(anyhow!(
            "backend reported failure: {}",
            error.unwrap_or("no reason given")
        ))
    }
}
