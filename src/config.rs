//! Console configuration.
//!
//! Loaded from `config.toml` in the config directory (see [`crate::paths`]).
//! A missing file yields the defaults; every section is `#[serde(default)]`
//! so a partial file only overrides what it names. Command-line flags are
//! applied on top through [`Overrides`].

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::log_buffer::DEFAULT_CAPACITY;
use crate::paths::ConsolePaths;
use crate::protocol::Topic;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub backend: BackendConfig,
    pub panels: PanelConfig,
}

/// Where the collection backend lives.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// REST base, e.g. `http://192.168.1.76:8000`.
    pub base_url: String,
    /// WebSocket base. Derived from `base_url` when absent.
    pub ws_base: Option<String>,
    pub request_timeout_secs: u64,
}

/// How each log panel behaves.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PanelConfig {
    pub topics: Vec<Topic>,
    /// Lines kept per panel.
    pub capacity: usize,
    /// Append `[client] connected` style lines on socket lifecycle events.
    pub announce_connection: bool,
    /// Start from an empty buffer after every reconnect.
    pub clear_on_reconnect: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            ws_base: None,
            request_timeout_secs: 10,
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            topics: Topic::ALL.to_vec(),
            capacity: DEFAULT_CAPACITY,
            announce_connection: false,
            clear_on_reconnect: true,
        }
    }
}

/// Values given on the command line; `None`/empty leaves the file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub ws_base: Option<String>,
    pub topics: Vec<Topic>,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid configuration TOML")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialise configuration")
    }

    /// Read `path`; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("in {}", path.display()))
    }

    /// Load `explicit` if given, else `config.toml` in the config directory.
    /// Without a config directory (HOME unset) the defaults are used.
    pub fn load_or_default(explicit: Option<&Path>, paths: Option<&ConsolePaths>) -> Result<Self> {
        match (explicit, paths) {
            (Some(path), _) => Self::load(path),
            (None, Some(paths)) => Self::load(&paths.config_file()),
            (None, None) => Ok(Self::default()),
        }
    }

    pub fn apply(&mut self, overrides: Overrides) {
        if let Some(base_url) = overrides.base_url {
            self.backend.base_url = base_url;
        }
        if let Some(ws_base) = overrides.ws_base {
            self.backend.ws_base = Some(ws_base);
        }
        if !overrides.topics.is_empty() {
            self.panels.topics = overrides.topics;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.backend.base_url()?;
        self.backend.ws_base()?;
        if self.panels.capacity == 0 {
            bail!("panels.capacity must be at least 1");
        }
        if self.panels.topics.is_empty() {
            bail!("panels.topics must name at least one topic");
        }
        Ok(())
    }
}

impl BackendConfig {
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid backend.base_url `{}`", self.base_url))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => bail!("backend.base_url must use http or https, not `{}`", other),
        }
    }

    /// The WebSocket base, either configured or derived from `base_url`
    /// (`http` becomes `ws`, `https` becomes `wss`).
    pub fn ws_base(&self) -> Result<Url> {
        let url = match &self.ws_base {
            Some(raw) => Url::parse(raw)
                .with_context(|| format!("invalid backend.ws_base `{}`", raw))?,
            None => {
                let mut url = self.base_url()?;
                let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
                url.set_scheme(scheme)
                    .map_err(|_| anyhow!("cannot derive a WebSocket URL from {}", url))?;
                url
            }
        };
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => bail!("backend.ws_base must use ws or wss, not `{}`", other),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
