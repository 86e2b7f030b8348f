//! Collection backend protocol types.
//!
//! Defines the frames received on the `/ws/<topic>` log channels, the
//! normalized `LogLine` every panel stores, and the JSON bodies exchanged
//! with the backend's REST endpoints. Response fields are kept even if not
//! currently read, for protocol completeness.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Topics
// ---------------------------------------------------------------------------

/// A named log channel on the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    Camera,
    Imu,
    Robot,
    Misc,
}

impl Topic {
    pub const ALL: [Topic; 4] = [Topic::Camera, Topic::Imu, Topic::Robot, Topic::Misc];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Camera => "camera",
            Topic::Imu => "imu",
            Topic::Robot => "robot",
            Topic::Misc => "misc",
        }
    }

    /// Panel heading, e.g. `Camera Messages`.
    pub fn title(self) -> String {
        let name = self.as_str();
        let mut chars = name.chars();
        let capitalized = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
            None => String::new(),
        };
        format!("{} Messages", capitalized)
    }

    /// Topics that carry historical session data (`GET /<kind>/<label>`).
    pub fn has_session_data(self) -> bool {
        !matches!(self, Topic::Misc)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "camera" => Ok(Topic::Camera),
            "imu" => Ok(Topic::Imu),
            "robot" => Ok(Topic::Robot),
            "misc" => Ok(Topic::Misc),
            other => Err(format!(
                "unknown topic `{}` (expected camera, imu, robot or misc)",
                other
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Log lines
// ---------------------------------------------------------------------------

/// The `type` tag of a log line. Unknown tags are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LineKind {
    #[default]
    Normal,
    Info,
    Error,
    Other(String),
}

impl LineKind {
    pub fn as_str(&self) -> &str {
        match self {
            LineKind::Normal => "normal",
            LineKind::Info => "info",
            LineKind::Error => "error",
            LineKind::Other(s) => s,
        }
    }
}

impl From<String> for LineKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "normal" => LineKind::Normal,
            "info" => LineKind::Info,
            "error" => LineKind::Error,
            _ => LineKind::Other(s),
        }
    }
}

impl From<&str> for LineKind {
    fn from(s: &str) -> Self {
        LineKind::from(s.to_string())
    }
}

impl From<LineKind> for String {
    fn from(kind: LineKind) -> Self {
        match kind {
            LineKind::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One displayable line derived from a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub text: String,
    #[serde(rename = "type")]
    pub kind: LineKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl LogLine {
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            kind,
            timestamp: None,
        }
    }

    /// A freeform line: the raw payload rendered as normal text.
    pub fn raw(text: impl Into<String>) -> Self {
        Self::new(LineKind::Normal, text)
    }

    /// Decode one frame payload.
    ///
    /// A JSON object with a non-empty string `type` and a truthy `text` keeps
    /// both (plus `timestamp` when it is a string). Truthy text is a
    /// non-empty string or a non-zero number. Anything else becomes a normal
    /// line holding the raw payload.
    pub fn from_frame(raw: &str) -> Self {
        let value: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(_) => return Self::raw(raw),
        };

        let kind = value
            .get("type")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty());
        let text = value.get("text").and_then(truthy_text);

        match (kind, text) {
            (Some(kind), Some(text)) => Self {
                text,
                kind: LineKind::from(kind),
                timestamp: value
                    .get("timestamp")
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            },
            _ => Self::raw(raw),
        }
    }
}

fn truthy_text(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        serde_json::Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// REST bodies (console → backend)
// ---------------------------------------------------------------------------

/// Body of `POST /send/{dest}`: a message the backend rebroadcasts on `dest`.
#[derive(Debug, Clone, Serialize)]
pub struct RelayMessage {
    #[serde(rename = "type")]
    pub kind: LineKind,
    pub text: String,
}

impl RelayMessage {
    pub fn new(kind: LineKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

/// Default label for a new session: `ses_<UTC ISO-8601 timestamp>`.
pub fn default_session_label(now: chrono::DateTime<chrono::Utc>) -> String {
    format!(
        "ses_{}",
        now.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
    )
}

// ---------------------------------------------------------------------------
// REST bodies (backend → console)
// ---------------------------------------------------------------------------

/// Common `{success, error, message}` envelope shared by most endpoints.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Envelope {
    #[serde(default)]
    pub success: bool,
    pub error: Option<String>,
    pub message: Option<String>,
}

/// `GET /session`
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SessionStatusResponse {
    #[serde(default)]
    pub success: bool,
    pub error: Option<String>,
    /// Current session id, `-404` when no session runs.
    #[serde(default)]
    pub id: i64,
    /// Whether a session is running.
    #[serde(default)]
    pub data: bool,
}

/// Outcome of a backup attempt (`GET /backup/` or nested in `/session/stop`).
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BackupResponse {
    #[serde(default)]
    pub success: bool,
    pub path: Option<String>,
    pub error: Option<String>,
}

/// `GET /session/stop`
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StopSessionResponse {
    #[serde(default)]
    pub success: bool,
    pub error: Option<String>,
    pub message: Option<String>,
    pub backup: Option<BackupResponse>,
}

/// `GET /backup/list`
#[derive(Debug, Deserialize, Clone, Default)]
pub struct BackupListResponse {
    #[serde(default)]
    pub files: Vec<String>,
}

/// `GET /sessions` and `GET /<kind>/<label>`
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DataResponse {
    #[serde(default)]
    pub success: bool,
    pub error: Option<String>,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

/// Session state as reported by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub active: bool,
    pub id: Option<i64>,
}

impl From<SessionStatusResponse> for SessionStatus {
    fn from(resp: SessionStatusResponse) -> Self {
        let id = (resp.data && resp.id != -404).then_some(resp.id);
        Self {
            active: resp.data,
            id,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
