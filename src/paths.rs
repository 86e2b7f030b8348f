//! Application directories for collector-console.
//!
//! - Config: `$XDG_CONFIG_HOME/collector-console/` or `~/.config/collector-console/`
//! - Logs:   `~/Library/Logs/collector-console/` on macOS,
//!           `$XDG_DATA_HOME/collector-console/logs/` (or `~/.local/share/...`) elsewhere

use std::path::{Path, PathBuf};
use tracing::info;

const APP_NAME: &str = "collector-console";
const CONFIG_FILE: &str = "config.toml";

/// Resolved application directory paths.
#[derive(Debug, Clone)]
pub struct ConsolePaths {
    /// Human-editable config directory.
    pub config: PathBuf,
    /// Application log directory.
    pub logs: PathBuf,
}

impl ConsolePaths {
    /// Resolve all paths from the user's home directory.
    /// Nothing is created here; see [`ConsolePaths::ensure`].
    pub fn resolve() -> Option<Self> {
        let home = std::env::var("HOME").ok().map(PathBuf::from)?;
        Some(Self {
            config: resolve_config_dir(&home),
            logs: resolve_log_dir(&home),
        })
    }

    /// Default location of the TOML configuration file.
    pub fn config_file(&self) -> PathBuf {
        self.config.join(CONFIG_FILE)
    }

    /// Create all directories that don't already exist.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [&self.config, &self.logs] {
            std::fs::create_dir_all(dir)?;
            info!("ensured directory: {}", dir.display());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Platform-specific path resolution
// ---------------------------------------------------------------------------

fn resolve_config_dir(home: &Path) -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join(APP_NAME)
    } else {
        home.join(".config").join(APP_NAME)
    }
}

#[cfg(target_os = "macos")]
fn resolve_log_dir(home: &Path) -> PathBuf {
    home.join("Library").join("Logs").join(APP_NAME)
}

#[cfg(not(target_os = "macos"))]
fn resolve_log_dir(home: &Path) -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        PathBuf::from(xdg).join(APP_NAME).join("logs")
    } else {
        home.join(".local").join("share").join(APP_NAME).join("logs")
    }
}
