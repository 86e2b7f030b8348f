//! Logging initialisation for collector-console.
//!
//! Log output goes to stderr so it never interleaves with panel lines on
//! stdout. `RUST_LOG` wins when set; otherwise the default level comes from
//! the `-v` count. With `COLLECTOR_LOG=1` the same events are also appended,
//! without ANSI colour, to `console.log` in the application log directory.

use std::path::PathBuf;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::paths::ConsolePaths;

/// Keeps the non-blocking file writer alive; drop it last.
pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Default filter directive for a given `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)))
}

fn file_logging_enabled() -> bool {
    std::env::var("COLLECTOR_LOG").as_deref() == Ok("1")
}

/// Log directory, created if missing. Falls back to the temp dir without HOME.
fn log_dir() -> PathBuf {
    match ConsolePaths::resolve() {
        Some(paths) => {
            if let Err(e) = paths.ensure() {
                eprintln!("collector-console: cannot create {}: {}", paths.logs.display(), e);
            }
            paths.logs
        }
        None => {
            let dir = std::env::temp_dir().join("collector-console");
            let _ = std::fs::create_dir_all(&dir);
            dir
        }
    }
}

/// Initialise the global tracing subscriber. Call once from `main`.
pub fn init(verbosity: u8) -> LogGuard {
    let stderr_layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    if !file_logging_enabled() {
        tracing_subscriber::registry()
            .with(filter(verbosity))
            .with(stderr_layer)
            .init();
        return LogGuard { _file_guard: None };
    }

    // File logging records at least `info`, even without `-v`.
    let dir = log_dir();
    let (non_blocking, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(&dir, "console.log"));

    tracing_subscriber::registry()
        .with(filter(verbosity.max(1)))
        .with(stderr_layer)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    tracing::info!(dir = %dir.display(), "file logging enabled");
    LogGuard {
        _file_guard: Some(guard),
    }
}
