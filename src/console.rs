//! Operator console: parses command lines and runs them against the panels
//! and the backend.
//!
//! Commands: help, status, show, refresh, clear, session, sessions, start,
//! stop, send, backups, backup, restore, history, quit.

use anyhow::Result;
use tracing::warn;

use crate::dashboard::{self, Style};
use crate::panels::PanelSet;
use crate::protocol::{LineKind, Topic, default_session_label};
use crate::rest_client::BackendClient;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Output line styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Info,
    Success,
    Error,
    Value,
}

pub type Output = Vec<(String, OutputKind)>;

/// A single topic or every open panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    One(Topic),
    All,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Show(Option<Topic>),
    Refresh(Target),
    Clear(Target),
    Session,
    Sessions,
    Start(Option<String>),
    Stop,
    Send {
        dest: Topic,
        kind: LineKind,
        text: String,
    },
    Backups,
    Backup,
    Restore(String),
    History {
        kind: Topic,
        label: String,
    },
    Quit,
}

const HELP: &[(&str, &str)] = &[
    ("status", "Connection status of every panel"),
    ("show [topic]", "Print buffered lines (all panels if omitted)"),
    ("refresh <topic|all>", "Drop the connection and open a fresh one"),
    ("clear <topic|all>", "Empty a panel's buffer"),
    ("session", "Show whether a session is running"),
    ("sessions", "List recorded sessions"),
    ("start [label]", "Start a session (default label ses_<timestamp>)"),
    ("stop", "Stop the running session"),
    ("send <dest> <type> <text>", "Broadcast a line on a channel"),
    ("backups", "List database backups"),
    ("backup", "Create a database backup"),
    ("restore <file>", "Restore a database backup"),
    ("history <camera|imu|robot> <label>", "Count records of a session"),
    ("help", "Show this help"),
    ("quit", "Close all panels and exit"),
];

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn parse_topic(arg: &str) -> Result<Topic, String> {
    arg.parse()
}

/// The input after the first `n` whitespace-separated tokens, unaltered.
fn rest_after(line: &str, n: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..n {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest
}

fn parse_target(arg: Option<&str>, usage: &str) -> Result<Target, String> {
    match arg {
        None => Err(format!("Usage: {}", usage)),
        Some("all") => Ok(Target::All),
        Some(t) => parse_topic(t).map(Target::One),
    }
}

impl Command {
    /// Parse one input line. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<Command>, String> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((&head, args)) = parts.split_first() else {
            return Ok(None);
        };

        let command = match head {
            "help" | "?" => Command::Help,
            "status" => Command::Status,
            "show" => Command::Show(args.first().map(|t| parse_topic(t)).transpose()?),
            "refresh" => Command::Refresh(parse_target(args.first().copied(), "refresh <topic|all>")?),
            "clear" => Command::Clear(parse_target(args.first().copied(), "clear <topic|all>")?),
            "session" => Command::Session,
            "sessions" => Command::Sessions,
            "start" => Command::Start(args.first().map(|s| s.to_string())),
            "stop" => Command::Stop,
            "send" => {
                if args.len() < 3 {
                    return Err("Usage: send <dest> <type> <text>".into());
                }
                Command::Send {
                    dest: parse_topic(args[0])?,
                    kind: LineKind::from(args[1]),
                    text: rest_after(line, 3).to_string(),
                }
            }
            "backups" => Command::Backups,
            "backup" => Command::Backup,
            "restore" => match args.first() {
                Some(file) => Command::Restore(file.to_string()),
                None => return Err("Usage: restore <file>".into()),
            },
            "history" => {
                if args.len() < 2 {
                    return Err("Usage: history <camera|imu|robot> <label>".into());
                }
                let kind = parse_topic(args[0])?;
                if !kind.has_session_data() {
                    return Err(format!("{} has no recorded session data", kind));
                }
                Command::History {
                    kind,
                    label: args[1].to_string(),
                }
            }
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("Unknown command: `{}`. Type `help` for usage.", other)),
        };
        Ok(Some(command))
    }

    /// Whether the command only talks to the backend (usable one-shot).
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            Command::Session
                | Command::Sessions
                | Command::Start(_)
                | Command::Stop
                | Command::Send { .. }
                | Command::Backups
                | Command::Backup
                | Command::Restore(_)
                | Command::History { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

pub struct Console {
    panels: PanelSet,
    backend: BackendClient,
    style: Style,
    quit: bool,
}

impl Console {
    pub fn new(panels: PanelSet, backend: BackendClient, style: Style) -> Self {
        Self {
            panels,
            backend,
            style,
            quit: false,
        }
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Parse and run one input line.
    pub async fn execute(&mut self, line: &str) -> Output {
        match Command::parse(line) {
            Ok(Some(command)) => self.run(command).await,
            Ok(None) => Vec::new(),
            Err(msg) => vec![(msg, OutputKind::Error)],
        }
    }

    pub async fn run(&mut self, command: Command) -> Output {
        let mut out = Output::new();
        let label = command_label(&command);
        if let Err(e) = self.dispatch(command, &mut out).await {
            warn!(target: "console", command = label, "{:#}", e);
            out.push((format!("{:#}", e), OutputKind::Error));
        }
        out
    }

    async fn dispatch(&mut self, command: Command, out: &mut Output) -> Result<()> {
        match command {
            Command::Help => {
                out.push(("Commands:".into(), OutputKind::Info));
                for (cmd, desc) in HELP {
                    out.push((format!("  {:<36} {}", cmd, desc), OutputKind::Value));
                }
            }
            Command::Status => {
                if self.panels.is_empty() {
                    out.push(("No panels open".into(), OutputKind::Info));
                }
                for row in dashboard::render_status(&self.panels.snapshots(), self.style) {
                    out.push((row, OutputKind::Value));
                }
            }
            Command::Show(topic) => {
                let snapshots = match topic {
                    Some(t) => vec![self.panels.snapshot(t)?],
                    None => self.panels.snapshots(),
                };
                for snap in snapshots {
                    out.push((dashboard::render_panel(&snap, None, self.style), OutputKind::Value));
                }
            }
            Command::Refresh(Target::All) => {
                self.panels.reconnect_all().await;
                out.push(("Reconnecting all panels".into(), OutputKind::Success));
            }
            Command::Refresh(Target::One(topic)) => {
                self.panels.reconnect(topic).await?;
                out.push((format!("Reconnecting {}", topic), OutputKind::Success));
            }
            Command::Clear(Target::All) => {
                self.panels.clear_all();
                out.push(("Cleared all panels".into(), OutputKind::Success));
            }
            Command::Clear(Target::One(topic)) => {
                self.panels.clear(topic)?;
                out.push((format!("Cleared {}", topic), OutputKind::Success));
            }
            Command::Session => {
                let status = self.backend.session_status().await?;
                let msg = match status.id {
                    Some(id) => format!("Session {} is running", id),
                    None if status.active => "A session is running".to_string(),
                    None => "No session is running".to_string(),
                };
                out.push((msg, OutputKind::Value));
            }
            Command::Sessions => {
                let sessions = self.backend.list_sessions().await?;
                if sessions.is_empty() {
                    out.push(("No sessions recorded".into(), OutputKind::Info));
                }
                for session in sessions {
                    out.push((format!("  {}", session), OutputKind::Value));
                }
            }
            Command::Start(label) => {
                let label = label.unwrap_or_else(|| default_session_label(chrono::Utc::now()));
                let msg = self.backend.start_session(&label).await?;
                out.push((msg, OutputKind::Success));
            }
            Command::Stop => {
                let outcome = self.backend.stop_session().await?;
                out.push((
                    outcome.message.unwrap_or_else(|| "Session stopped".into()),
                    OutputKind::Success,
                ));
                match outcome.backup {
                    Some(b) if b.success => out.push((
                        format!("Backup written to {}", b.path.as_deref().unwrap_or("(unknown path)")),
                        OutputKind::Success,
                    )),
                    Some(b) => out.push((
                        format!("Backup failed: {}", b.error.as_deref().unwrap_or("no reason given")),
                        OutputKind::Error,
                    )),
                    None => {}
                }
            }
            Command::Send { dest, kind, text } => {
                self.backend.send(dest, kind.clone(), &text).await?;
                out.push((format!("Sent {} line to {}", kind, dest), OutputKind::Success));
            }
            Command::Backups => {
                let files = self.backend.list_backups().await?;
                if files.is_empty() {
                    out.push(("No backups found".into(), OutputKind::Info));
                }
                for file in files {
                    out.push((format!("  {}", file), OutputKind::Value));
                }
            }
            Command::Backup => {
                let path = self.backend.create_backup().await?;
                let msg = match path {
                    Some(p) => format!("Backup created: {}", p),
                    None => "Backup created".to_string(),
                };
                out.push((msg, OutputKind::Success));
            }
            Command::Restore(file) => {
                out.push((format!("Restoring {}...", file), OutputKind::Info));
                self.backend.restore_backup(&file).await?;
                out.push(("Loaded backup successfully".into(), OutputKind::Success));
            }
            Command::History { kind, label } => {
                let records = self.backend.session_data(kind, &label).await?;
                out.push((
                    format!("{} {} record(s) in session {}", records.len(), kind, label),
                    OutputKind::Value,
                ));
            }
            Command::Quit => self.quit = true,
        }
        Ok(())
    }

    /// Close all panels.
    pub async fn shutdown(&mut self) {
        self.panels.shutdown().await;
    }
}

fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Help => "help",
        Command::Status => "status",
        Command::Show(_) => "show",
        Command::Refresh(_) => "refresh",
        Command::Clear(_) => "clear",
        Command::Session => "session",
        Command::Sessions => "sessions",
        Command::Start(_) => "start",
        Command::Stop => "stop",
        Command::Send { .. } => "send",
        Command::Backups => "backups",
        Command::Backup => "backup",
        Command::Restore(_) => "restore",
        Command::History { .. } => "history",
        Command::Quit => "quit",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendConfig;

    #[test]
    fn blank_line_is_not_a_command() {
        assert_eq!(Command::parse("   "), Ok(None));
    }

    #[test]
    fn parses_panel_commands() {
        assert_eq!(
            Command::parse("refresh camera"),
            Ok(Some(Command::Refresh(Target::One(Topic::Camera))))
        );
        assert_eq!(Command::parse("clear all"), Ok(Some(Command::Clear(Target::All))));
        assert_eq!(Command::parse("show"), Ok(Some(Command::Show(None))));
        assert_eq!(Command::parse("show imu"), Ok(Some(Command::Show(Some(Topic::Imu)))));
        assert!(Command::parse("refresh").is_err());
        assert!(Command::parse("clear lidar").is_err());
    }

    #[test]
    fn send_joins_remaining_words() {
        assert_eq!(
            Command::parse("send misc error DB is down again"),
            Ok(Some(Command::Send {
                dest: Topic::Misc,
                kind: LineKind::Error,
                text: "DB is down again".into(),
            }))
        );
        assert!(Command::parse("send misc info").is_err());
    }

    #[test]
    fn send_text_keeps_inner_spacing() {
        assert_eq!(
            Command::parse("  send robot info  joint 3:  12.5  deg"),
            Ok(Some(Command::Send {
                dest: Topic::Robot,
                kind: LineKind::Info,
                text: "joint 3:  12.5  deg".into(),
            }))
        );
    }

    #[test]
    fn start_label_is_optional() {
        assert_eq!(Command::parse("start"), Ok(Some(Command::Start(None))));
        assert_eq!(
            Command::parse("start calib_01"),
            Ok(Some(Command::Start(Some("calib_01".into()))))
        );
    }

    #[test]
    fn history_rejects_misc() {
        assert!(Command::parse("history misc ses_1").is_err());
        assert_eq!(
            Command::parse("history robot ses_1"),
            Ok(Some(Command::History {
                kind: Topic::Robot,
                label: "ses_1".into(),
            }))
        );
    }

    #[test]
    fn unknown_command_names_itself() {
        let err = Command::parse("reboot now").unwrap_err();
        assert!(err.contains("reboot"));
    }

    #[test]
    fn backend_commands_are_flagged() {
        assert!(Command::Backups.is_backend());
        assert!(Command::Start(None).is_backend());
        assert!(!Command::Status.is_backend());
        assert!(!Command::Refresh(Target::All).is_backend());
    }

    fn offline_console() -> Console {
        let backend = BackendClient::new(&BackendConfig::default()).unwrap();
        Console::new(PanelSet::empty(), backend, Style::plain())
    }

    #[tokio::test]
    async fn help_lists_commands() {
        let mut console = offline_console();
        let out = console.execute("help").await;
        assert_eq!(out[0], ("Commands:".to_string(), OutputKind::Info));
        assert!(out.iter().any(|(l, _)| l.contains("refresh <topic|all>")));
    }

    #[tokio::test]
    async fn missing_panel_reports_error() {
        let mut console = offline_console();
        let out = console.execute("clear camera").await;
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].1, OutputKind::Error);
        assert!(out[0].0.contains("camera"));
    }

    #[tokio::test]
    async fn quit_sets_flag() {
        let mut console = offline_console();
        assert!(!console.should_quit());
        assert!(console.execute("exit").await.is_empty());
        assert!(console.should_quit());
    }
}
