//! Text rendering of log panels.
//!
//! Panels render as a title, the buffered lines and a status indicator.
//! Lines are coloured by their `type` tag: error red, info yellow, anything
//! else green. Colour can be switched off for pipes and log capture.

use std::fmt::{Display, Write as _};

use crossterm::style::{Color, StyledContent, Stylize};

use crate::protocol::{LineKind, LogLine, Topic};
use crate::state_machine::connection_sm::ConnectionState;
use crate::ws_client::{PanelEvent, PanelSnapshot};

/// Width the status indicator is padded to in `status` rows.
const STATUS_WIDTH: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct Style {
    pub color: bool,
}

impl Style {
    pub fn plain() -> Self {
        Self { color: false }
    }

    pub fn colored() -> Self {
        Self { color: true }
    }

    /// Render styled content, or only its text when colour is off.
    pub fn apply<D: Display>(&self, styled: StyledContent<D>) -> String {
        if self.color {
            styled.to_string()
        } else {
            styled.content().to_string()
        }
    }
}

fn kind_color(kind: &LineKind) -> Color {
    match kind {
        LineKind::Error => Color::Red,
        LineKind::Info => Color::Yellow,
        LineKind::Normal | LineKind::Other(_) => Color::Green,
    }
}

/// `[timestamp] text`, or just `text` without a timestamp.
pub fn format_line(line: &LogLine, style: Style) -> String {
    let body = match &line.timestamp {
        Some(ts) => format!("[{}] {}", ts, line.text),
        None => line.text.clone(),
    };
    style.apply(body.with(kind_color(&line.kind)))
}

pub fn status_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connected => "● Listening",
        ConnectionState::Connecting => "◌ Connecting",
        ConnectionState::Disconnected => "○ Disconnected",
    }
}

fn status_color(state: ConnectionState) -> Color {
    match state {
        ConnectionState::Connected => Color::Green,
        ConnectionState::Connecting => Color::Yellow,
        ConnectionState::Disconnected => Color::Red,
    }
}

/// Status label padded to `width` before colouring, so columns line up.
fn status_indicator(state: ConnectionState, width: usize, style: Style) -> String {
    let label = format!("{:<width$}", status_label(state), width = width);
    style.apply(label.with(status_color(state)))
}

/// Render one panel. `tail` limits the output to the newest lines.
pub fn render_panel(snapshot: &PanelSnapshot, tail: Option<usize>, style: Style) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {}",
        style.apply(snapshot.topic.title().bold()),
        style.apply(snapshot.url.as_str().dim())
    );

    let skip = tail
        .map(|n| snapshot.lines.len().saturating_sub(n))
        .unwrap_or(0);
    if snapshot.lines.is_empty() {
        let _ = writeln!(out, "  {}", style.apply("(no messages)".dim()));
    } else if skip > 0 {
        let _ = writeln!(out, "  {}", style.apply(format!("… {} older", skip).dim()));
    }
    for line in snapshot.lines.iter().skip(skip) {
        let _ = writeln!(out, "  {}", format_line(line, style));
    }

    let _ = write!(
        out,
        "{}  {} line(s)",
        status_indicator(snapshot.state, 0, style),
        snapshot.lines.len()
    );
    if let (ConnectionState::Disconnected, Some(reason)) = (snapshot.state, &snapshot.last_error) {
        let _ = write!(out, "  {}", style.apply(reason.as_str().dim()));
    }
    out
}

/// One row per panel: topic, status and line count.
pub fn render_status(snapshots: &[PanelSnapshot], style: Style) -> Vec<String> {
    snapshots
        .iter()
        .map(|s| {
            format!(
                "{:<8} {} {:>4} line(s)",
                s.topic.as_str(),
                status_indicator(s.state, STATUS_WIDTH, style),
                s.lines.len()
            )
        })
        .collect()
}

fn topic_prefix(topic: Topic, style: Style) -> String {
    style.apply(format!("{:<6} |", topic.as_str()).dim())
}

/// Follow-mode rendering of a live event. `Cleared` produces no output.
pub fn format_event(event: &PanelEvent, style: Style) -> Option<String> {
    match event {
        PanelEvent::Line { topic, line } => Some(format!(
            "{} {}",
            topic_prefix(*topic, style),
            format_line(line, style)
        )),
        PanelEvent::Status { topic, state } => Some(format!(
            "{} {}",
            topic_prefix(*topic, style),
            status_indicator(*state, 0, style)
        )),
        PanelEvent::Cleared { .. } => None,
    }
}
