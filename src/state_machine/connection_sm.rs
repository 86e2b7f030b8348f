//! Per-panel connection state machine.
//!
//! Hierarchy:
//! ```text
//! Attached (superstate)          Disconnected
//!     ├── Connecting  ──Opened──►     ▲
//!     └── Connected                   │
//!            └──────Closed / Failed───┘
//! Disconnected ──Reconnect──► Connecting
//! Connected    ──Reconnect──► Connecting
//! ```

use statig::prelude::*;
use tracing::{info, warn};

use crate::protocol::Topic;

// ---------------------------------------------------------------------------
// Public status
// ---------------------------------------------------------------------------

/// Connection status shown next to a panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Connected,
    Disconnected,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Socket lifecycle events dispatched to the machine.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// The WebSocket handshake completed.
    Opened,
    /// The server closed the socket or the stream ended.
    Closed,
    /// Connecting or reading failed.
    Failed(String),
    /// The operator asked for a fresh connection.
    Reconnect,
}

// ---------------------------------------------------------------------------
// Shared storage
// ---------------------------------------------------------------------------

pub struct ConnectionMachine {
    pub topic: Topic,
    /// Reason of the most recent failure, cleared once a socket opens.
    pub last_error: Option<String>,
}

impl ConnectionMachine {
    pub fn new(topic: Topic) -> Self {
        Self {
            topic,
            last_error: None,
        }
    }

    pub fn connection_state(state: &State) -> ConnectionState {
        match state {
            State::Connecting {} => ConnectionState::Connecting,
            State::Connected {} => ConnectionState::Connected,
            State::Disconnected {} => ConnectionState::Disconnected,
        }
    }
}

// ---------------------------------------------------------------------------
// State machine implementation
// ---------------------------------------------------------------------------

#[state_machine(
    initial = "State::connecting()",
    state(derive(Debug, Clone, PartialEq))
)]
impl ConnectionMachine {
    /// A socket exists or is being opened.
    #[superstate]
    fn attached(&mut self, event: &ConnectionEvent) -> Outcome<State> {
        match event {
            ConnectionEvent::Closed => Transition(State::disconnected()),
            ConnectionEvent::Failed(reason) => {
                self.last_error = Some(reason.clone());
                Transition(State::disconnected())
            }
            _ => Handled,
        }
    }

    #[state(superstate = "attached")]
    fn connecting(&mut self, event: &ConnectionEvent) -> Outcome<State> {
        match event {
            ConnectionEvent::Opened => {
                self.last_error = None;
                Transition(State::connected())
            }
            ConnectionEvent::Reconnect => Handled,
            _ => Super,
        }
    }

    #[state(superstate = "attached", entry_action = "enter_connected")]
    fn connected(&mut self, event: &ConnectionEvent) -> Outcome<State> {
        match event {
            ConnectionEvent::Reconnect => Transition(State::connecting()),
            _ => Super,
        }
    }

    /// No socket. Only an explicit reconnect leaves this state.
    #[state(entry_action = "enter_disconnected")]
    fn disconnected(&mut self, event: &ConnectionEvent) -> Outcome<State> {
        match event {
            ConnectionEvent::Reconnect => Transition(State::connecting()),
            _ => Handled,
        }
    }

    #[action]
    fn enter_connected(&mut self) {
        info!(target: "panel", topic = %self.topic, "Listening");
    }

    #[action]
    fn enter_disconnected(&mut self) {
        match &self.last_error {
            Some(reason) => warn!(target: "panel", topic = %self.topic, %reason, "Disconnected"),
            None => info!(target: "panel", topic = %self.topic, "Disconnected"),
        }
    }
}
