//! WebSocket log panels.
//!
//! A [`LogPanel`] tails one `/ws/<topic>` channel of the collection backend
//! into a bounded [`LogBuffer`]. The socket runs in a Tokio task that pushes
//! lines and status changes into shared state; the console reads snapshots
//! from it and subscribes to [`PanelEvent`]s for live output.
//!
//! There is no automatic retry. A panel owns at most one connection task:
//! [`LogPanel::reconnect`] and [`LogPanel::shutdown`] signal the current task
//! and await it before anything new is opened. Dropping a panel drops the
//! shutdown sender, which also closes the socket.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result, anyhow};
use futures_util::{SinkExt, StreamExt};
use statig::prelude::*;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::PanelConfig;
use crate::log_buffer::LogBuffer;
use crate::protocol::{LineKind, LogLine, Topic};
use crate::state_machine::connection_sm::{ConnectionEvent, ConnectionMachine, ConnectionState};

// ---------------------------------------------------------------------------
// Events and snapshots
// ---------------------------------------------------------------------------

/// Something a panel did, published for live rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    Line { topic: Topic, line: LogLine },
    Status { topic: Topic, state: ConnectionState },
    Cleared { topic: Topic },
}

/// Point-in-time copy of a panel for rendering.
#[derive(Debug, Clone)]
pub struct PanelSnapshot {
    pub topic: Topic,
    pub url: Url,
    pub state: ConnectionState,
    pub last_error: Option<String>,
    pub lines: Vec<LogLine>,
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

struct PanelState {
    buffer: LogBuffer,
    machine: StateMachine<ConnectionMachine>,
}

/// Handle the connection task uses to write into its panel.
#[derive(Clone)]
struct PanelSink {
    topic: Topic,
    announce: bool,
    state: Arc<Mutex<PanelState>>,
    events: broadcast::Sender<PanelEvent>,
}

impl PanelSink {
    fn lock(&self) -> MutexGuard<'_, PanelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: PanelEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn push(&self, line: LogLine) {
        self.lock().buffer.push(line.clone());
        self.publish(PanelEvent::Line {
            topic: self.topic,
            line,
        });
    }

    fn frame(&self, raw: &str) {
        let line = LogLine::from_frame(raw);
        if line.kind == LineKind::Normal && line.text == raw {
            debug!(target: "panel", topic = %self.topic, "freeform frame");
        }
        self.push(line);
    }

    fn transition(&self, event: ConnectionEvent) {
        let (before, after) = {
            let mut state = self.lock();
            let before = ConnectionMachine::connection_state(state.machine.state());
            state.machine.handle(&event);
            (
                before,
                ConnectionMachine::connection_state(state.machine.state()),
            )
        };

        if self.announce {
            let announcement = match &event {
                ConnectionEvent::Opened => Some(LogLine::new(LineKind::Info, "[client] connected")),
                ConnectionEvent::Closed => Some(LogLine::raw("[client] disconnected")),
                ConnectionEvent::Failed(_) => Some(LogLine::new(LineKind::Error, "[client] error")),
                ConnectionEvent::Reconnect => None,
            };
            if let Some(line) = announcement {
                self.push(line);
            }
        }

        if before != after {
            self.publish(PanelEvent::Status {
                topic: self.topic,
                state: after,
            });
        }
    }

    fn clear(&self) {
        self.lock().buffer.clear();
        self.publish(PanelEvent::Cleared { topic: self.topic });
    }
}

// ---------------------------------------------------------------------------
// Panel
// ---------------------------------------------------------------------------

struct ActiveConnection {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// One log panel: a bounded buffer fed by a single WebSocket connection.
pub struct LogPanel {
    url: Url,
    clear_on_reconnect: bool,
    sink: PanelSink,
    active: Option<ActiveConnection>,
}

/// `<ws_base>/ws/<topic>`, keeping any path prefix of the base.
pub fn channel_url(ws_base: &Url, topic: Topic) -> Result<Url> {
    let mut url = ws_base.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow!("{} cannot be used as a WebSocket base", ws_base))?
        .pop_if_empty()
        .extend(["ws", topic.as_str()]);
    Ok(url)
}

impl LogPanel {
    /// Create a panel without connecting it.
    pub fn new(
        topic: Topic,
        ws_base: &Url,
        options: &PanelConfig,
        events: broadcast::Sender<PanelEvent>,
    ) -> Result<Self> {
        let url = channel_url(ws_base, topic)
            .with_context(|| format!("building URL for the {} panel", topic))?;
        let state = PanelState {
            buffer: LogBuffer::with_capacity(options.capacity),
            machine: ConnectionMachine::new(topic).state_machine(),
        };
        Ok(Self {
            url,
            clear_on_reconnect: options.clear_on_reconnect,
            sink: PanelSink {
                topic,
                announce: options.announce_connection,
                state: Arc::new(Mutex::new(state)),
                events,
            },
            active: None,
        })
    }

    pub fn topic(&self) -> Topic {
        self.sink.topic
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn state(&self) -> ConnectionState {
        ConnectionMachine::connection_state(self.sink.lock().machine.state())
    }

    /// Whether a connection task exists (connecting or connected).
    pub fn has_connection(&self) -> bool {
        self.active.as_ref().is_some_and(|a| !a.task.is_finished())
    }

    /// Open the connection. Any existing connection is torn down first.
    pub async fn connect(&mut self) {
        self.teardown().await;
        self.sink.transition(ConnectionEvent::Reconnect);
        self.open();
    }

    /// Drop the current connection and open a fresh one.
    pub async fn reconnect(&mut self) {
        self.teardown().await;
        if self.clear_on_reconnect {
            self.sink.clear();
        }
        self.sink.transition(ConnectionEvent::Reconnect);
        info!(target: "panel", topic = %self.topic(), url = %self.url, "reconnecting");
        self.open();
    }

    /// Empty the buffer; the connection is left alone.
    pub fn clear(&self) {
        self.sink.clear();
    }

    /// Close the connection and wait for its task to finish.
    pub async fn shutdown(&mut self) {
        self.teardown().await;
        if self.state() != ConnectionState::Disconnected {
            self.sink.transition(ConnectionEvent::Closed);
        }
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        let state = self.sink.lock();
        PanelSnapshot {
            topic: self.sink.topic,
            url: self.url.clone(),
            state: ConnectionMachine::connection_state(state.machine.state()),
            last_error: state.machine.last_error.clone(),
            lines: state.buffer.to_vec(),
        }
    }

    fn open(&mut self) {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run_connection(
            self.sink.clone(),
            self.url.clone(),
            shutdown_rx,
        ));
        self.active = Some(ActiveConnection {
            shutdown: shutdown_tx,
            task,
        });
    }

    /// Signal and await the current connection task.
    async fn teardown(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        // Err means the task already finished on its own.
        let _ = active.shutdown.send(());
        if let Err(e) = active.task.await {
            warn!(target: "panel", topic = %self.topic(), "connection task ended abnormally: {}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// Connection task
// ---------------------------------------------------------------------------

/// Run one connection to completion.
///
/// Ends when the server closes, the transport fails, or `shutdown` fires (or
/// its sender is dropped). On shutdown the socket is closed and the status is
/// left to the caller.
async fn run_connection(sink: PanelSink, url: Url, mut shutdown: oneshot::Receiver<()>) {
    let topic = sink.topic;

    let connected = tokio::select! {
        result = connect_async(url.as_str()) => result,
        _ = &mut shutdown => {
            debug!(target: "panel", %topic, "connect attempt abandoned");
            return;
        }
    };

    let ws_stream = match connected {
        Ok((ws_stream, _response)) => ws_stream,
        Err(e) => {
            warn!(target: "panel", %topic, %url, "connection failed: {}", e);
            sink.transition(ConnectionEvent::Failed(e.to_string()));
            return;
        }
    };

    info!(target: "panel", %topic, %url, "WebSocket connected");
    sink.transition(ConnectionEvent::Opened);

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg_result = read.next() => {
                match msg_result {
                    Some(Ok(Message::Text(text))) => sink.frame(&text),
                    Some(Ok(Message::Binary(data))) => sink.frame(&String::from_utf8_lossy(&data)),
                    Some(Ok(Message::Ping(data))) => {
                        let _ = write.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(target: "panel", %topic, "WebSocket closed by server");
                        sink.transition(ConnectionEvent::Closed);
                        return;
                    }
                    Some(Err(e)) => {
                        warn!(target: "panel", %topic, "WebSocket error: {}", e);
                        sink.transition(ConnectionEvent::Failed(e.to_string()));
                        return;
                    }
                    Some(Ok(_)) => {}
                }
            }

            _ = &mut shutdown => {
                debug!(target: "panel", %topic, "closing WebSocket");
                if let Err(e) = write.send(Message::Close(None)).await {
                    debug!(target: "panel", %topic, "close frame not delivered: {}", e);
                }
                return;
            }
        }
    }
}
