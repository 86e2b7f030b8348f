//! In-process stand-in for the collection backend.
//!
//! Serves `/ws/{topic}` (replays a fixed list of frames to every new socket,
//! then ends the socket as [`Ending`] says) and the REST endpoints the console
//! calls. Counters let tests observe how many sockets are open.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

/// What the server does with a socket once its frames are sent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Ending {
    /// Keep reading until the client closes.
    #[default]
    WaitForClient,
    /// Send a Close frame.
    Close,
    /// Drop the connection without a closing handshake.
    Drop,
}

#[derive(Clone, Default)]
pub struct Mock {
    /// Text frames sent to every socket right after it opens.
    pub frames: Arc<Vec<String>>,
    /// Binary frames sent after the text frames.
    pub binary_frames: Arc<Vec<Vec<u8>>>,
    pub ending: Ending,
    pub active: Arc<AtomicUsize>,
    pub opened: Arc<AtomicUsize>,
    pub relayed: Arc<Mutex<Vec<(String, Value)>>>,
    pub session: Arc<Mutex<Option<String>>>,
}

impl Mock {
    pub fn with_frames(frames: Vec<String>) -> Self {
        Self {
            frames: Arc::new(frames),
            ..Self::default()
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(_topic): Path<String>,
    State(mock): State<Mock>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, mock))
}

async fn serve_socket(mut socket: WebSocket, mock: Mock) {
    mock.opened.fetch_add(1, Ordering::SeqCst);
    mock.active.fetch_add(1, Ordering::SeqCst);

    let text = mock.frames.iter().map(|f| Message::Text(f.clone().into()));
    let binary = mock
        .binary_frames
        .iter()
        .map(|b| Message::Binary(b.clone().into()));
    for msg in text.chain(binary) {
        if socket.send(msg).await.is_err() {
            break;
        }
    }

    match mock.ending {
        Ending::WaitForClient => {
            while let Some(Ok(msg)) = socket.recv().await {
                if matches!(msg, Message::Close(_)) {
                    break;
                }
            }
        }
        Ending::Close => {
            let _ = socket.send(Message::Close(None)).await;
        }
        Ending::Drop => drop(socket),
    }

    mock.active.fetch_sub(1, Ordering::SeqCst);
}

async fn session_status(State(mock): State<Mock>) -> Json<Value> {
    let running = mock.session.lock().unwrap().is_some();
    Json(json!({"id": if running { 3 } else { -404 }, "data": running, "success": true}))
}

async fn start_session(Path(label): Path<String>, State(mock): State<Mock>) -> Json<Value> {
    if label == "fail" {
        return Json(json!({"error": "database is locked", "success": false}));
    }
    *mock.session.lock().unwrap() = Some(label.clone());
    Json(json!({"message": format!("Session started with label: {}", label), "success": true}))
}

async fn stop_session(State(mock): State<Mock>) -> Json<Value> {
    mock.session.lock().unwrap().take();
    Json(json!({
        "message": "Current Session Ended",
        "backup": {"success": true, "path": "/db_backups/backup_1.dump"},
        "success": true
    }))
}

async fn list_sessions() -> Json<Value> {
    Json(json!({"data": [{"id": 1, "label": "ses_a"}, {"id": 2, "label": "ses_b"}], "success": true}))
}

async fn session_data(Path(label): Path<String>) -> Json<Value> {
    if label == "missing" {
        return Json(json!({"error": "no such session", "success": false}));
    }
    Json(json!({"data": [{"x": 1}, {"x": 2}, {"x": 3}], "success": true}))
}

async fn relay(
    Path(dest): Path<String>,
    State(mock): State<Mock>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, (StatusCode, &'static str)> {
    if body.get("text").is_none() {
        return Err((StatusCode::BAD_REQUEST, "missing 'text'"));
    }
    mock.relayed.lock().unwrap().push((dest, body));
    Ok(Json(json!({"success": true})))
}

async fn list_backups() -> Json<Value> {
    Json(json!({"files": ["backup_1.dump", "backup_2.dump"]}))
}

async fn create_backup() -> Json<Value> {
    Json(json!({"success": false, "error": "pg_dump not found"}))
}

async fn restore_backup(Path(file): Path<String>) -> Result<Json<Value>, StatusCode> {
    match file.as_str() {
        "backup_1.dump" | "backup_2.dump" => Ok(Json(json!({"success": true}))),
        _ => Err(StatusCode::NOT_FOUND),
    }
}

/// Start the mock on an ephemeral port and return its address.
pub async fn start(mock: Mock) -> SocketAddr {
    let app = Router::new()
        .route("/ws/{topic}", get(ws_handler))
        .route("/session", get(session_status))
        .route("/session/start/{label}", get(start_session))
        .route("/session/stop", get(stop_session))
        .route("/sessions", get(list_sessions))
        .route("/camera/{label}", get(session_data))
        .route("/imu/{label}", get(session_data))
        .route("/robot/{label}", get(session_data))
        .route("/send/{dest}", post(relay))
        .route("/backup/list", get(list_backups))
        .route("/backup/", get(create_backup))
        .route("/backup/restore/{file}", post(restore_backup))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Poll `check` every 20 ms until it holds or `timeout` elapses.
pub async fn wait_until<F: FnMut() -> bool>(mut check: F, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
