//! collector-console: terminal console for a camera/IMU/robot data-collection
//! backend.
//!
//! Tails the backend's per-topic WebSocket log channels into bounded panels
//! and drives its REST endpoints (sessions, message relay, backups).

pub mod config;
pub mod console;
pub mod dashboard;
pub mod log_buffer;
pub mod logging;
pub mod panels;
pub mod paths;
pub mod protocol;
pub mod rest_client;
pub mod state_machine;
pub mod ws_client;
