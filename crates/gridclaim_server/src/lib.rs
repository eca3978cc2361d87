//! HTTP and WebSocket front end for the gridclaim canvas.

pub mod actor;
pub mod api;
pub mod config;
pub mod snapshots;
pub mod ws;

pub use api::{router, AppState};
pub use config::{ServerConfig, ServerConfigError};
