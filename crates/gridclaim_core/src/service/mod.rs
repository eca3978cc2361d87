//! Canvas use-case services.
//!
//! # Responsibility
//! - Tie validation, cooldown, storage and broadcast into placement and
//!   query APIs.
//! - Keep transport layers (HTTP, WebSocket, CLI) decoupled from storage
//!   details.

pub mod canvas_service;
