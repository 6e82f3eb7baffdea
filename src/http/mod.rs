//! HTTP API server and WebSocket transport
//!
//! This module provides the client-facing surface:
//! - GET /ws/audio?session_id=ID - Live translation session (WebSocket)
//! - GET /sessions - Connected sessions
//! - GET /usage/:session_id - Accumulated usage for a session id
//! - GET /cache/stats - Translation cache statistics
//! - POST /cache/clear - Drop cached translations
//! - GET / and GET /health - Health check

mod handlers;
mod routes;
mod state;
mod ws;

pub use routes::create_router;
pub use state::{AppState, SessionInfo};
