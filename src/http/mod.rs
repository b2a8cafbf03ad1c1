//! HTTP API server for external control (presentation layers)
//!
//! This module provides a REST API for driving the voice session:
//! - POST /session/start - Open the live session
//! - POST /session/stop - Tear the session down
//! - POST /session/toggle - Start when idle, stop when running
//! - POST /session/text - Forward a typed message
//! - GET /session/status - Observable engine state
//! - GET /session/transcript - Finalized conversation history
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
