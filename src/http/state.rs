use crate::session::VoiceSession;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The one voice session engine this service exposes
    pub engine: Arc<VoiceSession>,
}

impl AppState {
    pub fn new(engine: Arc<VoiceSession>) -> Self {
        Self { engine }
    }
}
