//! Live session management
//!
//! This module provides the `VoiceSession` abstraction that manages:
//! - The session lifecycle state machine (start/stop/toggle/send-text)
//! - Demultiplexing of inbound channel messages
//! - Turn-scoped transcript assembly
//! - Observable state projections for presentation layers

mod controller;
mod transcript;

pub use controller::{SessionSnapshot, SessionStatus, VoiceSession};
pub use transcript::{Role, TranscriptEntry, TurnTranscript};
