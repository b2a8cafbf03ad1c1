//! Turn-scoped transcript assembly.
//!
//! Transcription arrives as partial text deltas, interleaved across both
//! speakers within a turn. Deltas accumulate per role until the turn-complete
//! signal, then flush into finalized entries in a fixed order so the
//! conversation history is deterministic regardless of delta arrival order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Speaker role for a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// A finalized line of conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn now(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Accumulators for the current, not-yet-finalized turn.
#[derive(Debug, Default)]
pub struct TurnTranscript {
    user: String,
    assistant: String,
}

impl TurnTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenate a partial delta onto the role's accumulator.
    pub fn append(&mut self, role: Role, delta: &str) {
        match role {
            Role::User => self.user.push_str(delta),
            Role::Assistant => self.assistant.push_str(delta),
        }
    }

    /// Finalize the turn: emit an entry per non-empty accumulator (user
    /// before assistant), stamped with the flush time, and clear both
    /// accumulators unconditionally. An entry never carries empty text.
    pub fn flush(&mut self) -> Vec<TranscriptEntry> {
        let timestamp = Utc::now();
        let mut entries = Vec::with_capacity(2);

        let user = self.user.trim();
        if !user.is_empty() {
            entries.push(TranscriptEntry {
                role: Role::User,
                text: user.to_string(),
                timestamp,
            });
        }

        let assistant = self.assistant.trim();
        if !assistant.is_empty() {
            entries.push(TranscriptEntry {
                role: Role::Assistant,
                text: assistant.to_string(),
                timestamp,
            });
        }

        self.user.clear();
        self.assistant.clear();
        entries
    }

    /// True when both accumulators are empty.
    pub fn is_empty(&self) -> bool {
        self.user.is_empty() && self.assistant.is_empty()
    }
}
