//! Error types for the voice session engine

use thiserror::Error;

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in the voice session engine.
///
/// `AudioDevice`, `Connect` and `Channel` are fatal for the session: the
/// session moves to the error state and must be restarted explicitly.
/// `Decode` is a per-chunk error and never escalates to session level.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("audio device error: {0}")]
    AudioDevice(String),

    #[error("failed to open session channel: {0}")]
    Connect(String),

    #[error("session channel error: {0}")]
    Channel(String),

    #[error("invalid session state: expected {expected}, session is {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// A single inbound audio payload could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("PCM payload of {len} bytes is not a whole multiple of the {width}-byte sample width")]
    Misaligned { len: usize, width: usize },
}

/// A bound tool action failed.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("tool action failed: {0}")]
    Failed(String),
}

impl From<cpal::DevicesError> for EngineError {
    fn from(err: cpal::DevicesError) -> Self {
        EngineError::AudioDevice(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for EngineError {
    fn from(err: cpal::BuildStreamError) -> Self {
        EngineError::AudioDevice(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for EngineError {
    fn from(err: cpal::PlayStreamError) -> Self {
        EngineError::AudioDevice(err.to_string())
    }
}
