pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod live;
pub mod session;
pub mod tools;

pub use audio::{ActivityDetector, AudioChunk, PeakActivity, PlaybackEvent, PlaybackScheduler};
pub use config::Config;
pub use error::{DecodeError, EngineError, EngineResult, ToolError};
pub use http::{create_router, AppState};
pub use live::{FunctionCall, FunctionResponse, ServerEvent, ToolDeclaration};
pub use session::{Role, SessionSnapshot, SessionStatus, TranscriptEntry, VoiceSession};
pub use tools::{ToolAction, ToolDispatcher, ToolFailurePolicy, ToolOutcome, ToolRegistry};
