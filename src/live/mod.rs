//! Duplex channel to the remote streaming inference service.
//!
//! `messages` defines the wire format; `channel` owns the WebSocket and the
//! two I/O loops. The rest of the engine never touches the socket directly.

pub mod channel;
pub mod messages;

pub use channel::{ChannelConfig, LiveChannel, Outbound, DEFAULT_LIVE_URL};
pub use messages::{FunctionCall, FunctionResponse, ServerEvent, ToolDeclaration};
