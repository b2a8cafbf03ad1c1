//! The session controller: lifecycle state machine and event demux.
//!
//! One `VoiceSession` exists per engine and runs at most one live session at
//! a time. All cross-cutting session state lives in a single `SessionShared`
//! struct behind one lock; hardware callbacks, channel messages and public
//! operations are independent event sources funneled through channels into
//! one event loop, so nothing races on the shared state.

use crate::audio::{
    codec, AudioCapture, CaptureConfig, CaptureHandle, CapturedBlock, PeakActivity, PlaybackEvent,
    PlaybackScheduler,
};
use crate::config::{AudioSettings, LiveConfig};
use crate::error::{EngineError, EngineResult};
use crate::live::{ChannelConfig, LiveChannel, Outbound, ServerEvent};
use crate::session::transcript::{Role, TranscriptEntry, TurnTranscript};
use crate::tools::{ToolDispatcher, ToolFailurePolicy, ToolOutcome, ToolRegistry};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Session lifecycle states.
///
/// `Disconnected → Connecting → Connected → Disconnected` on a normal run;
/// any state can fall to `Error` on an unrecoverable failure, and only an
/// explicit stop leaves `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connecting,
    Connected,
    /// Unrecoverable failure with a user-visible message. No automatic
    /// retry; the user must restart explicitly.
    Error(String),
}

impl SessionStatus {
    pub fn name(&self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Error(_) => "error",
        }
    }
}

/// Cross-cutting session state: one struct, one lock.
struct SessionShared {
    status: SessionStatus,
    session_id: Option<String>,
    transcript: Vec<TranscriptEntry>,
    user_speaking: bool,
    assistant_speaking: bool,
    last_tool_payload: Option<serde_json::Value>,
}

impl SessionShared {
    fn new() -> Self {
        Self {
            status: SessionStatus::Disconnected,
            session_id: None,
            transcript: Vec::new(),
            user_speaking: false,
            assistant_speaking: false,
            last_tool_payload: None,
        }
    }
}

/// Point-in-time projection of session state for presentation layers.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Option<String>,
    pub status: String,
    pub error: Option<String>,
    pub user_speaking: bool,
    pub assistant_speaking: bool,
    pub tool_processing: bool,
    pub transcript_entries: usize,
    pub last_tool_payload: Option<serde_json::Value>,
}

/// Live resources of the open session, torn down on every exit path.
struct SessionRuntime {
    channel_tx: mpsc::Sender<Outbound>,
    dispatcher: Arc<ToolDispatcher>,
    stop_tx: oneshot::Sender<()>,
    event_loop: JoinHandle<()>,
}

/// The top-level engine: owns the state machine and wires capture, playback,
/// transcript assembly and tool dispatch to the duplex channel.
pub struct VoiceSession {
    live: LiveConfig,
    audio: AudioSettings,
    policy: ToolFailurePolicy,
    registry: Arc<ToolRegistry>,
    shared: Arc<RwLock<SessionShared>>,
    runtime: Mutex<Option<SessionRuntime>>,
}

impl VoiceSession {
    pub fn new(
        live: LiveConfig,
        audio: AudioSettings,
        policy: ToolFailurePolicy,
        registry: ToolRegistry,
    ) -> Self {
        Self {
            live,
            audio,
            policy,
            registry: Arc::new(registry),
            shared: Arc::new(RwLock::new(SessionShared::new())),
            runtime: Mutex::new(None),
        }
    }

    /// Open a session: acquire the audio devices, connect the channel, start
    /// capture and send the opening greeting.
    ///
    /// Valid only while disconnected or errored; one session at a time.
    pub async fn start(&self) -> EngineResult<()> {
        let session_id = {
            let mut shared = self.shared.write().await;
            match shared.status {
                SessionStatus::Disconnected | SessionStatus::Error(_) => {}
                _ => {
                    return Err(EngineError::InvalidState {
                        expected: "disconnected",
                        actual: shared.status.name(),
                    })
                }
            }
            let session_id = format!("live-{}", uuid::Uuid::new_v4());
            shared.status = SessionStatus::Connecting;
            shared.session_id = Some(session_id.clone());
            shared.transcript.clear();
            shared.user_speaking = false;
            shared.assistant_speaking = false;
            shared.last_tool_payload = None;
            session_id
        };

        // A previous session that died on its own may have left a runtime
        // shell behind; clear it before claiming the devices again.
        self.teardown_runtime().await;

        info!(session_id = %session_id, "starting voice session");

        let (playback_tx, playback_rx) = mpsc::unbounded_channel::<PlaybackEvent>();
        let scheduler = match PlaybackScheduler::start(self.audio.playback_sample_rate, playback_tx)
        {
            Ok(scheduler) => Arc::new(scheduler),
            Err(err) => {
                self.fail(format!("audio output unavailable: {err}")).await;
                return Err(err);
            }
        };

        let channel_config = ChannelConfig {
            url: self.live.url.clone(),
            api_key: self.live.api_key.clone(),
            model: self.live.model.clone(),
            voice: self.live.voice.clone(),
            system_instruction: self.live.system_instruction.clone(),
            input_sample_rate: self.audio.capture_sample_rate,
            tools: self.registry.declarations(),
        };
        let mut channel = match LiveChannel::connect(session_id.clone(), channel_config).await {
            Ok(channel) => channel,
            Err(err) => {
                scheduler.shutdown();
                self.fail(format!("could not reach the voice service: {err}"))
                    .await;
                return Err(err);
            }
        };
        let events_rx = channel
            .take_event_receiver()
            .ok_or_else(|| EngineError::Channel("event receiver already taken".to_string()))?;
        let channel_tx = channel.sender();

        let (blocks_tx, blocks_rx) = mpsc::unbounded_channel::<CapturedBlock>();
        let capture_config = CaptureConfig {
            sample_rate: self.audio.capture_sample_rate,
            channels: 1,
            block_size: self.audio.block_size,
        };
        let detector = Box::new(PeakActivity::new(self.audio.activity_threshold));
        let capture = match AudioCapture::start(capture_config, detector, blocks_tx) {
            Ok(capture) => capture,
            Err(err) => {
                channel.close().await;
                scheduler.shutdown();
                self.fail(format!("microphone unavailable: {err}")).await;
                return Err(err);
            }
        };

        self.shared.write().await.status = SessionStatus::Connected;
        info!(session_id = %session_id, "voice session connected");

        // Opening move: one configured instruction per successful connect.
        if !self.live.greeting.is_empty() {
            if let Err(err) = channel_tx.send(Outbound::Text(self.live.greeting.clone())).await {
                warn!(session_id = %session_id, "greeting not sent: {err}");
            }
        }

        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel::<ToolOutcome>();
        let dispatcher = Arc::new(ToolDispatcher::new(
            Arc::clone(&self.registry),
            self.policy,
            outcomes_tx,
        ));

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let event_loop = tokio::spawn(run_event_loop(EventLoop {
            shared: Arc::clone(&self.shared),
            scheduler,
            capture,
            channel_tx: channel_tx.clone(),
            events_rx,
            blocks_rx,
            playback_rx,
            outcomes_rx,
            dispatcher: Arc::clone(&dispatcher),
            stop_rx,
            playback_sample_rate: self.audio.playback_sample_rate,
        }));

        *self.runtime.lock().await = Some(SessionRuntime {
            channel_tx,
            dispatcher,
            stop_tx,
            event_loop,
        });

        Ok(())
    }

    /// Tear the session down and return to `Disconnected`.
    ///
    /// Valid from any state and idempotent: stopping an already-disconnected
    /// session is a no-op and releases nothing twice. Teardown is
    /// best-effort and never propagates failures.
    pub async fn stop(&self) {
        self.teardown_runtime().await;

        let mut shared = self.shared.write().await;
        if shared.status != SessionStatus::Disconnected {
            info!("voice session stopped");
        }
        shared.status = SessionStatus::Disconnected;
        shared.user_speaking = false;
        shared.assistant_speaking = false;
    }

    /// Forward a typed message while connected. Text input is never partial,
    /// so the user transcript entry is appended immediately.
    pub async fn send_text(&self, message: &str) -> EngineResult<()> {
        {
            let shared = self.shared.read().await;
            if shared.status != SessionStatus::Connected {
                return Err(EngineError::InvalidState {
                    expected: "connected",
                    actual: shared.status.name(),
                });
            }
        }

        let text = message.trim();
        if text.is_empty() {
            debug!("ignoring empty text message");
            return Ok(());
        }

        self.shared
            .write()
            .await
            .transcript
            .push(TranscriptEntry::now(Role::User, text));

        let channel_tx = {
            let runtime = self.runtime.lock().await;
            runtime
                .as_ref()
                .map(|runtime| runtime.channel_tx.clone())
                .ok_or_else(|| EngineError::Channel("no active channel".to_string()))?
        };
        channel_tx
            .send(Outbound::Text(text.to_string()))
            .await
            .map_err(|_| EngineError::Channel("outbound path closed".to_string()))
    }

    /// Start when idle or errored, stop otherwise.
    pub async fn toggle(&self) -> EngineResult<()> {
        let status = self.shared.read().await.status.clone();
        match status {
            SessionStatus::Disconnected | SessionStatus::Error(_) => self.start().await,
            _ => {
                self.stop().await;
                Ok(())
            }
        }
    }

    pub async fn status(&self) -> SessionStatus {
        self.shared.read().await.status.clone()
    }

    /// Ordered conversation history finalized so far.
    pub async fn transcript(&self) -> Vec<TranscriptEntry> {
        self.shared.read().await.transcript.clone()
    }

    /// Projection of the observable engine state.
    pub async fn snapshot(&self) -> SessionSnapshot {
        let tool_processing = {
            let runtime = self.runtime.lock().await;
            runtime
                .as_ref()
                .map(|runtime| runtime.dispatcher.processing())
                .unwrap_or(false)
        };
        let shared = self.shared.read().await;
        SessionSnapshot {
            session_id: shared.session_id.clone(),
            status: shared.status.name().to_string(),
            error: match &shared.status {
                SessionStatus::Error(message) => Some(message.clone()),
                _ => None,
            },
            user_speaking: shared.user_speaking,
            assistant_speaking: shared.assistant_speaking,
            tool_processing,
            transcript_entries: shared.transcript.len(),
            last_tool_payload: shared.last_tool_payload.clone(),
        }
    }

    async fn fail(&self, message: String) {
        error!("voice session failed: {message}");
        self.shared.write().await.status = SessionStatus::Error(message);
    }

    /// Signal the event loop to exit and wait for it to finish its own
    /// resource release. Harmless when no loop is running.
    async fn teardown_runtime(&self) {
        let runtime = self.runtime.lock().await.take();
        if let Some(runtime) = runtime {
            let _ = runtime.stop_tx.send(());
            if let Err(err) = runtime.event_loop.await {
                warn!("event loop did not exit cleanly: {err}");
            }
        }
    }
}

/// Everything the event loop owns while the session is connected.
struct EventLoop {
    shared: Arc<RwLock<SessionShared>>,
    scheduler: Arc<PlaybackScheduler>,
    capture: CaptureHandle,
    channel_tx: mpsc::Sender<Outbound>,
    events_rx: mpsc::Receiver<ServerEvent>,
    blocks_rx: mpsc::UnboundedReceiver<CapturedBlock>,
    playback_rx: mpsc::UnboundedReceiver<PlaybackEvent>,
    outcomes_rx: mpsc::UnboundedReceiver<ToolOutcome>,
    dispatcher: Arc<ToolDispatcher>,
    stop_rx: oneshot::Receiver<()>,
    playback_sample_rate: u32,
}

/// Serialize every event source against the shared session state, then
/// release the devices on the way out, whichever way the session ends.
async fn run_event_loop(ctx: EventLoop) {
    let EventLoop {
        shared,
        scheduler,
        mut capture,
        channel_tx,
        mut events_rx,
        mut blocks_rx,
        mut playback_rx,
        mut outcomes_rx,
        dispatcher,
        mut stop_rx,
        playback_sample_rate,
    } = ctx;

    let mut turn = TurnTranscript::new();

    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                debug!("event loop: stop requested");
                break;
            }

            Some(block) = blocks_rx.recv() => {
                {
                    let mut shared = shared.write().await;
                    if shared.user_speaking != block.speaking {
                        shared.user_speaking = block.speaking;
                    }
                }
                if channel_tx.send(Outbound::Audio(block.pcm)).await.is_err() {
                    // The inbound loop reports the failure; nothing to do here.
                    debug!("event loop: outbound path closed, dropping capture block");
                }
            }

            Some(event) = events_rx.recv() => {
                match event {
                    ServerEvent::Audio { data, mime_type } => {
                        let rate = crate::live::messages::rate_from_mime(&mime_type)
                            .unwrap_or(playback_sample_rate);
                        // Per-chunk errors stay per-chunk: drop and move on.
                        match codec::decode(&data, rate, 1) {
                            Ok(chunk) => scheduler.enqueue(chunk),
                            Err(err) => warn!("dropping malformed audio payload: {err}"),
                        }
                    }
                    ServerEvent::InputTranscript { text } => turn.append(Role::User, &text),
                    ServerEvent::OutputTranscript { text } => turn.append(Role::Assistant, &text),
                    ServerEvent::TurnComplete => {
                        let entries = turn.flush();
                        if !entries.is_empty() {
                            shared.write().await.transcript.extend(entries);
                        }
                    }
                    ServerEvent::Interrupted => {
                        debug!("barge-in: cancelling playback");
                        scheduler.interrupt();
                    }
                    ServerEvent::ToolCall { calls } => {
                        for call in calls {
                            dispatcher.dispatch(call);
                        }
                    }
                    ServerEvent::SetupComplete => {}
                    ServerEvent::GoAway => {
                        info!("server announced imminent disconnect");
                    }
                    ServerEvent::Error { message } => {
                        error!("session channel failed: {message}");
                        shared.write().await.status = SessionStatus::Error(message);
                        break;
                    }
                    ServerEvent::Closed => {
                        info!("session channel closed by server");
                        let mut shared = shared.write().await;
                        if !matches!(shared.status, SessionStatus::Error(_)) {
                            shared.status = SessionStatus::Disconnected;
                        }
                        break;
                    }
                }
            }

            Some(event) = playback_rx.recv() => {
                let speaking = event == PlaybackEvent::Started;
                shared.write().await.assistant_speaking = speaking;
            }

            Some(outcome) = outcomes_rx.recv() => {
                if outcome.success {
                    let mut shared = shared.write().await;
                    shared.last_tool_payload =
                        outcome.response.response.get("payload").cloned();
                }
                if channel_tx
                    .send(Outbound::ToolResponse(outcome.response))
                    .await
                    .is_err()
                {
                    warn!("tool response not delivered: outbound path closed");
                }
            }

            else => {
                debug!("event loop: all sources closed");
                break;
            }
        }
    }

    // Mandatory release on every exit path from Connected: microphone,
    // scheduled playback, output sink, then the channel.
    capture.stop();
    scheduler.shutdown();
    let _ = channel_tx.send(Outbound::Close).await;

    let mut shared = shared.write().await;
    shared.user_speaking = false;
    shared.assistant_speaking = false;
}
