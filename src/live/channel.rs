//! WebSocket duplex channel to the remote inference service.
//!
//! `connect` performs the setup handshake, then splits the socket into an
//! outbound drain loop and an inbound parse loop. Everything the rest of the
//! engine sees is an `Outbound` sender and a `ServerEvent` receiver;
//! messages are processed strictly in arrival order on both sides.

use crate::error::{EngineError, EngineResult};
use crate::live::messages::{
    self, FunctionResponse, GenerationConfig, PrebuiltVoiceConfig, ServerEvent, SetupMessage,
    SetupPayload, SpeechConfig, SystemInstruction, TextPart, ToolDeclaration, ToolGroup,
    TranscriptionSetting, VoiceConfig,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

/// Default live endpoint of the remote service.
pub const DEFAULT_LIVE_URL: &str =
    "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

const SETUP_TIMEOUT: Duration = Duration::from_secs(15);
const OUTBOUND_QUEUE: usize = 256;
const EVENT_QUEUE: usize = 256;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;
type WsSource = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Connection settings for one session.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket endpoint (API key appended as a query parameter).
    pub url: String,
    pub api_key: String,
    pub model: String,
    /// Prebuilt voice name; server default when `None`.
    pub voice: Option<String>,
    /// Opaque system prompt forwarded verbatim.
    pub system_instruction: Option<String>,
    /// Capture sample rate, advertised in audio MIME types.
    pub input_sample_rate: u32,
    /// Tools offered to the model.
    pub tools: Vec<ToolDeclaration>,
}

/// Message kinds the engine sends over the channel.
#[derive(Debug)]
pub enum Outbound {
    /// Encoded PCM from the microphone.
    Audio(Vec<u8>),
    /// A completed user text turn.
    Text(String),
    /// Correlated answer to a tool call.
    ToolResponse(FunctionResponse),
    /// Graceful close.
    Close,
}

/// A connected duplex channel. Dropping it without `close` leaves the close
/// frame to the server; the loops end either way once the socket goes.
pub struct LiveChannel {
    outbound_tx: mpsc::Sender<Outbound>,
    event_rx: Option<mpsc::Receiver<ServerEvent>>,
    session_id: String,
}

impl LiveChannel {
    /// Open the socket, run the setup handshake and spawn the I/O loops.
    ///
    /// Fails with a fatal session error when the socket cannot be opened or
    /// the server does not acknowledge setup within the timeout.
    pub async fn connect(session_id: String, config: ChannelConfig) -> EngineResult<Self> {
        let url = format!("{}?key={}", config.url, config.api_key);

        info!(session_id = %session_id, model = %config.model, "connecting live channel");

        let (mut socket, _response) = tokio_tungstenite::connect_async(&url)
            .await
            .map_err(|err| EngineError::Connect(err.to_string()))?;

        let setup = build_setup(&config);
        let setup_json = serde_json::to_string(&setup)
            .map_err(|err| EngineError::Connect(format!("setup serialization: {err}")))?;
        socket
            .send(WsMessage::Text(setup_json))
            .await
            .map_err(|err| EngineError::Connect(format!("setup send: {err}")))?;

        wait_for_setup_complete(&mut socket, &session_id).await?;

        let (sink, source) = socket.split();
        let (outbound_tx, outbound_rx) = mpsc::channel::<Outbound>(OUTBOUND_QUEUE);
        let (event_tx, event_rx) = mpsc::channel::<ServerEvent>(EVENT_QUEUE);

        let sid = session_id.clone();
        let input_rate = config.input_sample_rate;
        tokio::spawn(async move {
            outbound_loop(outbound_rx, sink, input_rate, sid).await;
        });

        let sid = session_id.clone();
        tokio::spawn(async move {
            inbound_loop(source, event_tx, sid).await;
        });

        Ok(Self {
            outbound_tx,
            event_rx: Some(event_rx),
            session_id,
        })
    }

    /// The receiver of parsed server events. Yields `None` on second call.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::Receiver<ServerEvent>> {
        self.event_rx.take()
    }

    /// A sender for the outbound path, cloneable across tasks.
    pub fn sender(&self) -> mpsc::Sender<Outbound> {
        self.outbound_tx.clone()
    }

    /// Request a graceful close. Idempotent; a closed channel ignores it.
    pub async fn close(&self) {
        let _ = self.outbound_tx.send(Outbound::Close).await;
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

fn build_setup(config: &ChannelConfig) -> SetupMessage {
    let tools = if config.tools.is_empty() {
        Vec::new()
    } else {
        vec![ToolGroup {
            function_declarations: config.tools.clone(),
        }]
    };

    SetupMessage {
        setup: SetupPayload {
            model: config.model.clone(),
            generation_config: GenerationConfig {
                response_modalities: vec!["AUDIO".to_string()],
                speech_config: config.voice.as_ref().map(|voice| SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice.clone(),
                        },
                    },
                }),
            },
            system_instruction: config.system_instruction.as_ref().map(|text| {
                SystemInstruction {
                    parts: vec![TextPart { text: text.clone() }],
                }
            }),
            tools,
            input_audio_transcription: TranscriptionSetting::default(),
            output_audio_transcription: TranscriptionSetting::default(),
        },
    }
}

/// Scan frames until the server acknowledges setup. The server sends JSON in
/// Binary frames as well as Text, so both are checked.
async fn wait_for_setup_complete(
    socket: &mut WebSocketStream<MaybeTlsStream<TcpStream>>,
    session_id: &str,
) -> EngineResult<()> {
    let handshake = tokio::time::timeout(SETUP_TIMEOUT, async {
        while let Some(frame) = socket.next().await {
            let frame = frame.map_err(|err| EngineError::Connect(err.to_string()))?;
            let text = match &frame {
                WsMessage::Text(text) => text.clone(),
                WsMessage::Binary(data) if data.first() == Some(&b'{') => {
                    String::from_utf8_lossy(data).into_owned()
                }
                WsMessage::Close(frame) => {
                    return Err(EngineError::Connect(format!(
                        "closed before setup completed: {frame:?}"
                    )));
                }
                _ => continue,
            };
            for event in messages::parse_server_message(&text) {
                match event {
                    ServerEvent::SetupComplete => {
                        info!(session_id = %session_id, "live channel ready");
                        return Ok(());
                    }
                    ServerEvent::Error { message } => {
                        return Err(EngineError::Connect(message));
                    }
                    other => debug!(session_id = %session_id, event = ?other, "pre-setup event ignored"),
                }
            }
        }
        Err(EngineError::Connect(
            "stream ended before setup completed".to_string(),
        ))
    })
    .await;

    match handshake {
        Ok(result) => result,
        Err(_) => Err(EngineError::Connect(format!(
            "no setup acknowledgement within {}s",
            SETUP_TIMEOUT.as_secs()
        ))),
    }
}

async fn outbound_loop(
    mut outbound_rx: mpsc::Receiver<Outbound>,
    mut sink: WsSink,
    input_sample_rate: u32,
    session_id: String,
) {
    while let Some(message) = outbound_rx.recv().await {
        let frame = match message {
            Outbound::Audio(pcm) => {
                serde_json::to_string(&messages::build_audio_message(&pcm, input_sample_rate))
            }
            Outbound::Text(text) => serde_json::to_string(&messages::build_text_message(&text)),
            Outbound::ToolResponse(response) => {
                serde_json::to_string(&messages::build_tool_response(response))
            }
            Outbound::Close => {
                let _ = sink.send(WsMessage::Close(None)).await;
                break;
            }
        };

        let json = match frame {
            Ok(json) => json,
            Err(err) => {
                error!(session_id = %session_id, "outbound serialization failed: {err}");
                continue;
            }
        };

        if sink.send(WsMessage::Text(json)).await.is_err() {
            warn!(session_id = %session_id, "socket send failed, ending outbound loop");
            break;
        }
    }

    debug!(session_id = %session_id, "outbound loop ended");
}

async fn inbound_loop(mut source: WsSource, event_tx: mpsc::Sender<ServerEvent>, session_id: String) {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                if forward_events(&text, &event_tx).await.is_err() {
                    return;
                }
            }
            Ok(WsMessage::Binary(data)) => {
                // JSON arrives in Binary frames too; anything else is noise.
                if data.first() == Some(&b'{') {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    if forward_events(&text, &event_tx).await.is_err() {
                        return;
                    }
                } else if !data.is_empty() {
                    warn!(
                        session_id = %session_id,
                        len = data.len(),
                        "unexpected non-JSON binary frame, skipping"
                    );
                }
            }
            Ok(WsMessage::Close(frame)) => {
                info!(session_id = %session_id, close_frame = ?frame, "server closed the channel");
                break;
            }
            Ok(WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_)) => {}
            Err(err) => {
                error!(session_id = %session_id, "socket error: {err}");
                let _ = event_tx
                    .send(ServerEvent::Error {
                        message: format!("channel error: {err}"),
                    })
                    .await;
                break;
            }
        }
    }

    let _ = event_tx.send(ServerEvent::Closed).await;
    debug!(session_id = %session_id, "inbound loop ended");
}

async fn forward_events(raw: &str, event_tx: &mpsc::Sender<ServerEvent>) -> Result<(), ()> {
    for event in messages::parse_server_message(raw) {
        if event_tx.send(event).await.is_err() {
            // Receiver gone: the session has moved on.
            return Err(());
        }
    }
    Ok(())
}
