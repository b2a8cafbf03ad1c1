//! Wire types for the live session channel.
//!
//! The remote inference service speaks the bidirectional-generation WebSocket
//! protocol: a JSON `setup` frame first, then interleaved realtime audio,
//! client text turns and tool responses outbound; server content (audio
//! parts, transcription deltas, turn/interruption flags), tool calls and
//! lifecycle frames inbound. Servers deliver JSON in both Text and Binary
//! frames, so parsing is tolerant of either.

use base64::Engine;
use serde::{Deserialize, Serialize};

// ── Outbound messages ──────────────────────────────────────────────

/// First frame of a session: model, generation and transcription config,
/// system instruction and tool declarations.
#[derive(Debug, Serialize)]
pub struct SetupMessage {
    pub setup: SetupPayload,
}

#[derive(Debug, Serialize)]
pub struct SetupPayload {
    pub model: String,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolGroup>,
    #[serde(rename = "inputAudioTranscription")]
    pub input_audio_transcription: TranscriptionSetting,
    #[serde(rename = "outputAudioTranscription")]
    pub output_audio_transcription: TranscriptionSetting,
}

#[derive(Debug, Serialize)]
pub struct GenerationConfig {
    #[serde(rename = "responseModalities")]
    pub response_modalities: Vec<String>,
    #[serde(rename = "speechConfig", skip_serializing_if = "Option::is_none")]
    pub speech_config: Option<SpeechConfig>,
}

#[derive(Debug, Serialize)]
pub struct SpeechConfig {
    #[serde(rename = "voiceConfig")]
    pub voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
pub struct VoiceConfig {
    #[serde(rename = "prebuiltVoiceConfig")]
    pub prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Debug, Serialize)]
pub struct PrebuiltVoiceConfig {
    #[serde(rename = "voiceName")]
    pub voice_name: String,
}

#[derive(Debug, Serialize)]
pub struct SystemInstruction {
    pub parts: Vec<TextPart>,
}

#[derive(Debug, Serialize)]
pub struct TextPart {
    pub text: String,
}

/// Empty marker object: presence in setup enables the transcription stream.
#[derive(Debug, Default, Serialize)]
pub struct TranscriptionSetting {}

/// Wrapper the protocol expects around function declarations.
#[derive(Debug, Serialize)]
pub struct ToolGroup {
    #[serde(rename = "functionDeclarations")]
    pub function_declarations: Vec<ToolDeclaration>,
}

/// One callable tool offered to the model: name, description and a JSON
/// schema for its arguments. Opaque to the engine beyond the name.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Realtime audio input: one base64 PCM blob with its MIME type.
#[derive(Debug, Serialize)]
pub struct RealtimeInputMessage {
    #[serde(rename = "realtimeInput")]
    pub realtime_input: RealtimeInput,
}

#[derive(Debug, Serialize)]
pub struct RealtimeInput {
    pub audio: AudioBlob,
}

#[derive(Debug, Serialize)]
pub struct AudioBlob {
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

/// A completed user text turn.
#[derive(Debug, Serialize)]
pub struct ClientContentMessage {
    #[serde(rename = "clientContent")]
    pub client_content: ClientContent,
}

#[derive(Debug, Serialize)]
pub struct ClientContent {
    pub turns: Vec<ClientTurn>,
    #[serde(rename = "turnComplete")]
    pub turn_complete: bool,
}

#[derive(Debug, Serialize)]
pub struct ClientTurn {
    pub role: String,
    pub parts: Vec<TextPart>,
}

/// Correlated answer to a tool call; `id` echoes the server's request.
#[derive(Debug, Serialize)]
pub struct ToolResponseMessage {
    #[serde(rename = "toolResponse")]
    pub tool_response: ToolResponsePayload,
}

#[derive(Debug, Serialize)]
pub struct ToolResponsePayload {
    #[serde(rename = "functionResponses")]
    pub function_responses: Vec<FunctionResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionResponse {
    pub id: String,
    pub name: String,
    pub response: serde_json::Value,
}

// ── Builders ───────────────────────────────────────────────────────

pub fn audio_mime_type(sample_rate: u32) -> String {
    format!("audio/pcm;rate={sample_rate}")
}

/// Pull the sample rate out of a `audio/pcm;rate=24000` MIME type.
pub fn rate_from_mime(mime_type: &str) -> Option<u32> {
    mime_type
        .split(';')
        .filter_map(|part| part.trim().strip_prefix("rate="))
        .find_map(|rate| rate.parse().ok())
}

/// Wrap raw PCM bytes into a realtime input message.
pub fn build_audio_message(pcm: &[u8], sample_rate: u32) -> RealtimeInputMessage {
    RealtimeInputMessage {
        realtime_input: RealtimeInput {
            audio: AudioBlob {
                mime_type: audio_mime_type(sample_rate),
                data: base64::engine::general_purpose::STANDARD.encode(pcm),
            },
        },
    }
}

/// Wrap a text message into a completed user turn.
pub fn build_text_message(text: &str) -> ClientContentMessage {
    ClientContentMessage {
        client_content: ClientContent {
            turns: vec![ClientTurn {
                role: "user".to_string(),
                parts: vec![TextPart {
                    text: text.to_string(),
                }],
            }],
            turn_complete: true,
        },
    }
}

/// Wrap one correlated function response.
pub fn build_tool_response(response: FunctionResponse) -> ToolResponseMessage {
    ToolResponseMessage {
        tool_response: ToolResponsePayload {
            function_responses: vec![response],
        },
    }
}

// ── Inbound events ─────────────────────────────────────────────────

/// A structured function-call request from the model.
#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub id: String,
    pub name: String,
    pub args: serde_json::Value,
}

/// Parsed event from the remote service. One server frame can carry several.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// Setup acknowledged; the session is ready to stream.
    SetupComplete,
    /// Synthesized audio fragment.
    Audio { data: Vec<u8>, mime_type: String },
    /// Partial transcript of the user's speech.
    InputTranscript { text: String },
    /// Partial transcript of the assistant's speech.
    OutputTranscript { text: String },
    /// The model finished its response turn.
    TurnComplete,
    /// The model was cut off by user speech.
    Interrupted,
    /// The model wants one or more tools invoked.
    ToolCall { calls: Vec<FunctionCall> },
    /// The server announced it will drop the connection soon.
    GoAway,
    /// Server-reported error.
    Error { message: String },
    /// The channel closed. Emitted by the channel itself, never parsed.
    Closed,
}

/// Parse one JSON server frame into events.
///
/// Unknown fields are ignored; malformed JSON yields a single `Error` event
/// so the session can decide whether to keep going.
pub fn parse_server_message(raw: &str) -> Vec<ServerEvent> {
    let mut events = Vec::new();

    let value: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            events.push(ServerEvent::Error {
                message: format!("unparseable server frame: {err}"),
            });
            return events;
        }
    };

    if value.get("setupComplete").is_some() {
        events.push(ServerEvent::SetupComplete);
    }

    if let Some(content) = value.get("serverContent") {
        if let Some(parts) = content.pointer("/modelTurn/parts").and_then(|v| v.as_array()) {
            for part in parts {
                if let Some(inline) = part.get("inlineData") {
                    let data = inline.get("data").and_then(|v| v.as_str());
                    let mime = inline.get("mimeType").and_then(|v| v.as_str());
                    if let (Some(data), Some(mime)) = (data, mime) {
                        if let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(data) {
                            events.push(ServerEvent::Audio {
                                data: bytes,
                                mime_type: mime.to_string(),
                            });
                        }
                    }
                }
            }
        }

        push_transcript(content, "inputTranscription", &mut events, true);
        push_transcript(content, "outputTranscription", &mut events, false);

        if content.get("interrupted").and_then(|v| v.as_bool()) == Some(true) {
            events.push(ServerEvent::Interrupted);
        }
        if content.get("turnComplete").and_then(|v| v.as_bool()) == Some(true) {
            events.push(ServerEvent::TurnComplete);
        }
    }

    // Some server builds put transcription deltas at the top level.
    push_transcript(&value, "inputTranscription", &mut events, true);
    push_transcript(&value, "outputTranscription", &mut events, false);

    if let Some(calls) = value.pointer("/toolCall/functionCalls").and_then(|v| v.as_array()) {
        let calls: Vec<FunctionCall> = calls
            .iter()
            .filter_map(|call| {
                let name = call.get("name").and_then(|v| v.as_str())?;
                Some(FunctionCall {
                    id: call
                        .get("id")
                        .and_then(|v| v.as_str())
                        .unwrap_or_default()
                        .to_string(),
                    name: name.to_string(),
                    args: call.get("args").cloned().unwrap_or(serde_json::json!({})),
                })
            })
            .collect();
        if !calls.is_empty() {
            events.push(ServerEvent::ToolCall { calls });
        }
    }

    if value.get("goAway").is_some() {
        events.push(ServerEvent::GoAway);
    }

    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown server error");
        events.push(ServerEvent::Error {
            message: message.to_string(),
        });
    }

    events
}

fn push_transcript(
    value: &serde_json::Value,
    key: &str,
    events: &mut Vec<ServerEvent>,
    input: bool,
) {
    if let Some(text) = value
        .get(key)
        .and_then(|t| t.get("text"))
        .and_then(|v| v.as_str())
    {
        if text.is_empty() {
            return;
        }
        let text = text.to_string();
        events.push(if input {
            ServerEvent::InputTranscript { text }
        } else {
            ServerEvent::OutputTranscript { text }
        });
    }
}
