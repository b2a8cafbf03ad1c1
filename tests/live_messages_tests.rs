// Unit tests for the live-channel wire format

use base64::Engine;
use vocalis::live::messages::{
    build_audio_message, build_text_message, build_tool_response, parse_server_message,
    rate_from_mime,
};
use vocalis::{FunctionResponse, ServerEvent};

#[test]
fn test_audio_message_wraps_base64_pcm() {
    let pcm = vec![0u8, 1, 2, 3, 4, 5];
    let message = build_audio_message(&pcm, 16000);
    let json = serde_json::to_string(&message).unwrap();

    assert!(json.contains("realtimeInput"));
    assert!(json.contains("audio/pcm;rate=16000"));

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(&message.realtime_input.audio.data)
        .unwrap();
    assert_eq!(decoded, pcm);
}

#[test]
fn test_text_message_is_a_completed_user_turn() {
    let json = serde_json::to_string(&build_text_message("hello")).unwrap();

    assert!(json.contains("clientContent"));
    assert!(json.contains("\"turnComplete\":true"));
    assert!(json.contains("\"role\":\"user\""));
    assert!(json.contains("hello"));
}

#[test]
fn test_tool_response_echoes_the_call_id() {
    let message = build_tool_response(FunctionResponse {
        id: "fc-17".to_string(),
        name: "book_appointment".to_string(),
        response: serde_json::json!({ "status": "success" }),
    });
    let json = serde_json::to_string(&message).unwrap();

    assert!(json.contains("toolResponse"));
    assert!(json.contains("functionResponses"));
    assert!(json.contains("fc-17"));
    assert!(json.contains("book_appointment"));
}

#[test]
fn test_rate_from_mime() {
    assert_eq!(rate_from_mime("audio/pcm;rate=24000"), Some(24000));
    assert_eq!(rate_from_mime("audio/pcm; rate=16000"), Some(16000));
    assert_eq!(rate_from_mime("audio/pcm"), None);
    assert_eq!(rate_from_mime("audio/pcm;rate=banana"), None);
}

#[test]
fn test_parse_setup_complete() {
    let events = parse_server_message(r#"{"setupComplete": {}}"#);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ServerEvent::SetupComplete));
}

#[test]
fn test_parse_audio_part() {
    let data = base64::engine::general_purpose::STANDARD.encode([10u8, 20, 30, 40]);
    let raw = format!(
        r#"{{"serverContent":{{"modelTurn":{{"parts":[{{"inlineData":{{"mimeType":"audio/pcm;rate=24000","data":"{data}"}}}}]}}}}}}"#
    );

    let events = parse_server_message(&raw);
    match &events[0] {
        ServerEvent::Audio { data, mime_type } => {
            assert_eq!(data, &[10u8, 20, 30, 40]);
            assert_eq!(rate_from_mime(mime_type), Some(24000));
        }
        other => panic!("expected audio event, got {other:?}"),
    }
}

#[test]
fn test_parse_transcriptions_under_server_content() {
    let raw = r#"{"serverContent":{"inputTranscription":{"text":"hi "},"outputTranscription":{"text":"hello"}}}"#;
    let events = parse_server_message(raw);

    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::InputTranscript { text } if text == "hi ")));
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::OutputTranscript { text } if text == "hello")));
}

#[test]
fn test_parse_top_level_transcription_fallback() {
    let events = parse_server_message(r#"{"inputTranscription":{"text":"hola"}}"#);
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::InputTranscript { text } if text == "hola")));
}

#[test]
fn test_parse_empty_transcription_is_ignored() {
    let events = parse_server_message(r#"{"outputTranscription":{"text":""}}"#);
    assert!(events.is_empty());
}

#[test]
fn test_parse_turn_complete_and_interrupted() {
    let events = parse_server_message(r#"{"serverContent":{"turnComplete":true}}"#);
    assert!(events.iter().any(|e| matches!(e, ServerEvent::TurnComplete)));

    let events = parse_server_message(r#"{"serverContent":{"interrupted":true}}"#);
    assert!(events.iter().any(|e| matches!(e, ServerEvent::Interrupted)));
}

#[test]
fn test_parse_tool_call_with_args() {
    let raw = r#"{"toolCall":{"functionCalls":[{"id":"fc-1","name":"book_appointment","args":{"service":"dental","time":"tomorrow 9am"}}]}}"#;
    let events = parse_server_message(raw);

    match &events[0] {
        ServerEvent::ToolCall { calls } => {
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].id, "fc-1");
            assert_eq!(calls[0].name, "book_appointment");
            assert_eq!(calls[0].args["service"], "dental");
        }
        other => panic!("expected tool call, got {other:?}"),
    }
}

#[test]
fn test_parse_tool_call_without_args_defaults_to_empty_object() {
    let raw = r#"{"toolCall":{"functionCalls":[{"id":"fc-2","name":"ping"}]}}"#;
    let events = parse_server_message(raw);

    match &events[0] {
        ServerEvent::ToolCall { calls } => {
            assert!(calls[0].args.as_object().unwrap().is_empty());
        }
        other => panic!("expected tool call, got {other:?}"),
    }
}

#[test]
fn test_parse_server_error() {
    let events = parse_server_message(r#"{"error":{"message":"quota exceeded"}}"#);
    assert!(events
        .iter()
        .any(|e| matches!(e, ServerEvent::Error { message } if message.contains("quota"))));
}

#[test]
fn test_parse_go_away() {
    let events = parse_server_message(r#"{"goAway":{"timeLeft":"10s"}}"#);
    assert!(events.iter().any(|e| matches!(e, ServerEvent::GoAway)));
}

#[test]
fn test_unparseable_frame_becomes_error_event() {
    let events = parse_server_message("definitely not json");
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], ServerEvent::Error { .. }));
}

#[test]
fn test_one_frame_can_carry_many_events() {
    let data = base64::engine::general_purpose::STANDARD.encode([1u8, 2]);
    let raw = format!(
        r#"{{"serverContent":{{"modelTurn":{{"parts":[{{"inlineData":{{"mimeType":"audio/pcm;rate=24000","data":"{data}"}}}}]}},"outputTranscription":{{"text":"hey"}},"turnComplete":true}}}}"#
    );

    let events = parse_server_message(&raw);
    assert_eq!(events.len(), 3);
    // Arrival order is preserved: audio, then the delta, then the flush
    // signal.
    assert!(matches!(events[0], ServerEvent::Audio { .. }));
    assert!(matches!(events[1], ServerEvent::OutputTranscript { .. }));
    assert!(matches!(events[2], ServerEvent::TurnComplete));
}
