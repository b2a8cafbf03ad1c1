// Unit tests for the session state machine
//
// These cover the transitions that need no audio hardware or network: state
// guards, idempotent stop and the observable snapshot. The connected paths
// are exercised against a real backend.

use vocalis::config::{AudioSettings, LiveConfig};
use vocalis::{EngineError, SessionStatus, ToolFailurePolicy, ToolRegistry, VoiceSession};

fn engine() -> VoiceSession {
    VoiceSession::new(
        LiveConfig::default(),
        AudioSettings::default(),
        ToolFailurePolicy::default(),
        ToolRegistry::new(),
    )
}

#[tokio::test]
async fn test_new_session_is_disconnected() {
    let session = engine();
    assert_eq!(session.status().await, SessionStatus::Disconnected);

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.status, "disconnected");
    assert!(snapshot.error.is_none());
    assert!(!snapshot.user_speaking);
    assert!(!snapshot.assistant_speaking);
    assert!(!snapshot.tool_processing);
    assert_eq!(snapshot.transcript_entries, 0);
    assert!(snapshot.last_tool_payload.is_none());
}

#[tokio::test]
async fn test_send_text_requires_connected() {
    let session = engine();

    let result = session.send_text("hello").await;
    match result {
        Err(EngineError::InvalidState { expected, actual }) => {
            assert_eq!(expected, "connected");
            assert_eq!(actual, "disconnected");
        }
        other => panic!("expected InvalidState, got {other:?}"),
    }

    assert!(session.transcript().await.is_empty(), "no entry on refusal");
}

#[tokio::test]
async fn test_stop_is_idempotent_on_disconnected_session() {
    let session = engine();

    session.stop().await;
    session.stop().await;

    assert_eq!(session.status().await, SessionStatus::Disconnected);
    let snapshot = session.snapshot().await;
    assert!(!snapshot.user_speaking);
    assert!(!snapshot.assistant_speaking);
}

#[tokio::test]
async fn test_transcript_starts_empty() {
    let session = engine();
    assert!(session.transcript().await.is_empty());
}

#[test]
fn test_status_names_for_presentation() {
    assert_eq!(SessionStatus::Disconnected.name(), "disconnected");
    assert_eq!(SessionStatus::Connecting.name(), "connecting");
    assert_eq!(SessionStatus::Connected.name(), "connected");
    assert_eq!(SessionStatus::Error("boom".to_string()).name(), "error");
}
