// Unit tests for turn-scoped transcript assembly

use vocalis::session::{Role, TurnTranscript};

#[test]
fn test_interleaved_deltas_flush_deterministically() {
    let mut turn = TurnTranscript::new();
    turn.append(Role::User, "A");
    turn.append(Role::Assistant, "B");
    turn.append(Role::User, "C");

    let entries = turn.flush();
    assert_eq!(entries.len(), 2);

    // User before assistant, regardless of delta arrival order.
    assert_eq!(entries[0].role, Role::User);
    assert_eq!(entries[0].text, "AC");
    assert_eq!(entries[1].role, Role::Assistant);
    assert_eq!(entries[1].text, "B");

    assert!(turn.is_empty(), "accumulators clear after flush");
}

#[test]
fn test_silent_side_emits_nothing() {
    let mut turn = TurnTranscript::new();
    turn.append(Role::Assistant, "only the assistant spoke");

    let entries = turn.flush();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].role, Role::Assistant);
}

#[test]
fn test_empty_turn_flushes_to_nothing() {
    let mut turn = TurnTranscript::new();
    assert!(turn.flush().is_empty());
    assert!(turn.is_empty());
}

#[test]
fn test_whitespace_only_accumulator_is_not_an_entry() {
    let mut turn = TurnTranscript::new();
    turn.append(Role::User, "   ");
    turn.append(Role::Assistant, "\n");

    // An entry is never emitted with empty text.
    assert!(turn.flush().is_empty());
    assert!(turn.is_empty(), "cleared even when nothing was emitted");
}

#[test]
fn test_flush_trims_but_preserves_interior_whitespace() {
    let mut turn = TurnTranscript::new();
    turn.append(Role::User, " hello ");
    turn.append(Role::User, "there ");

    let entries = turn.flush();
    assert_eq!(entries[0].text, "hello there");
}

#[test]
fn test_consecutive_turns_are_independent() {
    let mut turn = TurnTranscript::new();
    turn.append(Role::User, "first");
    let first = turn.flush();

    turn.append(Role::User, "second");
    let second = turn.flush();

    assert_eq!(first[0].text, "first");
    assert_eq!(second[0].text, "second");
    assert!(second[0].timestamp >= first[0].timestamp);
}
