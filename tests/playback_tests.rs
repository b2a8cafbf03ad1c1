// Unit tests for the playback scheduler
//
// These drive the headless render path with explicit frame counts, so the
// gapless and barge-in properties are checked as exact integer equalities on
// the frame clock. No audio hardware involved.

use tokio::sync::mpsc;
use vocalis::{AudioChunk, PlaybackEvent, PlaybackScheduler};

const RATE: u32 = 24000;

fn scheduler() -> (PlaybackScheduler, mpsc::UnboundedReceiver<PlaybackEvent>) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    (PlaybackScheduler::headless(RATE, events_tx), events_rx)
}

fn chunk(level: f32, frames: usize) -> AudioChunk {
    AudioChunk {
        samples: vec![level; frames],
        sample_rate: RATE,
        channels: 1,
    }
}

#[test]
fn test_buffers_schedule_back_to_back() {
    let (scheduler, _events) = scheduler();

    // Two half-second fragments, 12000 frames each.
    scheduler.enqueue(chunk(0.5, 12000));
    assert_eq!(scheduler.next_start(), 12000);

    scheduler.enqueue(chunk(-0.25, 12000));
    assert_eq!(scheduler.next_start(), 24000, "no gap, no overlap");

    // Render across the boundary: fragment two starts exactly where
    // fragment one ends.
    let mut out = vec![0.0f32; 24000];
    scheduler.render(&mut out);
    assert!((out[11999] - 0.5).abs() < f32::EPSILON);
    assert!((out[12000] + 0.25).abs() < f32::EPSILON);
    assert_eq!(scheduler.live_count(), 0);
}

#[test]
fn test_late_arrival_schedules_after_previous_buffer() {
    let (scheduler, _events) = scheduler();

    scheduler.enqueue(chunk(0.5, 12000));

    // Playback has consumed 6000 frames when the next fragment arrives;
    // it must still start at frame 12000, not at "now".
    let mut out = vec![0.0f32; 6000];
    scheduler.render(&mut out);
    scheduler.enqueue(chunk(0.25, 12000));
    assert_eq!(scheduler.next_start(), 24000);
    assert_eq!(scheduler.live_count(), 2);
}

#[test]
fn test_enqueue_after_drain_starts_at_clock() {
    let (scheduler, _events) = scheduler();

    scheduler.enqueue(chunk(0.5, 1000));
    let mut out = vec![0.0f32; 5000];
    scheduler.render(&mut out);
    assert_eq!(scheduler.live_count(), 0);
    assert_eq!(scheduler.frames_elapsed(), 5000);

    // A buffer arriving after the queue drained must never be scheduled
    // into the past.
    scheduler.enqueue(chunk(0.5, 1000));
    assert_eq!(scheduler.next_start(), 6000);

    let mut out = vec![0.0f32; 1];
    scheduler.render(&mut out);
    assert!((out[0] - 0.5).abs() < f32::EPSILON, "plays immediately");
}

#[test]
fn test_interrupt_clears_live_set_and_rebases_clock() {
    let (scheduler, _events) = scheduler();

    scheduler.enqueue(chunk(0.5, 12000));
    scheduler.enqueue(chunk(0.5, 12000));

    let mut out = vec![0.0f32; 3000];
    scheduler.render(&mut out);
    assert_eq!(scheduler.live_count(), 2);

    scheduler.interrupt();
    assert_eq!(scheduler.live_count(), 0);
    assert!(scheduler.next_start() <= scheduler.frames_elapsed());
    assert_eq!(scheduler.next_start(), 3000);

    // Nothing left to play.
    let mut out = vec![0.0f32; 100];
    scheduler.render(&mut out);
    assert!(out.iter().all(|s| *s == 0.0));

    // Resumption schedules at the clock, never earlier.
    scheduler.enqueue(chunk(0.25, 100));
    assert!(scheduler.next_start() >= scheduler.frames_elapsed());
    assert_eq!(scheduler.next_start(), 3100 + 100);
}

#[test]
fn test_speaking_events_track_the_live_set() {
    let (scheduler, mut events) = scheduler();

    scheduler.enqueue(chunk(0.5, 100));
    assert_eq!(events.try_recv().unwrap(), PlaybackEvent::Started);

    // A second buffer while busy is not a new start.
    scheduler.enqueue(chunk(0.5, 100));
    assert!(events.try_recv().is_err());

    let mut out = vec![0.0f32; 200];
    scheduler.render(&mut out);
    assert_eq!(events.try_recv().unwrap(), PlaybackEvent::Finished);

    // Quiet period over: the next enqueue reports speaking again.
    scheduler.enqueue(chunk(0.5, 100));
    assert_eq!(events.try_recv().unwrap(), PlaybackEvent::Started);
}

#[test]
fn test_interrupt_reports_finished_synchronously() {
    let (scheduler, mut events) = scheduler();

    scheduler.enqueue(chunk(0.5, 12000));
    assert_eq!(events.try_recv().unwrap(), PlaybackEvent::Started);

    scheduler.interrupt();
    assert_eq!(events.try_recv().unwrap(), PlaybackEvent::Finished);

    // Interrupting an already-quiet scheduler reports nothing new.
    scheduler.interrupt();
    assert!(events.try_recv().is_err());
}

#[test]
fn test_shutdown_is_idempotent() {
    let (scheduler, mut events) = scheduler();

    scheduler.enqueue(chunk(0.5, 500));
    scheduler.shutdown();
    scheduler.shutdown();

    assert_eq!(scheduler.live_count(), 0);
    assert_eq!(events.try_recv().unwrap(), PlaybackEvent::Started);
    assert_eq!(events.try_recv().unwrap(), PlaybackEvent::Finished);
    assert!(events.try_recv().is_err());
}

#[test]
fn test_empty_chunk_is_ignored() {
    let (scheduler, mut events) = scheduler();

    scheduler.enqueue(chunk(0.5, 0));
    assert_eq!(scheduler.live_count(), 0);
    assert_eq!(scheduler.next_start(), 0);
    assert!(events.try_recv().is_err());
}
