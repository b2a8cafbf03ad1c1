//! Gapless playback scheduling with barge-in cancellation.
//!
//! The remote service delivers synthesized speech as many small fragments in
//! quick succession. Playing each at "now" would overlap and garble them, so
//! every buffer is scheduled to start exactly where the previous one ends:
//! `start = max(next_start, frames_elapsed)`. That single rule is the
//! correctness core of the playback path.
//!
//! All scheduling state lives behind one mutex so `enqueue`, `interrupt` and
//! the render callback never observe a half-updated live set. The clock is
//! integer output frames advanced only by the render path, which keeps the
//! gapless property an exact equality rather than a float comparison.

use crate::audio::codec::AudioChunk;
use crate::error::{EngineError, EngineResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Playback lifecycle notifications consumed by the session event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// First buffer scheduled after a quiet period: the assistant is speaking.
    Started,
    /// The live set drained or was cancelled: the assistant went quiet.
    Finished,
}

/// One scheduled buffer: samples plus its slot on the frame clock.
struct Scheduled {
    samples: Vec<f32>,
    start: u64,
    cursor: usize,
}

struct SchedulerState {
    /// Frames rendered so far; the output clock.
    frames_elapsed: u64,
    /// Where the next enqueued buffer begins.
    next_start: u64,
    /// Buffers playing or pending, not yet completed or cancelled.
    live: Vec<Scheduled>,
    events: mpsc::UnboundedSender<PlaybackEvent>,
}

impl SchedulerState {
    fn new(events: mpsc::UnboundedSender<PlaybackEvent>) -> Self {
        Self {
            frames_elapsed: 0,
            next_start: 0,
            live: Vec::new(),
            events,
        }
    }

    fn enqueue(&mut self, samples: Vec<f32>) {
        // Never schedule into the past, never leave a gap after the
        // previous buffer.
        let start = self.next_start.max(self.frames_elapsed);
        let was_idle = self.live.is_empty();

        self.next_start = start + samples.len() as u64;
        self.live.push(Scheduled {
            samples,
            start,
            cursor: 0,
        });

        if was_idle {
            let _ = self.events.send(PlaybackEvent::Started);
        }
    }

    fn interrupt(&mut self) {
        let had_live = !self.live.is_empty();
        self.live.clear();
        // Re-base to "now" so buffers enqueued after the barge-in are never
        // scheduled into the past.
        self.next_start = self.frames_elapsed;
        if had_live {
            let _ = self.events.send(PlaybackEvent::Finished);
        }
    }

    fn render(&mut self, out: &mut [f32]) {
        for value in out.iter_mut() {
            *value = 0.0;
        }

        let window_start = self.frames_elapsed;
        let window_end = window_start + out.len() as u64;

        for buffer in self.live.iter_mut() {
            let begin = buffer.start.max(window_start);
            if begin >= window_end {
                continue;
            }
            let offset = (begin - window_start) as usize;
            let remaining = buffer.samples.len() - buffer.cursor;
            let count = remaining.min(out.len() - offset);
            for i in 0..count {
                out[offset + i] += buffer.samples[buffer.cursor + i];
            }
            buffer.cursor += count;
        }

        self.frames_elapsed = window_end;

        let had_live = !self.live.is_empty();
        self.live.retain(|buffer| buffer.cursor < buffer.samples.len());
        if had_live && self.live.is_empty() {
            let _ = self.events.send(PlaybackEvent::Finished);
        }
    }
}

/// Schedules decoded audio buffers back-to-back on the output sink.
pub struct PlaybackScheduler {
    state: Arc<Mutex<SchedulerState>>,
    sample_rate: u32,
    shutdown: Mutex<Option<oneshot::Sender<()>>>,
}

impl PlaybackScheduler {
    /// Open the default output device at `sample_rate` (mono) and start the
    /// render stream. Device failures are fatal for the session.
    pub fn start(
        sample_rate: u32,
        events: mpsc::UnboundedSender<PlaybackEvent>,
    ) -> EngineResult<Self> {
        let state = Arc::new(Mutex::new(SchedulerState::new(events)));

        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| EngineError::AudioDevice("no output device available".to_string()))?;

        info!(
            "playback: using output device {} ({} Hz mono)",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate
        );

        let stream_config = StreamConfig {
            channels: 1,
            sample_rate: SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<EngineResult<()>>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let render_state = Arc::clone(&state);

        // The output stream is !Send, so it lives on its own thread just
        // like the capture stream.
        thread::spawn(move || {
            let built = device.build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut state = render_state
                        .lock()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    state.render(data);
                },
                |err| warn!("playback: stream error: {err}"),
                None,
            );

            let stream = match built {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = ready_tx.send(Err(EngineError::from(err)));
                    return;
                }
            };

            if let Err(err) = stream.play() {
                let _ = ready_tx.send(Err(EngineError::from(err)));
                return;
            }

            let _ = ready_tx.send(Ok(()));
            let _ = shutdown_rx.blocking_recv();
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                state,
                sample_rate,
                shutdown: Mutex::new(Some(shutdown_tx)),
            }),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(EngineError::AudioDevice(
                "playback thread exited before the stream started".to_string(),
            )),
        }
    }

    /// Build a scheduler with no output device. The caller drives `render`
    /// itself; used when running without audio hardware.
    pub fn headless(sample_rate: u32, events: mpsc::UnboundedSender<PlaybackEvent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SchedulerState::new(events))),
            sample_rate,
            shutdown: Mutex::new(None),
        }
    }

    /// Schedule a decoded chunk directly after the last scheduled buffer.
    /// Stereo chunks are downmixed; mono plays as-is.
    pub fn enqueue(&self, chunk: AudioChunk) {
        if chunk.samples.is_empty() {
            return;
        }
        if chunk.sample_rate != self.sample_rate {
            debug!(
                "playback: chunk rate {} differs from sink rate {}",
                chunk.sample_rate, self.sample_rate
            );
        }
        let samples = if chunk.channels == 2 {
            downmix_to_mono(&chunk.samples)
        } else {
            chunk.samples
        };
        self.lock_state().enqueue(samples);
    }

    /// Barge-in: stop every live buffer, clear the set, re-base the clock to
    /// "now". Safe to call at any time, including mid-enqueue.
    pub fn interrupt(&self) {
        self.lock_state().interrupt();
    }

    /// Interrupt plus release of the output sink. Idempotent.
    pub fn shutdown(&self) {
        self.interrupt();
        if let Ok(mut guard) = self.shutdown.lock() {
            if let Some(shutdown) = guard.take() {
                let _ = shutdown.send(());
            }
        }
    }

    /// Mix the next `out.len()` frames into `out` and advance the clock.
    /// Only meaningful for a headless scheduler; the device render path
    /// calls this internally otherwise.
    pub fn render(&self, out: &mut [f32]) {
        self.lock_state().render(out);
    }

    /// Number of buffers playing or pending.
    pub fn live_count(&self) -> usize {
        self.lock_state().live.len()
    }

    /// Current output clock in frames.
    pub fn frames_elapsed(&self) -> u64 {
        self.lock_state().frames_elapsed
    }

    /// Frame at which the next enqueued buffer would start.
    pub fn next_start(&self) -> u64 {
        self.lock_state().next_start
    }

    /// Sink sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn lock_state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sum interleaved stereo down to mono, clamped to [-1, 1].
fn downmix_to_mono(samples: &[f32]) -> Vec<f32> {
    samples
        .chunks_exact(2)
        .map(|pair| (pair[0] + pair[1]).clamp(-1.0, 1.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_sums_channels() {
        let mono = downmix_to_mono(&[0.25, 0.25, -0.9, -0.9]);
        assert_eq!(mono, vec![0.5, -1.0]);
    }
}
