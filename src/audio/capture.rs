//! Microphone capture: fixed-size blocks, activity signal, encoded handoff.
//!
//! The cpal input stream is owned by a dedicated thread because `cpal::Stream`
//! is not `Send`. Dropping the `CaptureHandle` (or calling `stop`) releases
//! the stream, so no callback outlives session teardown.

use crate::audio::codec;
use crate::error::{EngineError, EngineResult};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use std::thread;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// Decides whether a captured block contains user speech.
///
/// Kept behind a trait so the amplitude-threshold heuristic can be swapped
/// for real VAD without touching the capture plumbing.
pub trait ActivityDetector: Send {
    fn is_active(&mut self, samples: &[f32]) -> bool;
}

/// Peak-amplitude threshold detector.
///
/// A cheap proxy for voice activity detection: ambient noise can trip it and
/// soft speech can slip under it. Both are acceptable here.
#[derive(Debug, Clone)]
pub struct PeakActivity {
    pub threshold: f32,
}

impl PeakActivity {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for PeakActivity {
    fn default() -> Self {
        Self { threshold: 0.05 }
    }
}

impl ActivityDetector for PeakActivity {
    fn is_active(&mut self, samples: &[f32]) -> bool {
        let peak = samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()));
        peak > self.threshold
    }
}

/// One encoded block from the microphone plus its activity signal.
#[derive(Debug)]
pub struct CapturedBlock {
    /// 16-bit little-endian PCM, ready for the outbound path.
    pub pcm: Vec<u8>,
    /// Whether the block crossed the activity threshold.
    pub speaking: bool,
}

/// Capture configuration.
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Sample rate in Hz (default: 16000).
    pub sample_rate: u32,
    /// Number of channels (default: 1 for mono).
    pub channels: u16,
    /// Samples per delivered block (default: 4096).
    pub block_size: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            block_size: 4096,
        }
    }
}

/// Microphone capture for one session.
pub struct AudioCapture;

impl AudioCapture {
    /// Open the default input device and stream fixed-size encoded blocks to
    /// `block_tx` until the returned handle is stopped or dropped.
    ///
    /// Device and stream failures surface here as fatal session errors.
    pub fn start(
        config: CaptureConfig,
        mut detector: Box<dyn ActivityDetector>,
        block_tx: mpsc::UnboundedSender<CapturedBlock>,
    ) -> EngineResult<CaptureHandle> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| EngineError::AudioDevice("no input device available".to_string()))?;

        info!(
            "capture: using input device {} ({} Hz, {} ch, {}-sample blocks)",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            config.sample_rate,
            config.channels,
            config.block_size
        );

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: SampleRate(config.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let block_size = config.block_size;
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<EngineResult<()>>();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        // The stream lives on this thread for its whole life; the handle's
        // oneshot is the only way to end it.
        thread::spawn(move || {
            let mut pending: Vec<f32> = Vec::with_capacity(block_size);

            let built = device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    for &sample in data {
                        pending.push(sample);
                        if pending.len() >= block_size {
                            let speaking = detector.is_active(&pending);
                            let block = CapturedBlock {
                                pcm: codec::encode(&pending),
                                speaking,
                            };
                            // A closed receiver just means the session is
                            // tearing down; the stream goes away right after.
                            let _ = block_tx.send(block);
                            pending.clear();
                        }
                    }
                },
                |err| warn!("capture: stream error: {err}"),
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

            // Parked until the handle stops or drops.
            let _ = shutdown_rx.blocking_recv();
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(CaptureHandle {
                shutdown: Some(shutdown_tx),
            }),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(EngineError::AudioDevice(
                "capture thread exited before the stream started".to_string(),
            )),
        }
    }
}

/// Keeps the microphone stream alive. Stop (or drop) to release the device.
pub struct CaptureHandle {
    shutdown: Option<oneshot::Sender<()>>,
}

impl CaptureHandle {
    /// Release the input stream. Idempotent.
    pub fn stop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_config_defaults() {
        let config = CaptureConfig::default();
        assert_eq!(config.sample_rate, 16000);
        assert_eq!(config.channels, 1);
        assert_eq!(config.block_size, 4096);
    }

    #[test]
    fn peak_activity_threshold() {
        let mut detector = PeakActivity::default();
        assert!(!detector.is_active(&[0.0, 0.01, -0.04]));
        assert!(detector.is_active(&[0.0, 0.01, -0.2]));
    }
}
