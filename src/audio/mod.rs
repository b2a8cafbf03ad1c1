pub mod capture;
pub mod codec;
pub mod playback;

pub use capture::{
    ActivityDetector, AudioCapture, CaptureConfig, CaptureHandle, CapturedBlock, PeakActivity,
};
pub use codec::AudioChunk;
pub use playback::{PlaybackEvent, PlaybackScheduler};
