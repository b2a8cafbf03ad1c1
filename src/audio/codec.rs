//! Conversion between normalized float samples and 16-bit little-endian PCM.
//!
//! This is the only framing the engine does: the remote service accepts and
//! returns linear PCM with the sample rate carried out of band.

use crate::error::DecodeError;
use std::time::Duration;

/// Width of one encoded sample in bytes (16-bit PCM).
pub const SAMPLE_WIDTH: usize = 2;

/// An immutable buffer of linear PCM samples plus its format.
///
/// The sample rate is a property of the chunk, not a global constant:
/// capture produces 16 kHz mono while the remote service returns 24 kHz mono.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    /// Normalized samples in [-1.0, 1.0], interleaved if multi-channel.
    pub samples: Vec<f32>,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Number of channels (1 = mono).
    pub channels: u16,
}

impl AudioChunk {
    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Playback duration of this chunk.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }
}

/// Encode float samples to 16-bit little-endian PCM bytes.
///
/// Each sample maps to `round(sample * 32767)` clamped to the representable
/// range. An empty slice encodes to an empty buffer.
pub fn encode(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * SAMPLE_WIDTH);
    for &sample in samples {
        let value = (sample * 32767.0)
            .round()
            .clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Decode 16-bit little-endian PCM bytes back to normalized float samples.
///
/// Fails when the byte length is not a whole multiple of the sample width.
/// The caller treats that as a per-chunk error: drop the payload, keep the
/// stream going.
pub fn decode(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<AudioChunk, DecodeError> {
    if bytes.len() % SAMPLE_WIDTH != 0 {
        return Err(DecodeError::Misaligned {
            len: bytes.len(),
            width: SAMPLE_WIDTH,
        });
    }

    let samples = bytes
        .chunks_exact(SAMPLE_WIDTH)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32767.0)
        .collect();

    Ok(AudioChunk {
        samples,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_encodes_to_empty_buffer() {
        assert!(encode(&[]).is_empty());
    }

    #[test]
    fn chunk_duration_from_rate() {
        let chunk = AudioChunk {
            samples: vec![0.0; 12000],
            sample_rate: 24000,
            channels: 1,
        };
        assert_eq!(chunk.frames(), 12000);
        assert_eq!(chunk.duration(), Duration::from_millis(500));
    }
}
