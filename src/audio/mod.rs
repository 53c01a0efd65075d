//! Audio capture, playback, and PCM buffer types

mod capture;
mod playback;

pub use capture::AudioSource;
pub use playback::{PlaybackHandle, SpeechPlayer};

use std::time::Instant;

use crate::{Error, Result};

/// Sample rate for capture (16kHz for speech)
pub const SAMPLE_RATE: u32 = 16_000;

/// Default frame size in samples (100ms at 16kHz)
pub const FRAME_SIZE: usize = 1_600;

/// One fixed-size block of captured PCM audio
///
/// Immutable once created; tagged with a monotonic sequence number and
/// capture timestamp so ordering can be checked downstream.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Signed 16-bit mono samples, exactly one frame worth
    pub samples: Vec<i16>,
    /// Monotonic frame counter assigned by the capture callback
    pub seq: u64,
    /// When the frame was produced
    pub captured_at: Instant,
}

impl AudioFrame {
    /// RMS energy of the frame, normalized to [0.0, 1.0]
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn energy(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_squares: f32 = self
            .samples
            .iter()
            .map(|&s| {
                let f = f32::from(s) / 32768.0;
                f * f
            })
            .sum();
        (sum_squares / self.samples.len() as f32).sqrt()
    }
}

/// A speech segment bounded by detected onset and end-of-speech silence
///
/// Produced by the VAD, consumed (and discarded) by the transcriber.
#[derive(Debug, Clone)]
pub struct Utterance {
    /// Concatenated samples of every frame from onset through trailing silence
    pub samples: Vec<i16>,
    /// Number of frames the segment spans
    pub frames: usize,
    /// Sequence number of the first frame
    pub first_seq: u64,
    /// When the first frame was captured
    pub started_at: Instant,
}

impl Utterance {
    /// Duration of the utterance in seconds at the given sample rate
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self, sample_rate: u32) -> f32 {
        self.samples.len() as f32 / sample_rate as f32
    }
}

/// Encode i16 PCM samples as WAV bytes for the STT API
///
/// # Errors
///
/// Returns error if WAV encoding fails
pub fn samples_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).map_err(|e| Error::Audio(e.to_string()))?;

        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Audio(e.to_string()))?;
        }

        writer.finalize().map_err(|e| Error::Audio(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_energy_silence() {
        let frame = AudioFrame {
            samples: vec![0; 160],
            seq: 0,
            captured_at: Instant::now(),
        };
        assert!(frame.energy() < 0.001);
    }

    #[test]
    fn frame_energy_loud() {
        let frame = AudioFrame {
            samples: vec![16_000; 160],
            seq: 0,
            captured_at: Instant::now(),
        };
        assert!(frame.energy() > 0.4);
    }

    #[test]
    fn wav_header() {
        let samples = vec![0i16, 100, -100, 32_000];
        let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert!(wav.len() > 44);
    }
}
