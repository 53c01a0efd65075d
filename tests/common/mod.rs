//! Shared test utilities

use std::time::Instant;

use vesper::audio::{AudioFrame, FRAME_SIZE, SAMPLE_RATE};

/// Generate sine wave audio samples as i16 PCM
#[must_use]
pub fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<i16> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            let s = amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin();
            (s * 32767.0) as i16
        })
        .collect()
}

/// Generate silence as i16 PCM
#[must_use]
pub fn generate_silence(duration_secs: f32) -> Vec<i16> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0; num_samples]
}

/// Slice samples into sequence-numbered frames, padding the tail with zeros
#[must_use]
pub fn frames_from_samples(samples: &[i16], start_seq: u64) -> Vec<AudioFrame> {
    samples
        .chunks(FRAME_SIZE)
        .enumerate()
        .map(|(i, chunk)| {
            let mut frame_samples = chunk.to_vec();
            frame_samples.resize(FRAME_SIZE, 0);
            AudioFrame {
                samples: frame_samples,
                seq: start_seq + i as u64,
                captured_at: Instant::now(),
            }
        })
        .collect()
}
