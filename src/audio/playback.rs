//! Audio playback to speakers with barge-in cancellation
//!
//! Each playback request builds a fresh output stream inside a blocking
//! task, so the player is immediately reusable after a cancellation. The
//! cancel path is a single atomic store observed by the playback poll
//! loop; no lock is ever held across the device write.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Sample rate for playback (matches common TTS output)
const PLAYBACK_SAMPLE_RATE: u32 = 24_000;

/// How often the poll loop checks for completion or cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Shared playback state, cancellable from any thread
#[derive(Debug, Default)]
struct PlaybackShared {
    playing: AtomicBool,
    cancelled: AtomicBool,
}

/// Cloneable handle for observing and cancelling playback
#[derive(Debug, Clone, Default)]
pub struct PlaybackHandle {
    shared: Arc<PlaybackShared>,
}

impl PlaybackHandle {
    /// Check whether playback is currently in progress
    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Acquire)
    }

    /// Stop in-flight playback at the next poll tick
    ///
    /// Wait-free; a no-op when nothing is playing.
    pub fn cancel(&self) {
        if self.shared.playing.load(Ordering::Acquire) {
            self.shared.cancelled.store(true, Ordering::Release);
            tracing::debug!("playback cancellation requested");
        }
    }
}

#[cfg(test)]
impl PlaybackHandle {
    pub(crate) fn set_playing(&self, playing: bool) {
        self.shared.playing.store(playing, Ordering::Release);
    }

    pub(crate) fn was_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::Acquire)
    }
}

/// Plays synthesized speech to the default output device
pub struct SpeechPlayer {
    config: StreamConfig,
    handle: PlaybackHandle,
}

impl SpeechPlayer {
    /// Create a new player, probing the default output device
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if no suitable output device exists
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Device("no output device available".to_string()))?;

        let supported_config = device
            .supported_output_configs()
            .map_err(|e| Error::Device(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                    && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
            })
            .or_else(|| {
                // Fallback: try stereo
                device.supported_output_configs().ok()?.find(|c| {
                    c.channels() == 2
                        && c.min_sample_rate() <= SampleRate(PLAYBACK_SAMPLE_RATE)
                        && c.max_sample_rate() >= SampleRate(PLAYBACK_SAMPLE_RATE)
                })
            })
            .ok_or_else(|| Error::Device("no suitable output config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(PLAYBACK_SAMPLE_RATE))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = PLAYBACK_SAMPLE_RATE,
            channels = config.channels,
            "audio playback initialized"
        );

        Ok(Self {
            config,
            handle: PlaybackHandle::default(),
        })
    }

    /// Get a handle for cancelling playback from other tasks
    #[must_use]
    pub fn handle(&self) -> PlaybackHandle {
        self.handle.clone()
    }

    /// Play MP3 audio, returning when playback completes or is cancelled
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails
    pub async fn play_mp3(&self, mp3_data: Vec<u8>) -> Result<()> {
        let samples = decode_mp3(&mp3_data)?;
        self.play(samples).await
    }

    /// Play f32 samples, returning when playback completes or is cancelled
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    pub async fn play(&self, samples: Vec<f32>) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let shared = Arc::clone(&self.handle.shared);
        shared.cancelled.store(false, Ordering::Release);
        shared.playing.store(true, Ordering::Release);

        let config = self.config.clone();
        let result = tokio::task::spawn_blocking(move || {
            let result = play_samples_blocking(&config, samples, &shared);
            shared.playing.store(false, Ordering::Release);
            result
        })
        .await
        .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?;

        result
    }
}

/// Play samples on a fresh output stream, polling for cancellation
fn play_samples_blocking(
    config: &StreamConfig,
    samples: Vec<f32>,
    shared: &Arc<PlaybackShared>,
) -> Result<()> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::Device("no output device".to_string()))?;

    let channels = config.channels as usize;
    let sample_count = samples.len();

    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let position_cb = Arc::clone(&position);
    let finished_cb = Arc::clone(&finished);

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                let mut pos = position_cb.load(Ordering::Relaxed);

                for frame in data.chunks_mut(channels) {
                    let sample = if pos < samples.len() {
                        let s = samples[pos];
                        pos += 1;
                        s
                    } else {
                        finished_cb.store(true, Ordering::Release);
                        0.0
                    };

                    for out in frame.iter_mut() {
                        *out = sample;
                    }
                }

                position_cb.store(pos, Ordering::Relaxed);
            },
            |err| {
                tracing::error!(error = %err, "audio playback error");
            },
            None,
        )
        .map_err(|e| Error::Device(e.to_string()))?;

    stream.play().map_err(|e| Error::Device(e.to_string()))?;

    let duration_ms = (sample_count as u64 * 1000) / u64::from(PLAYBACK_SAMPLE_RATE);
    let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

    while !finished.load(Ordering::Acquire) {
        if shared.cancelled.load(Ordering::Acquire) {
            tracing::info!("playback cancelled");
            drop(stream);
            return Ok(());
        }
        if Instant::now() > deadline {
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    // Let the tail of the buffer drain
    std::thread::sleep(Duration::from_millis(100));

    drop(stream);
    tracing::debug!(samples = sample_count, "playback complete");

    Ok(())
}

/// Decode MP3 bytes to f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<Vec<f32>> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let frame_samples: Vec<f32> = if frame.channels == 2 {
                    // Stereo: average channels
                    frame
                        .data
                        .chunks(2)
                        .map(|chunk| {
                            let left = f32::from(chunk[0]) / 32768.0;
                            let right =
                                f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                            f32::midpoint(left, right)
                        })
                        .collect()
                } else {
                    frame.data.iter().map(|&s| f32::from(s) / 32768.0).collect()
                };

                samples.extend(frame_samples);
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_when_idle_is_noop() {
        let handle = PlaybackHandle::default();
        assert!(!handle.is_playing());

        handle.cancel();
        handle.cancel();

        assert!(!handle.is_playing());
        assert!(!handle.shared.cancelled.load(Ordering::Acquire));
    }

    #[test]
    fn cancel_while_playing_sets_flag() {
        let handle = PlaybackHandle::default();
        handle.shared.playing.store(true, Ordering::Release);

        handle.cancel();

        assert!(handle.shared.cancelled.load(Ordering::Acquire));
    }
}
