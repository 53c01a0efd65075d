//! Audio capture from microphone
//!
//! Thinnest possible layer over the device API: fixed-size PCM frames at a
//! fixed sample rate, no resampling or filtering. Device failure is fatal
//! and surfaced to the orchestrator through the fault channel.

use std::time::Instant;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, Stream, StreamConfig};
use tokio::sync::mpsc;

use super::AudioFrame;
use crate::{Error, Result};

/// Captures audio from the default input device into a bounded frame queue
pub struct AudioSource {
    device: Device,
    config: StreamConfig,
    sample_rate: u32,
    frame_size: usize,
    stream: Option<Stream>,
}

impl AudioSource {
    /// Open the default input device at the given rate and frame size
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if no suitable input device or config exists
    pub fn open(sample_rate: u32, frame_size: usize) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_input_device()
            .ok_or_else(|| Error::Device("no input device available".to_string()))?;

        let supported_config = device
            .supported_input_configs()
            .map_err(|e| Error::Device(e.to_string()))?
            .find(|c| {
                c.channels() == 1
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .ok_or_else(|| Error::Device("no suitable input config found".to_string()))?;

        let config = supported_config
            .with_sample_rate(SampleRate(sample_rate))
            .config();

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            sample_rate,
            frame_size,
            channels = config.channels,
            "audio capture initialized"
        );

        Ok(Self {
            device,
            config,
            sample_rate,
            frame_size,
            stream: None,
        })
    }

    /// Start capturing into the frame queue
    ///
    /// The device callback slices incoming samples into exact-size frames,
    /// tags each with a monotonic sequence number, and never blocks: when
    /// the queue is full, frames are dropped and counted.
    ///
    /// Device errors after startup are reported on `fault` and must be
    /// treated as terminal by the consumer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Device`] if the stream cannot be built or started
    pub fn start(
        &mut self,
        frames: mpsc::Sender<AudioFrame>,
        fault: mpsc::Sender<String>,
    ) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }

        let frame_size = self.frame_size;
        let mut pending: Vec<i16> = Vec::with_capacity(frame_size * 2);
        let mut seq: u64 = 0;
        let mut dropped: u64 = 0;

        let stream = self
            .device
            .build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    #[allow(clippy::cast_possible_truncation)]
                    pending.extend(
                        data.iter()
                            .map(|&s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16),
                    );

                    while pending.len() >= frame_size {
                        let samples: Vec<i16> = pending.drain(..frame_size).collect();
                        let frame = AudioFrame {
                            samples,
                            seq,
                            captured_at: Instant::now(),
                        };
                        seq += 1;

                        if frames.try_send(frame).is_err() {
                            dropped += 1;
                            if dropped % 50 == 1 {
                                tracing::warn!(dropped, "frame queue full, dropping frames");
                            }
                        }
                    }
                },
                move |err| {
                    tracing::error!(error = %err, "audio capture error");
                    let _ = fault.try_send(err.to_string());
                },
                None,
            )
            .map_err(|e| Error::Device(e.to_string()))?;

        stream.play().map_err(|e| Error::Device(e.to_string()))?;
        self.stream = Some(stream);

        tracing::debug!("audio capture started");
        Ok(())
    }

    /// Stop capturing audio
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            tracing::debug!("audio capture stopped");
        }
    }

    /// Check if currently capturing
    #[must_use]
    pub const fn is_capturing(&self) -> bool {
        self.stream.is_some()
    }

    /// Get the sample rate
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Get the frame size in samples
    #[must_use]
    pub const fn frame_size(&self) -> usize {
        self.frame_size
    }
}
