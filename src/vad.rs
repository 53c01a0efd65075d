//! Voice activity detection and utterance segmentation
//!
//! Energy-based state machine over captured frames: speech onset opens a
//! segment, a run of trailing silence closes it. Segments shorter than the
//! minimum speech length are treated as noise (clicks, coughs) and dropped.

use crate::audio::{AudioFrame, Utterance};

/// Detector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VadState {
    /// No speech in progress
    Silence,
    /// Accumulating a speech segment
    Collecting,
}

/// Segments a frame stream into utterances by energy thresholding
pub struct VoiceActivityDetector {
    onset_threshold: f32,
    silence_frames_to_end: usize,
    min_speech_frames: usize,
    max_utterance_frames: usize,

    state: VadState,
    samples: Vec<i16>,
    frames: usize,
    silence_run: usize,
    first_seq: u64,
    started_at: Option<std::time::Instant>,
}

impl VoiceActivityDetector {
    /// Create a detector with the given thresholds
    ///
    /// * `onset_threshold` - normalized RMS energy above which a frame
    ///   counts as speech
    /// * `silence_frames_to_end` - consecutive quiet frames that close an
    ///   utterance
    /// * `min_speech_frames` - segments spanning fewer frames are discarded
    ///   as noise
    /// * `max_utterance_frames` - hard cap; a segment this long is
    ///   force-closed to bound latency and memory
    #[must_use]
    pub fn new(
        onset_threshold: f32,
        silence_frames_to_end: usize,
        min_speech_frames: usize,
        max_utterance_frames: usize,
    ) -> Self {
        Self {
            onset_threshold,
            silence_frames_to_end,
            min_speech_frames,
            max_utterance_frames,
            state: VadState::Silence,
            samples: Vec::new(),
            frames: 0,
            silence_run: 0,
            first_seq: 0,
            started_at: None,
        }
    }

    /// Feed one frame; returns a closed utterance when end-of-speech is
    /// detected or the hard length cap is hit
    ///
    /// Sub-minimum segments are discarded here and never surface.
    pub fn push(&mut self, frame: &AudioFrame) -> Option<Utterance> {
        let is_speech = self.is_onset(frame);

        match self.state {
            VadState::Silence => {
                if is_speech {
                    self.state = VadState::Collecting;
                    self.samples.clear();
                    self.first_seq = frame.seq;
                    self.started_at = Some(frame.captured_at);
                    self.frames = 0;
                    self.silence_run = 0;
                    self.append(frame);
                    tracing::trace!(seq = frame.seq, "speech onset");
                }
                None
            }
            VadState::Collecting => {
                // Trailing silence is kept for natural cadence
                self.append(frame);

                if is_speech {
                    self.silence_run = 0;
                } else {
                    self.silence_run += 1;
                }

                if self.silence_run >= self.silence_frames_to_end {
                    return self.close(false);
                }

                if self.frames >= self.max_utterance_frames {
                    tracing::warn!(frames = self.frames, "utterance hit max length, force-closing");
                    return self.close(true);
                }

                None
            }
        }
    }

    /// Check whether a frame's energy is above the speech threshold
    ///
    /// Used directly by the orchestrator for barge-in detection while
    /// playback is active, without feeding the collector.
    #[must_use]
    pub fn is_onset(&self, frame: &AudioFrame) -> bool {
        frame.energy() > self.onset_threshold
    }

    /// Reset to silence, dropping any partial segment
    pub fn reset(&mut self) {
        self.state = VadState::Silence;
        self.samples.clear();
        self.frames = 0;
        self.silence_run = 0;
        self.started_at = None;
    }

    /// Check whether a speech segment is currently being collected
    #[must_use]
    pub fn is_collecting(&self) -> bool {
        self.state == VadState::Collecting
    }

    fn append(&mut self, frame: &AudioFrame) {
        self.samples.extend_from_slice(&frame.samples);
        self.frames += 1;
    }

    fn close(&mut self, forced: bool) -> Option<Utterance> {
        let frames = self.frames;
        let utterance = Utterance {
            samples: std::mem::take(&mut self.samples),
            frames,
            first_seq: self.first_seq,
            started_at: self.started_at.take().unwrap_or_else(std::time::Instant::now),
        };

        self.state = VadState::Silence;
        self.frames = 0;
        self.silence_run = 0;

        if utterance.frames < self.min_speech_frames {
            tracing::debug!(
                frames = utterance.frames,
                min = self.min_speech_frames,
                "utterance discarded as noise"
            );
            return None;
        }

        tracing::debug!(
            frames = utterance.frames,
            samples = utterance.samples.len(),
            forced,
            "utterance closed"
        );
        Some(utterance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn frame(seq: u64, amplitude: i16, len: usize) -> AudioFrame {
        AudioFrame {
            samples: vec![amplitude; len],
            seq,
            captured_at: Instant::now(),
        }
    }

    fn detector() -> VoiceActivityDetector {
        // onset 0.03, 5 silent frames to close, 3 frames minimum, 100 cap
        VoiceActivityDetector::new(0.03, 5, 3, 100)
    }

    #[test]
    fn silence_emits_nothing() {
        let mut vad = detector();
        for i in 0..50 {
            assert!(vad.push(&frame(i, 0, 160)).is_none());
        }
        assert!(!vad.is_collecting());
    }

    #[test]
    fn speech_then_silence_emits_one_utterance() {
        let mut vad = detector();
        let mut emitted = Vec::new();

        for i in 0..10 {
            if let Some(u) = vad.push(&frame(i, 16_000, 160)) {
                emitted.push(u);
            }
        }
        for i in 10..15 {
            if let Some(u) = vad.push(&frame(i, 0, 160)) {
                emitted.push(u);
            }
        }

        assert_eq!(emitted.len(), 1);
        // All frames from onset through the silence run are included
        assert_eq!(emitted[0].frames, 15);
        assert_eq!(emitted[0].samples.len(), 15 * 160);
        assert_eq!(emitted[0].first_seq, 0);
    }

    #[test]
    fn short_burst_is_discarded() {
        // Trailing silence counts toward the frame total, so the minimum
        // must exceed speech + silence frames for the gate to trip.
        let mut vad = VoiceActivityDetector::new(0.03, 2, 10, 100);
        let mut emitted = 0;

        for i in 0..2 {
            if vad.push(&frame(i, 16_000, 160)).is_some() {
                emitted += 1;
            }
        }
        for i in 2..4 {
            if vad.push(&frame(i, 0, 160)).is_some() {
                emitted += 1;
            }
        }

        assert_eq!(emitted, 0);
        assert!(!vad.is_collecting());
    }

    #[test]
    fn max_length_force_closes() {
        let mut vad = VoiceActivityDetector::new(0.03, 5, 3, 20);
        let mut emitted = Vec::new();

        for i in 0..30 {
            if let Some(u) = vad.push(&frame(i, 16_000, 160)) {
                emitted.push(u);
            }
        }

        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].frames, 20);
        // Collector restarts on the next loud frame
        assert!(vad.is_collecting());
    }

    #[test]
    fn reset_drops_partial_segment() {
        let mut vad = detector();
        vad.push(&frame(0, 16_000, 160));
        assert!(vad.is_collecting());

        vad.reset();
        assert!(!vad.is_collecting());

        // A full segment after reset still emits
        for i in 1..8 {
            vad.push(&frame(i, 16_000, 160));
        }
        let mut got = None;
        for i in 8..13 {
            if let Some(u) = vad.push(&frame(i, 0, 160)) {
                got = Some(u);
            }
        }
        assert!(got.is_some());
    }
}
