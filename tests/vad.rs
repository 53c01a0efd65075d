//! Voice activity detection integration tests
//!
//! Exercises segmentation over realistic generated audio without
//! requiring hardware.

mod common;

use common::{frames_from_samples, generate_silence, generate_sine_samples};
use vesper::VoiceActivityDetector;
use vesper::audio::{FRAME_SIZE, SAMPLE_RATE, samples_to_wav};

fn detector() -> VoiceActivityDetector {
    // onset 0.03, 800ms silence to close, 300ms minimum, 10s cap
    VoiceActivityDetector::new(0.03, 8, 3, 100)
}

#[test]
fn sine_tone_registers_as_speech_onset() {
    let vad = detector();
    let samples = generate_sine_samples(440.0, 0.1, 0.5);
    let frames = frames_from_samples(&samples, 0);

    assert!(vad.is_onset(&frames[0]));
}

#[test]
fn silence_does_not_register_as_onset() {
    let vad = detector();
    let samples = generate_silence(0.1);
    let frames = frames_from_samples(&samples, 0);

    assert!(!vad.is_onset(&frames[0]));
}

#[test]
fn spoken_phrase_becomes_one_utterance() {
    let mut vad = detector();

    // 1.5s of "speech" followed by 1s of silence
    let mut samples = generate_sine_samples(300.0, 1.5, 0.4);
    samples.extend(generate_silence(1.0));

    let mut utterances = Vec::new();
    for frame in frames_from_samples(&samples, 0) {
        if let Some(u) = vad.push(&frame) {
            utterances.push(u);
        }
    }

    assert_eq!(utterances.len(), 1);
    let u = &utterances[0];
    assert_eq!(u.first_seq, 0);
    // Speech plus the trailing silence run
    assert!(u.duration_secs(SAMPLE_RATE) >= 1.5);
    assert_eq!(u.samples.len(), u.frames * FRAME_SIZE);
}

#[test]
fn two_phrases_become_two_utterances() {
    let mut vad = detector();

    let mut samples = generate_sine_samples(300.0, 1.0, 0.4);
    samples.extend(generate_silence(1.0));
    samples.extend(generate_sine_samples(500.0, 1.0, 0.4));
    samples.extend(generate_silence(1.0));

    let mut utterances = Vec::new();
    for frame in frames_from_samples(&samples, 0) {
        if let Some(u) = vad.push(&frame) {
            utterances.push(u);
        }
    }

    assert_eq!(utterances.len(), 2);
    // Ordered by capture sequence
    assert!(utterances[0].first_seq < utterances[1].first_seq);
}

#[test]
fn brief_click_is_dropped_as_noise() {
    // Minimum 10 frames (1s); a 200ms click plus its silence run is shorter
    let mut vad = VoiceActivityDetector::new(0.03, 2, 10, 100);

    let mut samples = generate_sine_samples(1000.0, 0.2, 0.6);
    samples.extend(generate_silence(0.5));

    let mut utterances = 0;
    for frame in frames_from_samples(&samples, 0) {
        if vad.push(&frame).is_some() {
            utterances += 1;
        }
    }

    assert_eq!(utterances, 0);
}

#[test]
fn continuous_speech_is_force_closed_at_cap() {
    // 2s cap (20 frames), 5s of unbroken tone
    let mut vad = VoiceActivityDetector::new(0.03, 8, 3, 20);

    let samples = generate_sine_samples(300.0, 5.0, 0.4);

    let mut utterances = Vec::new();
    for frame in frames_from_samples(&samples, 0) {
        if let Some(u) = vad.push(&frame) {
            utterances.push(u);
        }
    }

    assert!(!utterances.is_empty());
    for u in &utterances {
        assert!(u.frames <= 20);
    }
}

#[test]
fn utterance_samples_encode_to_wav() {
    let mut vad = detector();

    let mut samples = generate_sine_samples(300.0, 1.0, 0.4);
    samples.extend(generate_silence(1.0));

    let mut utterance = None;
    for frame in frames_from_samples(&samples, 0) {
        if let Some(u) = vad.push(&frame) {
            utterance = Some(u);
        }
    }

    let u = utterance.expect("no utterance emitted");
    let wav = samples_to_wav(&u.samples, SAMPLE_RATE).unwrap();
    assert_eq!(&wav[0..4], b"RIFF");
    assert_eq!(&wav[8..12], b"WAVE");
}
