//! Vesper - always-listening voice command assistant
//!
//! This library provides the core pipeline:
//! - Continuous microphone capture into fixed PCM frames
//! - Energy-based voice activity detection and utterance segmentation
//! - Wake-word activation with a timed session window
//! - Intent classification and command dispatch to registered handlers
//! - Spoken responses with barge-in cancellation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   frames   ┌──────────────┐  utterances  ┌───────────────┐
//! │ AudioSource  ├───────────►│     VAD      ├─────────────►│  Transcriber  │
//! └──────────────┘            └──────┬───────┘              └───────┬───────┘
//!                                    │ onset during playback        │ text
//!                                    ▼                              ▼
//! ┌──────────────┐  cancel    ┌──────────────┐  commands   ┌────────────────┐
//! │ SpeechPlayer │◄───────────┤  barge-in    │             │  Activation    │
//! └──────▲───────┘            └──────────────┘             │  StateMachine  │
//!        │ replies                                         └───────┬────────┘
//!        │                    ┌──────────────────┐                 │
//!        └────────────────────┤ CommandDispatcher│◄────────────────┘
//!                             └──────────────────┘
//! ```
//!
//! STT and TTS are external collaborators reached over HTTP; the pipeline
//! only orchestrates buffering, timing, and handoff between them.

pub mod activation;
pub mod audio;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod pipeline;
pub mod stt;
pub mod tts;
pub mod vad;

pub use activation::{ActivationMachine, ActivationState, Decision};
pub use audio::{AudioFrame, Utterance, samples_to_wav};
pub use config::Config;
pub use dispatch::{
    CommandDispatcher, DispatchResult, Handler, Intent, IntentClassifier, RuleClassifier,
};
pub use error::{Error, Result};
pub use pipeline::Pipeline;
pub use stt::{SpeechToText, TranscriptEvent, Transcriber};
pub use tts::TextToSpeech;
pub use vad::VoiceActivityDetector;
