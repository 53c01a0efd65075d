//! Configuration management for Vesper
//!
//! Resolution order for every setting is env > toml > built-in default.

pub mod file;

use std::collections::HashMap;
use std::time::Duration;

use crate::{Error, Result, audio};

/// Default wake words, phonetically close aliases included so common
/// mis-transcriptions still wake the assistant
const DEFAULT_WAKE_WORDS: &[&str] = &["nina", "nena", "mina", "lina"];

/// Default session exit phrases
const DEFAULT_EXIT_PHRASES: &[&str] = &["goodbye", "bye", "stop", "exit", "quit"];

/// Vesper configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Wake word and session window configuration
    pub wake: WakeConfig,

    /// Spoken response templates
    pub responses: Responses,

    /// Voice activity detection thresholds
    pub vad: VadConfig,

    /// Capture configuration
    pub audio: AudioConfig,

    /// Speech-to-text configuration
    pub stt: SttConfig,

    /// Text-to-speech configuration
    pub tts: TtsConfig,

    /// Command dispatch configuration
    pub dispatch: DispatchConfig,

    /// API keys
    pub api_keys: ApiKeys,

    /// Launchable applications: spoken name -> executable
    pub applications: HashMap<String, String>,
}

/// Wake word and activation window configuration
#[derive(Debug, Clone)]
pub struct WakeConfig {
    /// Wake words and phonetic aliases
    pub words: Vec<String>,

    /// Phrases that end the listening session
    pub exit_phrases: Vec<String>,

    /// How long a session stays active after the last command
    pub activation_timeout: Duration,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            words: DEFAULT_WAKE_WORDS.iter().map(ToString::to_string).collect(),
            exit_phrases: DEFAULT_EXIT_PHRASES
                .iter()
                .map(ToString::to_string)
                .collect(),
            activation_timeout: Duration::from_secs(8),
        }
    }
}

/// Spoken response templates
#[derive(Debug, Clone)]
pub struct Responses {
    /// Spoken when the wake word arrives with no command
    pub acknowledgement: String,

    /// Spoken before exiting
    pub goodbye: String,

    /// Fallback reply for commands no handler claims
    pub fallback: String,
}

impl Default for Responses {
    fn default() -> Self {
        Self {
            acknowledgement: "Yes? How can I help?".to_string(),
            goodbye: "Goodbye!".to_string(),
            fallback: "I can't help with that yet.".to_string(),
        }
    }
}

/// Voice activity detection thresholds
#[derive(Debug, Clone)]
pub struct VadConfig {
    /// Normalized RMS energy above which a frame counts as speech
    pub onset_threshold: f32,

    /// Consecutive quiet frames that close an utterance (8 x 100ms = 800ms)
    pub silence_frames_to_end: usize,

    /// Minimum frames for a segment to count as speech
    pub min_speech_frames: usize,

    /// Hard cap on utterance length in frames (100 x 100ms = 10s)
    pub max_utterance_frames: usize,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            onset_threshold: 0.03,
            silence_frames_to_end: 8,
            min_speech_frames: 3,
            max_utterance_frames: 100,
        }
    }
}

/// Capture configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Capture sample rate in Hz
    pub sample_rate: u32,

    /// Frame size in samples
    pub frame_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: audio::SAMPLE_RATE,
            frame_size: audio::FRAME_SIZE,
        }
    }
}

/// STT provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttProviderKind {
    /// `OpenAI` Whisper
    Whisper,
    /// Deepgram
    Deepgram,
}

/// Speech-to-text configuration
#[derive(Debug, Clone)]
pub struct SttConfig {
    /// Provider backend
    pub provider: SttProviderKind,

    /// Model identifier (e.g. "whisper-1", "nova-2")
    pub model: String,

    /// Per-utterance transcription timeout
    pub timeout: Duration,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            provider: SttProviderKind::Whisper,
            model: "whisper-1".to_string(),
            timeout: Duration::from_secs(8),
        }
    }
}

/// TTS provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsProviderKind {
    /// `OpenAI` TTS
    OpenAI,
    /// `ElevenLabs`
    ElevenLabs,
}

/// Text-to-speech configuration
#[derive(Debug, Clone)]
pub struct TtsConfig {
    /// Provider backend
    pub provider: TtsProviderKind,

    /// Model identifier
    pub model: String,

    /// Voice identifier
    pub voice: String,

    /// Speed multiplier (0.25 to 4.0)
    pub speed: f32,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            provider: TtsProviderKind::OpenAI,
            model: "tts-1".to_string(),
            voice: "alloy".to_string(),
            speed: 1.0,
        }
    }
}

/// Command dispatch configuration
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Per-command handler timeout
    pub handler_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            handler_timeout: Duration::from_secs(20),
        }
    }
}

/// API keys for external services
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper STT and TTS)
    pub openai: Option<String>,

    /// Deepgram API key (optional STT)
    pub deepgram: Option<String>,

    /// `ElevenLabs` API key (optional TTS)
    pub elevenlabs: Option<String>,
}

impl Config {
    /// Load configuration from the TOML file and environment
    ///
    /// # Errors
    ///
    /// Returns error if a provider name in the file is unrecognized
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        let defaults = Self::default();

        let wake = WakeConfig {
            words: fc.wake.words.unwrap_or(defaults.wake.words),
            exit_phrases: fc.wake.exit_phrases.unwrap_or(defaults.wake.exit_phrases),
            activation_timeout: fc
                .wake
                .activation_timeout_secs
                .map_or(defaults.wake.activation_timeout, Duration::from_secs),
        };

        let responses = Responses {
            acknowledgement: fc
                .responses
                .acknowledgement
                .unwrap_or(defaults.responses.acknowledgement),
            goodbye: fc.responses.goodbye.unwrap_or(defaults.responses.goodbye),
            fallback: fc.responses.fallback.unwrap_or(defaults.responses.fallback),
        };

        let vad = VadConfig {
            onset_threshold: fc
                .vad
                .onset_threshold
                .unwrap_or(defaults.vad.onset_threshold),
            silence_frames_to_end: fc
                .vad
                .silence_frames_to_end
                .unwrap_or(defaults.vad.silence_frames_to_end),
            min_speech_frames: fc
                .vad
                .min_speech_frames
                .unwrap_or(defaults.vad.min_speech_frames),
            max_utterance_frames: fc
                .vad
                .max_utterance_frames
                .unwrap_or(defaults.vad.max_utterance_frames),
        };

        let audio = AudioConfig {
            sample_rate: fc.audio.sample_rate.unwrap_or(defaults.audio.sample_rate),
            frame_size: fc.audio.frame_size.unwrap_or(defaults.audio.frame_size),
        };

        let stt = SttConfig {
            provider: match std::env::var("VESPER_STT_PROVIDER")
                .ok()
                .or(fc.stt.provider)
            {
                None => defaults.stt.provider,
                Some(name) => parse_stt_provider(&name)?,
            },
            model: std::env::var("VESPER_STT_MODEL")
                .ok()
                .or(fc.stt.model)
                .unwrap_or(defaults.stt.model),
            timeout: fc
                .stt
                .timeout_secs
                .map_or(defaults.stt.timeout, Duration::from_secs),
        };

        let tts = TtsConfig {
            provider: match std::env::var("VESPER_TTS_PROVIDER")
                .ok()
                .or(fc.tts.provider)
            {
                None => defaults.tts.provider,
                Some(name) => parse_tts_provider(&name)?,
            },
            model: std::env::var("VESPER_TTS_MODEL")
                .ok()
                .or(fc.tts.model)
                .unwrap_or(defaults.tts.model),
            voice: fc.tts.voice.unwrap_or(defaults.tts.voice),
            speed: fc.tts.speed.unwrap_or(defaults.tts.speed),
        };

        let dispatch = DispatchConfig {
            handler_timeout: fc
                .dispatch
                .handler_timeout_secs
                .map_or(defaults.dispatch.handler_timeout, Duration::from_secs),
        };

        // API keys (env > toml > None)
        let api_keys = ApiKeys {
            openai: std::env::var("OPENAI_API_KEY").ok().or(fc.api_keys.openai),
            deepgram: std::env::var("DEEPGRAM_API_KEY")
                .ok()
                .or(fc.api_keys.deepgram),
            elevenlabs: std::env::var("ELEVENLABS_API_KEY")
                .ok()
                .or(fc.api_keys.elevenlabs),
        };

        let applications = fc.applications.unwrap_or_default();

        Ok(Self {
            wake,
            responses,
            vad,
            audio,
            stt,
            tts,
            dispatch,
            api_keys,
            applications,
        })
    }
}

fn parse_stt_provider(name: &str) -> Result<SttProviderKind> {
    match name.to_lowercase().as_str() {
        "whisper" | "openai" => Ok(SttProviderKind::Whisper),
        "deepgram" => Ok(SttProviderKind::Deepgram),
        other => Err(Error::Config(format!("unknown STT provider '{other}'"))),
    }
}

fn parse_tts_provider(name: &str) -> Result<TtsProviderKind> {
    match name.to_lowercase().as_str() {
        "openai" => Ok(TtsProviderKind::OpenAI),
        "elevenlabs" => Ok(TtsProviderKind::ElevenLabs),
        other => Err(Error::Config(format!("unknown TTS provider '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_coherent() {
        let c = Config::default();
        assert_eq!(c.wake.words.len(), 4);
        assert!(c.wake.exit_phrases.contains(&"goodbye".to_string()));
        assert_eq!(c.wake.activation_timeout, Duration::from_secs(8));
        assert_eq!(c.audio.sample_rate, 16_000);
        assert_eq!(c.audio.frame_size, 1_600);
        // 10 frames/sec, so the cap is 10 seconds of speech
        assert_eq!(c.vad.max_utterance_frames, 100);
    }

    #[test]
    fn provider_names_parse() {
        assert_eq!(
            parse_stt_provider("Whisper").unwrap(),
            SttProviderKind::Whisper
        );
        assert_eq!(
            parse_stt_provider("deepgram").unwrap(),
            SttProviderKind::Deepgram
        );
        assert!(parse_stt_provider("siri").is_err());
        assert_eq!(
            parse_tts_provider("elevenlabs").unwrap(),
            TtsProviderKind::ElevenLabs
        );
        assert!(parse_tts_provider("festival").is_err());
    }
}
