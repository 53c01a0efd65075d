//! TOML configuration file loading
//!
//! Supports `~/.config/vesper/config.toml` as a persistent config source.
//! All fields are optional — the file is a partial overlay on top of defaults.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VesperConfigFile {
    /// Wake word and session configuration
    #[serde(default)]
    pub wake: WakeFileConfig,

    /// Spoken response templates
    #[serde(default)]
    pub responses: ResponsesFileConfig,

    /// Voice activity detection thresholds
    #[serde(default)]
    pub vad: VadFileConfig,

    /// Capture configuration
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Speech-to-text configuration
    #[serde(default)]
    pub stt: SttFileConfig,

    /// Text-to-speech configuration
    #[serde(default)]
    pub tts: TtsFileConfig,

    /// Command dispatch configuration
    #[serde(default)]
    pub dispatch: DispatchFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,

    /// Launchable applications: spoken name -> executable
    #[serde(default)]
    pub applications: Option<HashMap<String, String>>,
}

/// Wake word and activation window configuration
#[derive(Debug, Default, Deserialize)]
pub struct WakeFileConfig {
    /// Wake words and phonetic aliases
    pub words: Option<Vec<String>>,

    /// Phrases that end the session
    pub exit_phrases: Option<Vec<String>>,

    /// Seconds a session stays active after the last command
    pub activation_timeout_secs: Option<u64>,
}

/// Spoken response templates
#[derive(Debug, Default, Deserialize)]
pub struct ResponsesFileConfig {
    /// Spoken when the wake word arrives with no command
    pub acknowledgement: Option<String>,

    /// Spoken before exiting
    pub goodbye: Option<String>,

    /// Fallback reply for commands no handler claims
    pub fallback: Option<String>,
}

/// Voice activity detection thresholds
#[derive(Debug, Default, Deserialize)]
pub struct VadFileConfig {
    /// Normalized RMS energy above which a frame counts as speech
    pub onset_threshold: Option<f32>,

    /// Consecutive quiet frames that close an utterance
    pub silence_frames_to_end: Option<usize>,

    /// Minimum frames for a segment to count as speech
    pub min_speech_frames: Option<usize>,

    /// Hard cap on utterance length in frames
    pub max_utterance_frames: Option<usize>,
}

/// Capture configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Capture sample rate in Hz
    pub sample_rate: Option<u32>,

    /// Frame size in samples
    pub frame_size: Option<usize>,
}

/// Speech-to-text configuration
#[derive(Debug, Default, Deserialize)]
pub struct SttFileConfig {
    /// Provider ("whisper" or "deepgram")
    pub provider: Option<String>,

    /// Model identifier (e.g. "whisper-1", "nova-2")
    pub model: Option<String>,

    /// Per-utterance transcription timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Text-to-speech configuration
#[derive(Debug, Default, Deserialize)]
pub struct TtsFileConfig {
    /// Provider ("openai" or "elevenlabs")
    pub provider: Option<String>,

    /// Model identifier (e.g. "tts-1")
    pub model: Option<String>,

    /// Voice identifier (e.g. "alloy")
    pub voice: Option<String>,

    /// Speed multiplier (0.25 to 4.0)
    pub speed: Option<f32>,
}

/// Command dispatch configuration
#[derive(Debug, Default, Deserialize)]
pub struct DispatchFileConfig {
    /// Per-command handler timeout in seconds
    pub handler_timeout_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VesperConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VesperConfigFile {
    let Some(path) = config_file_path() else {
        return VesperConfigFile::default();
    };

    if !path.exists() {
        return VesperConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VesperConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VesperConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/vesper/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("vesper").join("config.toml"))
}
