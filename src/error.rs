//! Error types for the Vesper pipeline

use thiserror::Error;

/// Result type alias for Vesper operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice pipeline
///
/// Only [`Error::Device`] is terminal: it propagates out of the
/// orchestrator and stops the pipeline. Everything else is absorbed at
/// the call site and converted into silence or a spoken fallback.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device failure (fatal to the pipeline)
    #[error("device error: {0}")]
    Device(String),

    /// Audio encoding/decoding error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Command handler error
    #[error("handler error: {0}")]
    Handler(String),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
