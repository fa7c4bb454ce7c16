//! Ad script generation and speech synthesis for VoxPromo
//!
//! Both providers are black boxes behind [`ContentGenerator`] and
//! [`SpeechSynthesizer`]; [`GeminiClient`] implements them over HTTP.

mod catalog;
mod gemini;
mod wav;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use catalog::*;
pub use gemini::{GeminiClient, GEMINI_API_URL, SCRIPT_MODEL, SPEECH_MODEL};
pub use wav::{encode_wav, wav_data_url, PcmAudio, PcmFormat, WAV_HEADER_LEN};

/// エラー型
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlError(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Audio decode error: {0}")]
    DecodeError(#[from] base64::DecodeError),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Speech synthesis failed: {0}")]
    SynthesisFailed(String),

    #[error("Unknown voice: {0}")]
    UnknownVoice(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Audio of {0} bytes does not fit in a WAV file")]
    AudioTooLarge(usize),
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        match self {
            GenerationError::RequestError(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;

/// Script and soundtrack suggestion for one ad
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdContent {
    #[serde(rename = "adScript")]
    pub script_text: String,
    #[serde(rename = "musicSuggestion")]
    pub music_suggestion_text: String,
}

/// Writes the ad script
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, tone: Tone, media_type: MediaType) -> Result<AdContent>;
}

/// Reads a script aloud
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Returns raw PCM in the synthesizer's fixed format
    async fn synthesize(&self, text: &str, voice: &VoiceOption) -> Result<PcmAudio>;
}
