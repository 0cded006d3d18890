//! Error types for speech capture and playback.

use shopvoice_core::error::ShopVoiceError;

/// Errors from speech providers and channels.
#[derive(Debug, thiserror::Error)]
pub enum SpeechError {
    #[error("{0} is not supported on this system")]
    Unsupported(String),
    #[error("speech provider failed: {0}")]
    Failed(String),
    #[error("speech I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SpeechError> for ShopVoiceError {
    fn from(err: SpeechError) -> Self {
        ShopVoiceError::Speech(err.to_string())
    }
}
