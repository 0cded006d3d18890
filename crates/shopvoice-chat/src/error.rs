//! Error types for turn orchestration.

use shopvoice_core::ShopVoiceError;
use shopvoice_gateway::GatewayError;
use shopvoice_speech::SpeechError;

/// Errors from the turn controller.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Speech recognition not supported on this system")]
    CaptureUnsupported,
    #[error("speech error: {0}")]
    Speech(String),
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

impl From<SpeechError> for ChatError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::Unsupported(_) => ChatError::CaptureUnsupported,
            other => ChatError::Speech(other.to_string()),
        }
    }
}

impl From<ChatError> for ShopVoiceError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Gateway(e) => e.into(),
            other => ShopVoiceError::Speech(other.to_string()),
        }
    }
}
