use thiserror::Error;

/// Top-level error type for the ShopVoice client.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for ShopVoiceError` where a failure has to cross
/// into the composition root.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ShopVoiceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Speech error: {0}")]
    Speech(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for ShopVoiceError {
    fn from(err: toml::de::Error) -> Self {
        ShopVoiceError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for ShopVoiceError {
    fn from(err: toml::ser::Error) -> Self {
        ShopVoiceError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for ShopVoiceError {
    fn from(err: serde_json::Error) -> Self {
        ShopVoiceError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for ShopVoice operations.
pub type Result<T> = std::result::Result<T, ShopVoiceError>;
