use shopvoice_core::ShopVoiceError;
use thiserror::Error;

/// Failure of a backend exchange. Callers treat every variant the same way.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("network error: {0}")]
    Network(String),

    #[error("backend returned status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("invalid backend base URL: {0}")]
    InvalidBaseUrl(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => GatewayError::Status(status.as_u16()),
            None => GatewayError::Network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::Malformed(err.to_string())
    }
}

impl From<GatewayError> for ShopVoiceError {
    fn from(err: GatewayError) -> Self {
        ShopVoiceError::Gateway(err.to_string())
    }
}
