use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to extract metadata: {0}")]
    ExtractionFailed(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP request failed with status {0}")]
    HttpStatus(u16),

    #[error("Bridge error: {0}")]
    Bridge(BridgeError),
}

impl From<BridgeError> for MetadataError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Network(message) => MetadataError::Network(message),
            other => MetadataError::Bridge(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
