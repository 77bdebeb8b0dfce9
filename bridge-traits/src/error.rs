use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    /// Transport-level failure (DNS, connection reset, body read error).
    #[error("Network error: {0}")]
    Network(String),

    /// The operation was abandoned before completion.
    #[error("Operation aborted")]
    Aborted,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Returns true when retrying the same operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::Network(_) | BridgeError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
