//! # Playback Error Types
//!
//! Error types for downloads, the offline cache and transport control.

use bridge_traits::error::BridgeError;
use core_library::error::LibraryError;
use core_metadata::MetadataError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during caching and playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Source Errors
    // ========================================================================
    /// Operation referenced a track id that is not present.
    #[error("Track not found: {0}")]
    NotFound(String),

    /// Fetch or transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Remote answered with a non-success status.
    #[error("HTTP request failed with status {0}")]
    HttpStatus(u16),

    /// A single download attempt ran longer than allowed.
    #[error("Download timed out after {0:?}")]
    Timeout(Duration),

    /// The caller abandoned the operation.
    #[error("Operation aborted")]
    Aborted,

    // ========================================================================
    // Payload Errors
    // ========================================================================
    /// Container or tag data could not be parsed.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The downloaded payload cannot fit in the cache at all.
    #[error("Payload of {size} bytes exceeds cache budget of {budget} bytes")]
    BudgetExceeded { size: u64, budget: u64 },

    // ========================================================================
    // Storage Errors
    // ========================================================================
    #[error("Storage error: {0}")]
    Storage(#[from] LibraryError),

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Attempted operation when no track is loaded.
    #[error("No track loaded")]
    NoTrackLoaded,

    /// Requested queue position does not exist.
    #[error("Index {index} out of range for queue of {len} tracks")]
    InvalidIndex { index: usize, len: usize },

    /// The playback primitive rejected a command.
    #[error("Playback adapter error: {0}")]
    Adapter(BridgeError),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            PlaybackError::Network(_) | PlaybackError::Timeout(_) => true,
            PlaybackError::HttpStatus(status) => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

impl From<BridgeError> for PlaybackError {
    fn from(error: BridgeError) -> Self {
        match error {
            BridgeError::Network(message) => PlaybackError::Network(message),
            BridgeError::Io(e) => PlaybackError::Network(e.to_string()),
            BridgeError::Aborted => PlaybackError::Aborted,
            other => PlaybackError::Adapter(other),
        }
    }
}

impl From<MetadataError> for PlaybackError {
    fn from(error: MetadataError) -> Self {
        PlaybackError::Decode(error.to_string())
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(PlaybackError::Network("reset".into()).is_transient());
        assert!(PlaybackError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(PlaybackError::HttpStatus(503).is_transient());
        assert!(PlaybackError::HttpStatus(429).is_transient());

        assert!(!PlaybackError::HttpStatus(404).is_transient());
        assert!(!PlaybackError::Aborted.is_transient());
        assert!(!PlaybackError::Decode("bad".into()).is_transient());
    }

    #[test]
    fn test_bridge_error_mapping() {
        assert!(matches!(
            PlaybackError::from(BridgeError::Network("down".into())),
            PlaybackError::Network(_)
        ));
        assert!(matches!(
            PlaybackError::from(BridgeError::Aborted),
            PlaybackError::Aborted
        ));
        assert!(matches!(
            PlaybackError::from(BridgeError::OperationFailed("x".into())),
            PlaybackError::Adapter(_)
        ));
    }
}
