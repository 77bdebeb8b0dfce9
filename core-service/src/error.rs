use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Core initialization failed: {0}")]
    InitializationFailed(String),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Library error: {0}")]
    Library(#[from] core_library::LibraryError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] core_metadata::MetadataError),

    #[error("Playback error: {0}")]
    Playback(#[from] core_playback::PlaybackError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
