use thiserror::Error;

/// Failures of the persistent blob store.
#[derive(Error, Debug)]
pub enum LibraryError {
    /// SQLite rejected or failed the statement
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A record failed validation before it reached the store
    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Migration failed: {0}")]
    Migration(String),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
