//! Error types for devpulse-core

use thiserror::Error;

/// Main error type for the devpulse-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Rejected metrics window (zero or negative length)
    #[error("invalid window: {0}")]
    InvalidWindow(String),

    /// GitHub API error
    #[error("GitHub API error: {0}")]
    GitHub(String),

    /// Archive record error
    #[error("archive error in {file}: {message}")]
    Archive { file: String, message: String },
}

/// Result type alias for devpulse-core
pub type Result<T> = std::result::Result<T, Error>;
