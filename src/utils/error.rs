//! Error handling for vidfetch

use thiserror::Error;

/// Main error type for vidfetch
#[derive(Debug, Error)]
pub enum VidfetchError {
    #[error("yt-dlp not found. Please install yt-dlp")]
    YtDlpNotFound,

    #[error("{0}")]
    InvalidInput(String),

    #[error("Failed to process video: {0}")]
    ExtractionFailed(String),

    #[error("{0}")]
    DownloadFailed(String),

    #[error("File not found")]
    NotFound(String),

    #[error("Invalid download ID")]
    SessionUnknown,

    #[error("Too many downloads in progress, try again shortly")]
    Busy,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] axum::http::Error),
}

impl VidfetchError {
    /// Shorthand for the user-correctable input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
