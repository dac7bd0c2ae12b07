//! Utility modules for error handling, configuration and paths

pub mod config;
pub mod error;
pub mod paths;

// Re-export for convenience
pub use config::{DownloadConfig, ServerSettings};
pub use error::VidfetchError;
pub use paths::{absolute_dir, prepare_downloads_dir};
