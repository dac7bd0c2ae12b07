//! vidfetch library
//!
//! Web front-end over yt-dlp: format lookup, background downloads with
//! server-sent progress, and delivery of the finished files.

pub mod downloader;
pub mod extractor;
pub mod server;
pub mod session;
pub mod utils;

// Re-export main types for easier use
pub use downloader::{DownloadOrchestrator, ProgressEvent};
pub use extractor::{Extractor, FormatOption, VideoMetadata, YtDlpExtractor};
pub use server::{router, AppState};
pub use session::SessionRegistry;
pub use utils::{ServerSettings, VidfetchError};
