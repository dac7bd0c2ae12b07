use crate::extractor::models::{DownloadRequest, VideoInfo};
use crate::session::ProgressSender;
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// Core trait for the external media tool
///
/// This trait isolates the web layer from how extraction and downloading
/// actually happen (yt-dlp subprocess in production, fakes in tests).
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Returns a unique identifier for this extractor (e.g., "ytdlp")
    fn id(&self) -> &'static str;

    /// Extracts video information without downloading any media
    async fn extract_info(&self, url: &str) -> Result<VideoInfo>;

    /// Downloads and post-processes the requested format.
    ///
    /// Progress updates go to `progress`; returns the final file path.
    async fn download(&self, request: &DownloadRequest, progress: &ProgressSender)
        -> Result<PathBuf>;
}
