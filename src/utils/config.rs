//! Server configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Address the HTTP server listens on
    pub bind_addr: SocketAddr,

    /// Directory finished files are written to and served from
    pub downloads_dir: PathBuf,

    /// Front-end assets (index.html, script.js, styles.css)
    pub static_dir: PathBuf,

    /// Explicit yt-dlp binary; discovered when unset
    pub ytdlp_path: Option<PathBuf>,

    /// Maximum downloads running at once
    pub max_concurrent_downloads: usize,

    /// How long a progress stream waits for the next event before closing
    #[serde(with = "duration_secs")]
    pub progress_idle_timeout: Duration,

    /// Progress events buffered per session before the oldest is dropped
    pub progress_buffer: usize,

    /// Options handed to yt-dlp for every download
    pub download: DownloadConfig,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            downloads_dir: PathBuf::from("./downloads"),
            static_dir: PathBuf::from("./static"),
            ytdlp_path: None,
            max_concurrent_downloads: 5,
            progress_idle_timeout: Duration::from_secs(60),
            progress_buffer: 64,
            download: DownloadConfig::default(),
        }
    }
}

impl ServerSettings {
    /// Clamp values that would make the server unusable
    pub fn normalized(mut self) -> Self {
        if self.max_concurrent_downloads == 0 {
            self.max_concurrent_downloads = 1;
        }
        if self.progress_buffer == 0 {
            self.progress_buffer = 1;
        }
        if self.progress_idle_timeout.is_zero() {
            self.progress_idle_timeout = Duration::from_secs(1);
        }
        self
    }
}

/// yt-dlp tuning for unreliable networks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Fragments fetched in parallel (DASH/HLS)
    pub concurrent_fragments: u32,

    /// Retries for the whole file
    pub retries: u32,

    /// Retries per fragment
    pub fragment_retries: u32,

    /// Socket timeout
    #[serde(with = "duration_secs")]
    pub socket_timeout: Duration,

    /// Bytes requested per HTTP chunk
    pub http_chunk_size: u64,

    /// Container every download is merged/recoded into
    pub output_container: String,

    /// ffmpeg binary or directory passed to yt-dlp
    pub ffmpeg_location: Option<PathBuf>,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrent_fragments: 5,
            retries: 10,
            fragment_retries: 10,
            socket_timeout: Duration::from_secs(30),
            http_chunk_size: 10 * 1024 * 1024, // 10MB
            output_container: "mp4".to_string(),
            ffmpeg_location: None,
        }
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}
