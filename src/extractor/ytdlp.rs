//! yt-dlp wrapper for format lookup and downloads
//!
//! Metadata comes from `yt-dlp --dump-json`. Downloads run yt-dlp with a
//! custom `--progress-template` so every progress update arrives as one
//! machine-readable line, and `--print after_move:filepath` so the final
//! (post-processed) file name is printed once the file is in place.

use crate::extractor::models::{DownloadRequest, VideoInfo};
use crate::extractor::traits::Extractor;
use crate::downloader::ProgressEvent;
use crate::session::ProgressSender;
use crate::utils::error::VidfetchError;
use crate::utils::paths::expand_home;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as AsyncCommand;
use tracing::{debug, error, info, warn};

/// Prefix of the progress lines produced by our `--progress-template`
const PROGRESS_MARKER: &str = "vidfetch-progress";

/// stderr lines kept for the error message of a failed run
const STDERR_TAIL: usize = 20;

/// Video extractor and downloader backed by the yt-dlp executable
pub struct YtDlpExtractor {
    ytdlp_path: PathBuf,
}

impl YtDlpExtractor {
    /// Initialize extractor and verify yt-dlp availability
    ///
    /// Search order:
    /// 1. Explicitly configured path
    /// 2. System PATH
    /// 3. Common installation paths (Homebrew, pip --user, etc.)
    pub fn new(explicit: Option<&Path>) -> Result<Self, VidfetchError> {
        let ytdlp_path = match find_ytdlp(explicit) {
            Some(path) => {
                info!("Found yt-dlp at: {}", path.display());
                path
            }
            None => {
                error!("yt-dlp not found anywhere!");
                return Err(VidfetchError::YtDlpNotFound);
            }
        };

        Ok(Self { ytdlp_path })
    }

    /// Use a specific binary without any discovery
    pub fn with_path(ytdlp_path: impl Into<PathBuf>) -> Self {
        Self {
            ytdlp_path: ytdlp_path.into(),
        }
    }

    /// Get the path to yt-dlp being used
    pub fn ytdlp_path(&self) -> &Path {
        &self.ytdlp_path
    }

    /// Command-line arguments for one download, URL last
    pub fn download_args(request: &DownloadRequest) -> Vec<String> {
        let config = &request.config;
        let template = request.output_dir.join("%(title)s.%(ext)s");

        let mut args = vec![
            "-f".to_string(),
            request.format_selector(),
            "-o".to_string(),
            template.to_string_lossy().into_owned(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--newline".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            format!(
                "download:{}|%(progress._percent_str)s|%(progress._speed_str)s|%(progress._eta_str)s",
                PROGRESS_MARKER
            ),
            "--concurrent-fragments".to_string(),
            config.concurrent_fragments.to_string(),
            "--retries".to_string(),
            config.retries.to_string(),
            "--fragment-retries".to_string(),
            config.fragment_retries.to_string(),
            "--socket-timeout".to_string(),
            config.socket_timeout.as_secs().to_string(),
            "--http-chunk-size".to_string(),
            config.http_chunk_size.to_string(),
            "--merge-output-format".to_string(),
            config.output_container.clone(),
            "--recode-video".to_string(),
            config.output_container.clone(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
        ];

        if let Some(ref ffmpeg) = config.ffmpeg_location {
            args.push("--ffmpeg-location".to_string());
            args.push(ffmpeg.to_string_lossy().into_owned());
        }

        // "--" keeps a URL starting with '-' from being read as an option
        args.push("--".to_string());
        args.push(request.url.clone());
        args
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn id(&self) -> &'static str {
        "ytdlp"
    }

    /// Uses: yt-dlp --dump-json --no-download
    async fn extract_info(&self, url: &str) -> Result<VideoInfo> {
        debug!("Extracting video info for URL: {}", url);

        let output = AsyncCommand::new(&self.ytdlp_path)
            .arg("--dump-json")
            .arg("--no-download")
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg("--")
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.ytdlp_path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = failure_message(stderr.lines(), output.status);
            error!("yt-dlp extraction failed: {}", message);
            bail!(message);
        }

        let video_info: VideoInfo =
            serde_json::from_slice(&output.stdout).context("yt-dlp returned malformed JSON")?;

        Ok(video_info)
    }

    async fn download(&self, request: &DownloadRequest, progress: &ProgressSender) -> Result<PathBuf> {
        let args = Self::download_args(request);
        info!("Starting yt-dlp download of {} ({})", request.url, request.format_id);
        debug!("yt-dlp args: {:?}", args);

        let mut child = AsyncCommand::new(&self.ytdlp_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", self.ytdlp_path.display()))?;

        let stdout = child.stdout.take().context("yt-dlp stdout unavailable")?;
        let stderr = child.stderr.take().context("yt-dlp stderr unavailable")?;
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();

        let mut final_path: Option<PathBuf> = None;
        let mut stderr_tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL);
        let mut out_done = false;
        let mut err_done = false;

        // yt-dlp writes progress to stderr in quiet mode (implied by --print)
        // and to stdout otherwise, so both streams are scanned.
        while !(out_done && err_done) {
            tokio::select! {
                line = out_lines.next_line(), if !out_done => match line? {
                    Some(line) => {
                        if let Some(event) = parse_progress_line(&line) {
                            progress.push(event);
                        } else if !line.trim().is_empty() {
                            final_path = Some(PathBuf::from(line.trim()));
                        }
                    }
                    None => out_done = true,
                },
                line = err_lines.next_line(), if !err_done => match line? {
                    Some(line) => {
                        if let Some(event) = parse_progress_line(&line) {
                            progress.push(event);
                        } else {
                            debug!("yt-dlp: {}", line);
                            if stderr_tail.len() == STDERR_TAIL {
                                stderr_tail.pop_front();
                            }
                            stderr_tail.push_back(line);
                        }
                    }
                    None => err_done = true,
                },
            }
        }

        let status = child.wait().await.context("Failed to wait for yt-dlp")?;
        if !status.success() {
            let message = failure_message(stderr_tail.iter().map(String::as_str), status);
            error!("yt-dlp download failed: {}", message);
            bail!(message);
        }

        match final_path {
            Some(path) => {
                info!("yt-dlp finished: {}", path.display());
                Ok(path)
            }
            None => {
                warn!("yt-dlp exited cleanly without printing the output path");
                bail!("Download finished but the output file could not be determined")
            }
        }
    }
}

/// Turn one template line into a progress event.
///
/// Fields yt-dlp cannot compute are printed as `NA`.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?.strip_prefix('|')?;
    let mut fields = rest.splitn(3, '|').map(str::trim);

    let percent = or_default(fields.next(), "0.0%");
    let speed = or_default(fields.next(), "N/A");
    let eta = or_default(fields.next(), "N/A");

    Some(ProgressEvent::downloading(percent, speed, eta))
}

fn or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    match value {
        Some(v) if !v.is_empty() && v != "NA" => v,
        _ => default,
    }
}

/// Prefer yt-dlp's own `ERROR:` line, then its last words, then the exit code
fn failure_message<'a>(lines: impl Iterator<Item = &'a str>, status: ExitStatus) -> String {
    let lines: Vec<&str> = lines.map(str::trim).filter(|l| !l.is_empty()).collect();

    if let Some(line) = lines.iter().rev().find(|l| l.starts_with("ERROR:")) {
        return line.to_string();
    }
    match lines.last() {
        Some(line) => line.to_string(),
        None => format!("yt-dlp exited with {}", status),
    }
}

// ============================================================
// yt-dlp Detection Functions
// ============================================================

/// Find yt-dlp binary with priority:
/// 1. Explicit path
/// 2. System PATH
/// 3. Common installation paths
pub fn find_ytdlp(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if is_executable(path) {
            info!("✓ Using configured yt-dlp: {:?}", path);
            return Some(path.to_path_buf());
        }
        warn!("Configured yt-dlp is not executable: {:?}", path);
    }

    if let Ok(path) = which::which("yt-dlp") {
        info!("✓ Using system yt-dlp: {:?}", path);
        return Some(path);
    }

    if let Some(common) = find_in_common_paths() {
        info!("✓ Using yt-dlp from common path: {:?}", common);
        return Some(common);
    }

    warn!("✗ yt-dlp not found anywhere!");
    None
}

/// Find yt-dlp in common installation paths
fn find_in_common_paths() -> Option<PathBuf> {
    let common_paths = [
        // macOS Homebrew (Apple Silicon)
        "/opt/homebrew/bin/yt-dlp",
        // macOS Homebrew (Intel) / manual installs
        "/usr/local/bin/yt-dlp",
        // Distribution packages
        "/usr/bin/yt-dlp",
        // pip --user
        "~/.local/bin/yt-dlp",
    ];

    common_paths
        .iter()
        .map(|p| expand_home(p))
        .find(|p| is_executable(p))
}

/// Check if a file is executable
fn is_executable(path: &Path) -> bool {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(_) => return false,
    };
    if !metadata.is_file() {
        return false;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        // Check if any executable bit is set
        if metadata.permissions().mode() & 0o111 == 0 {
            return false;
        }
    }

    true
}
