//! Directory resolution for the server
//!
//! Relative paths from the command line are resolved against the current
//! working directory once at startup, so every later lookup (file delivery,
//! yt-dlp output template, traversal checks) compares absolute paths.

use path_absolutize::Absolutize;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Make `path` absolute without touching the filesystem.
pub fn absolute_dir(path: &Path) -> io::Result<PathBuf> {
    let absolute = path.absolutize()?.into_owned();
    debug!("Resolved {:?} to {:?}", path, absolute);
    Ok(absolute)
}

/// Resolve the downloads directory and create it if missing.
///
/// Returns the canonical path so prefix checks during file delivery are
/// not fooled by symlinks in the configured location.
pub async fn prepare_downloads_dir(path: &Path) -> io::Result<PathBuf> {
    let absolute = absolute_dir(path)?;
    tokio::fs::create_dir_all(&absolute).await?;
    tokio::fs::canonicalize(&absolute).await
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    }
}
