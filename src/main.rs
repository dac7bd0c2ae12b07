//! vidfetch - paste a video URL, pick a format, download the result
//!
//! HTTP server that drives yt-dlp (and through it ffmpeg) and streams
//! download progress to the browser.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vidfetch::extractor::{Extractor, YtDlpExtractor};
use vidfetch::utils::{absolute_dir, prepare_downloads_dir, ServerSettings};
use vidfetch::{router, AppState};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "VIDFETCH_BIND", default_value = "127.0.0.1:5000")]
    bind: SocketAddr,

    /// Directory finished downloads are stored in and served from
    #[arg(long, env = "VIDFETCH_DOWNLOADS_DIR", default_value = "./downloads")]
    downloads_dir: PathBuf,

    /// Directory holding index.html and the front-end assets
    #[arg(long, env = "VIDFETCH_STATIC_DIR", default_value = "./static")]
    static_dir: PathBuf,

    /// yt-dlp executable (discovered on PATH when omitted)
    #[arg(long = "yt-dlp", env = "VIDFETCH_YTDLP")]
    ytdlp: Option<PathBuf>,

    /// ffmpeg binary or directory handed to yt-dlp
    #[arg(long, env = "VIDFETCH_FFMPEG")]
    ffmpeg_location: Option<PathBuf>,

    /// Downloads allowed to run at the same time
    #[arg(long, env = "VIDFETCH_MAX_CONCURRENT", default_value_t = 5)]
    max_concurrent: usize,

    /// Seconds a progress stream waits for news before closing
    #[arg(long, env = "VIDFETCH_IDLE_TIMEOUT_SECS", default_value_t = 60)]
    idle_timeout_secs: u64,
}

impl Args {
    fn into_settings(self) -> ServerSettings {
        let mut settings = ServerSettings {
            bind_addr: self.bind,
            downloads_dir: self.downloads_dir,
            static_dir: self.static_dir,
            ytdlp_path: self.ytdlp,
            max_concurrent_downloads: self.max_concurrent,
            progress_idle_timeout: Duration::from_secs(self.idle_timeout_secs),
            ..Default::default()
        };
        settings.download.ffmpeg_location = self.ffmpeg_location;
        settings.normalized()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("vidfetch=info,tower_http=info")),
        )
        .init();

    let settings = Args::parse().into_settings();

    let downloads_dir = prepare_downloads_dir(&settings.downloads_dir)
        .await
        .with_context(|| format!("preparing {}", settings.downloads_dir.display()))?;
    let static_dir = absolute_dir(&settings.static_dir)?;
    if !static_dir.join("index.html").is_file() {
        warn!("No index.html in {}; the page at / will 404", static_dir.display());
    }

    let extractor: Arc<dyn Extractor> = match YtDlpExtractor::new(settings.ytdlp_path.as_deref()) {
        Ok(extractor) => Arc::new(extractor),
        Err(e) => {
            // Keep serving; lookups will report the failure to the user.
            warn!("{}", e);
            warn!("Install yt-dlp (pip install yt-dlp) or pass --yt-dlp <path>");
            Arc::new(YtDlpExtractor::with_path("yt-dlp"))
        }
    };

    let state = AppState::new(extractor, &settings, downloads_dir.clone());
    let app = router(state, &static_dir);

    let listener = TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("binding {}", settings.bind_addr))?;
    info!(
        "vidfetch listening on http://{} (downloads in {})",
        settings.bind_addr,
        downloads_dir.display()
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running HTTP server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to install Ctrl+C handler: {}", e);
    }
    info!("Shutting down");
}
