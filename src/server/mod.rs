//! HTTP front-end: routes, shared state and response mapping

pub mod error;
pub mod files;
pub mod handlers;
pub mod progress;

use crate::downloader::DownloadOrchestrator;
use crate::extractor::Extractor;
use crate::session::SessionRegistry;
use crate::utils::config::ServerSettings;
use axum::{
    routing::{get, post},
    Router,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<dyn Extractor>,
    pub orchestrator: Arc<DownloadOrchestrator>,
    /// Canonical downloads directory
    pub downloads_dir: Arc<PathBuf>,
    pub idle_timeout: Duration,
}

impl AppState {
    /// Wire the components together; `downloads_dir` must be canonical
    pub fn new(extractor: Arc<dyn Extractor>, settings: &ServerSettings, downloads_dir: PathBuf) -> Self {
        let registry = Arc::new(SessionRegistry::new(settings.progress_buffer));
        let orchestrator = DownloadOrchestrator::new(
            Arc::clone(&extractor),
            registry,
            downloads_dir.clone(),
            settings.download.clone(),
            settings.max_concurrent_downloads,
        );

        Self {
            extractor,
            orchestrator: Arc::new(orchestrator),
            downloads_dir: Arc::new(downloads_dir),
            idle_timeout: settings.progress_idle_timeout,
        }
    }
}

/// Build the application router
pub fn router(state: AppState, static_dir: &Path) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/get_formats", post(handlers::get_formats))
        .route("/download", post(handlers::start_download))
        .route("/progress/{download_id}", get(progress::stream_progress))
        .route("/downloads/{filename}", get(files::serve_download))
        .route(
            "/mobile_download/{*filename}",
            get(files::mobile_download).delete(files::delete_download),
        )
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
