//! JSON endpoints: format lookup, download start, health

use crate::extractor::{list_formats, VideoMetadata};
use crate::server::AppState;
use crate::utils::error::VidfetchError;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct FormatsRequest {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadStartRequest {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub format_id: String,
}

#[derive(Debug, Serialize)]
pub struct DownloadStarted {
    pub download_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub active_downloads: usize,
}

/// `POST /get_formats`
pub async fn get_formats(
    State(state): State<AppState>,
    payload: Result<Json<FormatsRequest>, JsonRejection>,
) -> Result<Json<VideoMetadata>, VidfetchError> {
    let Json(request) = payload.map_err(|e| {
        debug!("Rejected format lookup body: {}", e);
        VidfetchError::invalid_input("Please enter a valid URL")
    })?;

    let metadata = list_formats(state.extractor.as_ref(), &request.url).await?;
    Ok(Json(metadata))
}

/// `POST /download`
pub async fn start_download(
    State(state): State<AppState>,
    payload: Result<Json<DownloadStartRequest>, JsonRejection>,
) -> Result<Json<DownloadStarted>, VidfetchError> {
    let Json(request) = payload.map_err(|e| {
        debug!("Rejected download body: {}", e);
        VidfetchError::invalid_input("Invalid request")
    })?;

    let download_id = state
        .orchestrator
        .start_download(&request.url, &request.format_id)?;
    Ok(Json(DownloadStarted { download_id }))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "ok",
        active_downloads: state.orchestrator.active_downloads(),
    })
}
