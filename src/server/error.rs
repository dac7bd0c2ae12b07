//! HTTP mapping of [`VidfetchError`]

use crate::utils::error::VidfetchError;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Seconds a client should wait before retrying a rejected download
const BUSY_RETRY_AFTER_SECS: &str = "5";

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl VidfetchError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            VidfetchError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            VidfetchError::ExtractionFailed(_) => StatusCode::BAD_GATEWAY,
            VidfetchError::NotFound(_) | VidfetchError::SessionUnknown => StatusCode::NOT_FOUND,
            VidfetchError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            VidfetchError::YtDlpNotFound
            | VidfetchError::DownloadFailed(_)
            | VidfetchError::IoError(_)
            | VidfetchError::SerializationError(_)
            | VidfetchError::HttpError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for VidfetchError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let mut response = (status, Json(ErrorBody { error: message })).into_response();
        if matches!(self, VidfetchError::Busy) {
            response.headers_mut().insert(
                header::RETRY_AFTER,
                HeaderValue::from_static(BUSY_RETRY_AFTER_SECS),
            );
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_input_is_400_with_message() {
        let response = VidfetchError::invalid_input("Please enter a valid URL").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Please enter a valid URL");
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let response = VidfetchError::NotFound("x.mp4".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "File not found");
    }

    #[tokio::test]
    async fn test_busy_sets_retry_after() {
        let response = VidfetchError::Busy.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "5");
    }

    #[tokio::test]
    async fn test_internal_errors_are_not_leaked() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "/srv/secret/path");
        let response = VidfetchError::from(io).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["error"], "Internal server error");
    }
}
