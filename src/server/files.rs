//! Delivery of finished files from the downloads directory

use crate::server::AppState;
use crate::utils::error::VidfetchError;
use axum::{
    body::Body,
    extract::{Path as AxumPath, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};
use chrono::{DateTime, Utc};
use std::io::SeekFrom;
use std::path::{Component, Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};

/// `GET /downloads/{filename}`
pub async fn serve_download(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
    headers: HeaderMap,
) -> Result<Response, VidfetchError> {
    let path = resolve_download(&state.downloads_dir, &filename).await?;
    let mut response = stream_file(&path, &headers).await?;

    let disposition = build_content_disposition(&filename);
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        response
            .headers_mut()
            .insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}

/// `GET /mobile_download/{*filename}`
///
/// Mobile browsers cache partially downloaded files aggressively, so this
/// variant forbids caching and forces the literal file name.
pub async fn mobile_download(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
    headers: HeaderMap,
) -> Result<Response, VidfetchError> {
    let path = resolve_download(&state.downloads_dir, &filename).await?;
    let mut response = stream_file(&path, &headers).await?;

    let response_headers = response.headers_mut();
    response_headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    response_headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response_headers.insert(header::EXPIRES, HeaderValue::from_static("0"));

    let literal = format!("attachment; filename=\"{}\"", filename);
    let disposition = HeaderValue::from_str(&literal)
        .or_else(|_| HeaderValue::from_str(&build_content_disposition(&filename)))
        .map_err(axum::http::Error::from)?;
    response_headers.insert(header::CONTENT_DISPOSITION, disposition);

    Ok(response)
}

/// `DELETE /mobile_download/{*filename}`: the browser has saved the blob
pub async fn delete_download(
    State(state): State<AppState>,
    AxumPath(filename): AxumPath<String>,
) -> Result<StatusCode, VidfetchError> {
    let path = resolve_download(&state.downloads_dir, &filename).await?;
    tokio::fs::remove_file(&path).await?;
    info!("Removed delivered file {}", path.display());
    Ok(StatusCode::NO_CONTENT)
}

/// Map a requested name to a regular file directly inside `dir`.
///
/// `dir` must already be canonical. Anything that is not a single plain
/// path component, or that canonicalizes outside `dir`, is reported as
/// not found.
pub async fn resolve_download(dir: &Path, filename: &str) -> Result<PathBuf, VidfetchError> {
    let not_found = || VidfetchError::NotFound(filename.to_string());

    let mut components = Path::new(filename).components();
    let plain_name = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    );
    if !plain_name || filename.contains('\\') {
        warn!("Rejected download name {:?}", filename);
        return Err(not_found());
    }

    let canonical = match tokio::fs::canonicalize(dir.join(filename)).await {
        Ok(path) => path,
        Err(e) => {
            debug!("Cannot resolve {:?}: {}", filename, e);
            return Err(not_found());
        }
    };

    if !canonical.starts_with(dir) {
        warn!("Blocked file outside the downloads directory: {:?}", canonical);
        return Err(not_found());
    }

    match tokio::fs::metadata(&canonical).await {
        Ok(metadata) if metadata.is_file() => Ok(canonical),
        _ => Err(not_found()),
    }
}

/// Requested byte span of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    Full,
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

/// Parse a single-range `Range` header against a file of `size` bytes.
///
/// Malformed, multi-range and non-byte ranges are ignored (full body).
pub fn parse_range_header(value: Option<&HeaderValue>, size: u64) -> ByteRange {
    let Some(ranges) = value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().strip_prefix("bytes="))
    else {
        return ByteRange::Full;
    };
    if ranges.contains(',') {
        return ByteRange::Full;
    }
    let Some((start, end)) = ranges.trim().split_once('-') else {
        return ByteRange::Full;
    };

    if start.is_empty() {
        // Suffix range: "-N" means last N bytes.
        return match end.parse::<u64>() {
            Ok(0) => ByteRange::Unsatisfiable,
            Ok(_) if size == 0 => ByteRange::Unsatisfiable,
            Ok(n) => ByteRange::Partial {
                start: size.saturating_sub(n),
                end: size - 1,
            },
            Err(_) => ByteRange::Full,
        };
    }

    let Ok(start) = start.parse::<u64>() else {
        return ByteRange::Full;
    };
    let end = if end.is_empty() {
        None
    } else {
        match end.parse::<u64>() {
            Ok(end) if end >= start => Some(end),
            _ => return ByteRange::Full,
        }
    };

    if start >= size {
        return ByteRange::Unsatisfiable;
    }
    ByteRange::Partial {
        start,
        end: end.map_or(size - 1, |e| e.min(size - 1)),
    }
}

/// Build a streaming response honouring `Range` and `If-Modified-Since`
async fn stream_file(path: &Path, headers: &HeaderMap) -> Result<Response, VidfetchError> {
    let mut file = File::open(path)
        .await
        .map_err(|_| VidfetchError::NotFound(path.display().to_string()))?;
    let metadata = file.metadata().await?;
    let size = metadata.len();
    let modified: Option<DateTime<Utc>> = metadata.modified().ok().map(DateTime::from);
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    let mut builder = Response::builder()
        .header(header::ACCEPT_RANGES, "bytes")
        .header(header::CONTENT_TYPE, mime.as_ref());
    if let Some(modified) = modified {
        builder = builder.header(header::LAST_MODIFIED, http_date(&modified));
    }

    let since = headers
        .get(header::IF_MODIFIED_SINCE)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_http_date);
    if let (Some(modified), Some(since)) = (modified, since) {
        if modified.timestamp() <= since.timestamp() {
            return Ok(builder.status(StatusCode::NOT_MODIFIED).body(Body::empty())?);
        }
    }

    let response = match parse_range_header(headers.get(header::RANGE), size) {
        ByteRange::Full => builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, size)
            .body(Body::from_stream(ReaderStream::new(file)))?,
        ByteRange::Partial { start, end } => {
            let length = end - start + 1;
            file.seek(SeekFrom::Start(start)).await?;
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, size))
                .header(header::CONTENT_LENGTH, length)
                .body(Body::from_stream(ReaderStream::new(file.take(length))))?
        }
        ByteRange::Unsatisfiable => builder
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(header::CONTENT_RANGE, format!("bytes */{}", size))
            .body(Body::empty())?,
    };

    Ok(response)
}

/// `attachment` with an ASCII fallback name plus the exact UTF-8 name
pub fn build_content_disposition(filename: &str) -> String {
    let safe_ascii = sanitize_ascii_filename(filename);
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        safe_ascii,
        urlencoding::encode(filename)
    )
}

fn sanitize_ascii_filename(value: &str) -> String {
    let sanitized: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let compact = sanitized.trim();
    if compact.is_empty() {
        "download.bin".to_string()
    } else {
        compact.to_string()
    }
}

fn http_date(value: &DateTime<Utc>) -> String {
    value.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
