//! Format lookup: turns yt-dlp's raw format list into selectable options

use crate::extractor::models::{FormatOption, VideoInfo, VideoMetadata};
use crate::extractor::traits::Extractor;
use crate::utils::error::VidfetchError;
use std::collections::HashSet;
use tracing::{debug, error};

/// Look up the downloadable video formats for `url`.
///
/// Extraction failures of any kind come back as a single
/// [`VidfetchError::ExtractionFailed`].
pub async fn list_formats(
    extractor: &dyn Extractor,
    url: &str,
) -> Result<VideoMetadata, VidfetchError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(VidfetchError::invalid_input("Please enter a valid URL"));
    }

    debug!("Listing formats for {} via {}", url, extractor.id());
    let info = extractor.extract_info(url).await.map_err(|e| {
        error!("Format lookup failed for {}: {:#}", url, e);
        VidfetchError::ExtractionFailed(format!("{:#}", e))
    })?;

    Ok(collect_formats(info))
}

/// Filter, deduplicate and order yt-dlp formats.
///
/// Audio-only entries are dropped, the first entry per (height, ext) wins,
/// and the result is stably sorted by height descending with unknown last.
pub fn collect_formats(info: VideoInfo) -> VideoMetadata {
    let mut seen = HashSet::new();
    let mut formats: Vec<FormatOption> = info
        .formats
        .into_iter()
        .filter(|f| f.has_video())
        .filter_map(|f| {
            let ext = f.ext.unwrap_or_else(|| "mp4".to_string());
            if !seen.insert((f.height, ext.clone())) {
                return None;
            }
            Some(FormatOption {
                format_id: f.format_id,
                resolution: f.height,
                ext,
                filesize: f.filesize.or(f.filesize_approx),
            })
        })
        .collect();

    formats.sort_by(|a, b| b.resolution.cmp(&a.resolution));

    VideoMetadata {
        formats,
        thumbnail: info.thumbnail.unwrap_or_default(),
    }
}
