//! Data structures for video information

use serde::{Deserialize, Serialize, Serializer};
use std::path::PathBuf;

use crate::utils::DownloadConfig;

/// Subset of yt-dlp's `--dump-json` output the adapter reads
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub formats: Vec<Format>,
}

/// One entry of yt-dlp's `formats` array
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Format {
    pub format_id: String,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub vcodec: Option<String>,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub filesize_approx: Option<u64>,
}

impl Format {
    /// Audio-only entries report `vcodec: "none"` or omit it
    pub fn has_video(&self) -> bool {
        matches!(self.vcodec.as_deref(), Some(codec) if codec != "none")
    }
}

/// A selectable format as shown to the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormatOption {
    pub format_id: String,
    /// Pixel height; `None` serializes as `"Unknown"` and sorts lowest
    #[serde(serialize_with = "serialize_resolution")]
    pub resolution: Option<u32>,
    pub ext: String,
    pub filesize: Option<u64>,
}

/// Response of a format lookup
#[derive(Debug, Clone, Serialize)]
pub struct VideoMetadata {
    pub formats: Vec<FormatOption>,
    pub thumbnail: String,
}

/// Everything the extractor needs to run one download
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    pub format_id: String,
    pub output_dir: PathBuf,
    pub config: DownloadConfig,
}

impl DownloadRequest {
    /// Chosen stream muxed with the best audio, or yt-dlp's generic best
    pub fn format_selector(&self) -> String {
        format!("{}+bestaudio/best", self.format_id)
    }
}

fn serialize_resolution<S: Serializer>(value: &Option<u32>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(height) => serializer.serialize_u32(*height),
        None => serializer.serialize_str("Unknown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_video_info_tolerates_missing_fields() {
        let info: VideoInfo = serde_json::from_value(json!({
            "id": "abc",
            "formats": [
                {"format_id": "18", "ext": "mp4", "vcodec": "avc1", "height": 360, "filesize": null},
                {"format_id": "140", "ext": "m4a", "vcodec": "none"}
            ]
        }))
        .unwrap();

        assert!(info.thumbnail.is_none());
        assert_eq!(info.formats.len(), 2);
        assert_eq!(info.formats[0].height, Some(360));
        assert!(info.formats[0].filesize.is_none());
        assert!(info.formats[0].has_video());
        assert!(!info.formats[1].has_video());
    }

    #[test]
    fn test_missing_vcodec_counts_as_no_video() {
        let format = Format {
            format_id: "x".to_string(),
            ..Default::default()
        };
        assert!(!format.has_video());
    }

    #[test]
    fn test_unknown_resolution_serializes_as_string() {
        let option = FormatOption {
            format_id: "hls-1".to_string(),
            resolution: None,
            ext: "mp4".to_string(),
            filesize: None,
        };
        let value = serde_json::to_value(&option).unwrap();
        assert_eq!(value["resolution"], "Unknown");
        assert!(value["filesize"].is_null());
    }

    #[test]
    fn test_format_selector_falls_back_to_best() {
        let request = DownloadRequest {
            url: "https://example.com/v".to_string(),
            format_id: "137".to_string(),
            output_dir: PathBuf::from("/tmp"),
            config: DownloadConfig::default(),
        };
        assert_eq!(request.format_selector(), "137+bestaudio/best");
    }
}
