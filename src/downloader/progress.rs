//! Progress events relayed to the browser

use serde::{Deserialize, Serialize};

/// Marker carried by a successful terminal event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Complete,
}

/// One message on a session's progress stream.
///
/// Serialized untagged so the browser sees `{percent, speed, eta}`,
/// `{status: "complete", download_url}` or `{error}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressEvent {
    Downloading {
        percent: String,
        speed: String,
        eta: String,
    },
    Complete {
        status: SessionStatus,
        download_url: String,
    },
    Error {
        error: String,
    },
}

impl ProgressEvent {
    /// Progress update from yt-dlp's human-readable fields
    pub fn downloading(
        percent: impl Into<String>,
        speed: impl Into<String>,
        eta: impl Into<String>,
    ) -> Self {
        Self::Downloading {
            percent: percent.into(),
            speed: speed.into(),
            eta: eta.into(),
        }
    }

    /// Successful end of a session
    pub fn complete(download_url: impl Into<String>) -> Self {
        Self::Complete {
            status: SessionStatus::Complete,
            download_url: download_url.into(),
        }
    }

    /// Failed end of a session
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// Terminal events end the session's stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_downloading_wire_shape() {
        let event = ProgressEvent::downloading("45.3%", "1.20MiB/s", "00:12");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"percent": "45.3%", "speed": "1.20MiB/s", "eta": "00:12"})
        );
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_complete_wire_shape() {
        let event = ProgressEvent::complete("/downloads/clip.mp4");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"status": "complete", "download_url": "/downloads/clip.mp4"})
        );
        assert!(event.is_terminal());
    }

    #[test]
    fn test_error_wire_shape() {
        let event = ProgressEvent::error("HTTP Error 403: Forbidden");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"error": "HTTP Error 403: Forbidden"}));
        assert!(event.is_terminal());
    }

    #[test]
    fn test_parse_back_picks_matching_variant() {
        let parsed: ProgressEvent =
            serde_json::from_str(r#"{"status":"complete","download_url":"/downloads/a.mp4"}"#)
                .unwrap();
        assert_eq!(parsed, ProgressEvent::complete("/downloads/a.mp4"));

        let parsed: ProgressEvent = serde_json::from_str(r#"{"error":"boom"}"#).unwrap();
        assert_eq!(parsed, ProgressEvent::error("boom"));
    }
}
