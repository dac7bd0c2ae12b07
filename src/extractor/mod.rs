pub mod formats;
pub mod models;
pub mod traits;
pub mod ytdlp;

pub use formats::{collect_formats, list_formats};
pub use models::{DownloadRequest, Format, FormatOption, VideoInfo, VideoMetadata};
pub use traits::Extractor;
pub use ytdlp::YtDlpExtractor;
