//! Background download orchestration

pub mod orchestrator;
pub mod progress;

// Re-export for convenience
pub use orchestrator::{download_url_for, DownloadOrchestrator};
pub use progress::{ProgressEvent, SessionStatus};
