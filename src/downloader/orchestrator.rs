//! Starts background downloads and relays their outcome to the session

use crate::downloader::ProgressEvent;
use crate::extractor::{DownloadRequest, Extractor};
use crate::session::{DownloadSession, SessionRegistry};
use crate::utils::config::DownloadConfig;
use crate::utils::error::VidfetchError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Runs one background task per accepted download
pub struct DownloadOrchestrator {
    extractor: Arc<dyn Extractor>,
    registry: Arc<SessionRegistry>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    output_dir: PathBuf,
    config: DownloadConfig,
}

impl DownloadOrchestrator {
    pub fn new(
        extractor: Arc<dyn Extractor>,
        registry: Arc<SessionRegistry>,
        output_dir: PathBuf,
        config: DownloadConfig,
        max_concurrent: usize,
    ) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            extractor,
            registry,
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
            output_dir,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Downloads currently holding a slot
    pub fn active_downloads(&self) -> usize {
        self.max_concurrent - self.permits.available_permits()
    }

    /// Register a session and start downloading in the background.
    ///
    /// Returns as soon as the task is spawned; must be called from within a
    /// Tokio runtime. Fails with `Busy` when every slot is taken.
    pub fn start_download(&self, url: &str, format_id: &str) -> Result<Uuid, VidfetchError> {
        let url = url.trim();
        let format_id = format_id.trim();
        if url.is_empty() || format_id.is_empty() {
            return Err(VidfetchError::invalid_input("Invalid request"));
        }

        let permit = Arc::clone(&self.permits).try_acquire_owned().map_err(|_| {
            warn!(
                "Rejecting download of {}: {} downloads already running",
                url, self.max_concurrent
            );
            VidfetchError::Busy
        })?;

        let session = self.registry.open();
        let id = session.id();
        let request = DownloadRequest {
            url: url.to_string(),
            format_id: format_id.to_string(),
            output_dir: self.output_dir.clone(),
            config: self.config.clone(),
        };

        tokio::spawn(supervise(
            session,
            Arc::clone(&self.extractor),
            request,
            permit,
        ));

        info!("Started download {} for {} (format {})", id, url, format_id);
        Ok(id)
    }
}

/// Run the download on its own task so a panic is observed, push exactly one
/// terminal event, then drop the session (removing it from the registry).
async fn supervise(
    session: DownloadSession,
    extractor: Arc<dyn Extractor>,
    request: DownloadRequest,
    _permit: OwnedSemaphorePermit,
) {
    let id = session.id();
    let progress = session.sender();

    let worker = tokio::spawn(async move { extractor.download(&request, &progress).await });

    let terminal = match worker.await {
        Ok(Ok(path)) => match download_url_for(&path) {
            Some(url) => {
                info!("Download {} complete: {}", id, path.display());
                ProgressEvent::complete(url)
            }
            None => {
                error!("Download {} produced an unusable path: {:?}", id, path);
                ProgressEvent::error(
                    VidfetchError::DownloadFailed("Output file name is not valid UTF-8".to_string())
                        .to_string(),
                )
            }
        },
        Ok(Err(e)) => {
            error!("Download {} failed: {:#}", id, e);
            ProgressEvent::error(VidfetchError::DownloadFailed(format!("{:#}", e)).to_string())
        }
        Err(e) => {
            error!("Download task {} crashed: {}", id, e);
            ProgressEvent::error("Download task crashed")
        }
    };

    session.push(terminal);
}

/// Relative URL the browser fetches the finished file from
pub fn download_url_for(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    Some(format!("/downloads/{}", urlencoding::encode(name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::VideoInfo;
    use crate::session::ProgressSender;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    const IDLE: Duration = Duration::from_secs(2);

    /// Reports two progress steps, then waits for `release` before finishing
    struct GatedExtractor {
        release: Arc<Notify>,
        outcome: Outcome,
    }

    #[derive(Clone, Copy)]
    enum Outcome {
        Success,
        Failure,
        Panic,
    }

    #[async_trait]
    impl Extractor for GatedExtractor {
        fn id(&self) -> &'static str {
            "gated"
        }

        async fn extract_info(&self, _url: &str) -> Result<VideoInfo> {
            Ok(VideoInfo::default())
        }

        async fn download(&self, request: &DownloadRequest, progress: &ProgressSender) -> Result<PathBuf> {
            progress.push(ProgressEvent::downloading("50.0%", "1.00MiB/s", "00:01"));
            self.release.notified().await;
            match self.outcome {
                Outcome::Success => Ok(request.output_dir.join("My Clip.mp4")),
                Outcome::Failure => Err(anyhow!("ERROR: Requested format is not available")),
                Outcome::Panic => panic!("extractor bug"),
            }
        }
    }

    fn orchestrator(outcome: Outcome, max: usize) -> (DownloadOrchestrator, Arc<Notify>) {
        let release = Arc::new(Notify::new());
        let extractor = Arc::new(GatedExtractor {
            release: Arc::clone(&release),
            outcome,
        });
        let orchestrator = DownloadOrchestrator::new(
            extractor,
            Arc::new(SessionRegistry::new(16)),
            PathBuf::from("/srv/downloads"),
            DownloadConfig::default(),
            max,
        );
        (orchestrator, release)
    }

    async fn wait_until_removed(registry: &SessionRegistry, id: &Uuid) {
        for _ in 0..100 {
            if !registry.contains(id) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session {} was never removed", id);
    }

    #[tokio::test]
    async fn test_empty_inputs_are_rejected_without_session() {
        let (orch, _release) = orchestrator(Outcome::Success, 2);

        assert!(matches!(
            orch.start_download("", "137"),
            Err(VidfetchError::InvalidInput(_))
        ));
        assert!(matches!(
            orch.start_download("https://example.com/v", "  "),
            Err(VidfetchError::InvalidInput(_))
        ));
        assert!(orch.registry().is_empty());
        assert_eq!(orch.active_downloads(), 0);
    }

    #[tokio::test]
    async fn test_success_pushes_complete_then_removes_session() {
        let (orch, release) = orchestrator(Outcome::Success, 2);
        let id = orch.start_download("https://example.com/v", "137").unwrap();
        assert!(orch.registry().contains(&id));

        let mut rx = orch.registry().subscribe(&id).unwrap();
        let first = rx.next_event(IDLE).await.unwrap();
        assert_eq!(first, ProgressEvent::downloading("50.0%", "1.00MiB/s", "00:01"));
        assert!(orch.registry().contains(&id));

        release.notify_one();
        let last = rx.next_event(IDLE).await.unwrap();
        assert_eq!(last, ProgressEvent::complete("/downloads/My%20Clip.mp4"));

        wait_until_removed(orch.registry(), &id).await;
        assert!(rx.next_event(IDLE).await.is_none());
    }

    #[tokio::test]
    async fn test_failure_pushes_error_event() {
        let (orch, release) = orchestrator(Outcome::Failure, 2);
        let id = orch.start_download("https://example.com/v", "999").unwrap();
        let mut rx = orch.registry().subscribe(&id).unwrap();
        release.notify_one();

        let mut terminal = None;
        while let Some(event) = rx.next_event(IDLE).await {
            if event.is_terminal() {
                terminal = Some(event);
                break;
            }
        }
        assert_eq!(
            terminal,
            Some(ProgressEvent::error("ERROR: Requested format is not available"))
        );
        wait_until_removed(orch.registry(), &id).await;
    }

    #[tokio::test]
    async fn test_panic_still_reports_and_removes() {
        let (orch, release) = orchestrator(Outcome::Panic, 2);
        let id = orch.start_download("https://example.com/v", "137").unwrap();
        let mut rx = orch.registry().subscribe(&id).unwrap();
        release.notify_one();

        let mut events = Vec::new();
        while let Some(event) = rx.next_event(IDLE).await {
            events.push(event);
        }
        assert_eq!(events.last(), Some(&ProgressEvent::error("Download task crashed")));
        wait_until_removed(orch.registry(), &id).await;
        assert_eq!(orch.active_downloads(), 0);
    }

    #[tokio::test]
    async fn test_admission_limit_rejects_when_full() {
        let (orch, release) = orchestrator(Outcome::Success, 1);
        let first = orch.start_download("https://example.com/a", "137").unwrap();
        assert_eq!(orch.active_downloads(), 1);

        let second = orch.start_download("https://example.com/b", "137");
        assert!(matches!(second, Err(VidfetchError::Busy)));
        assert_eq!(orch.registry().len(), 1);

        release.notify_one();
        wait_until_removed(orch.registry(), &first).await;
        for _ in 0..100 {
            if orch.active_downloads() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(orch.start_download("https://example.com/b", "137").is_ok());
    }

    #[test]
    fn test_download_url_encodes_name() {
        let url = download_url_for(Path::new("/srv/downloads/Rock & Roll #1.mp4")).unwrap();
        assert_eq!(url, "/downloads/Rock%20%26%20Roll%20%231.mp4");
        assert!(download_url_for(Path::new("/")).is_none());
    }
}
