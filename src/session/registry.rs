//! Process-wide map from download id to its progress channel

use crate::downloader::ProgressEvent;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};
use uuid::Uuid;

/// Registry of in-flight download sessions.
///
/// Every map operation takes the lock for the operation only; nothing
/// awaits while holding it.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
    buffer: usize,
}

struct SessionEntry {
    sender: broadcast::Sender<ProgressEvent>,
    /// Receiver created with the channel so events pushed before the browser
    /// connects are kept. Handed to the first subscriber.
    pending: Option<broadcast::Receiver<ProgressEvent>>,
}

impl SessionRegistry {
    /// Create a registry whose channels buffer `buffer` events each
    pub fn new(buffer: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            buffer: buffer.max(1),
        }
    }

    /// Register a new session with an empty channel.
    ///
    /// The returned handle removes the entry when dropped.
    pub fn open(self: &Arc<Self>) -> DownloadSession {
        let id = Uuid::new_v4();
        let (sender, receiver) = broadcast::channel(self.buffer);

        self.sessions.lock().insert(
            id,
            SessionEntry {
                sender: sender.clone(),
                pending: Some(receiver),
            },
        );
        debug!("Registered session {}", id);

        DownloadSession {
            id,
            sender: ProgressSender { inner: sender },
            registry: Arc::clone(self),
        }
    }

    /// Attach a reader to a session, `None` if the id is unknown
    pub fn subscribe(&self, id: &Uuid) -> Option<ProgressReceiver> {
        let mut sessions = self.sessions.lock();
        let entry = sessions.get_mut(id)?;

        let inner = match entry.pending.take() {
            Some(receiver) => receiver,
            None => {
                debug!("Session {} already observed, attaching a live receiver", id);
                entry.sender.subscribe()
            }
        };
        debug!("Subscribed to session {}", id);

        Some(ProgressReceiver { inner })
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.sessions.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    fn remove(&self, id: &Uuid) -> bool {
        self.sessions.lock().remove(id).is_some()
    }
}

/// Writer side of a registered session, owned by the background task.
pub struct DownloadSession {
    id: Uuid,
    sender: ProgressSender,
    registry: Arc<SessionRegistry>,
}

impl DownloadSession {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Cloneable handle for code that only needs to push events
    pub fn sender(&self) -> ProgressSender {
        self.sender.clone()
    }

    pub fn push(&self, event: ProgressEvent) {
        self.sender.push(event);
    }
}

impl Drop for DownloadSession {
    fn drop(&mut self) {
        if self.registry.remove(&self.id) {
            debug!("Removed session {}", self.id);
        } else {
            warn!("Session {} was already gone from the registry", self.id);
        }
    }
}

/// Non-blocking event producer.
///
/// A full channel overwrites its oldest event, so a slow reader loses
/// intermediate progress but still gets the final event.
#[derive(Clone)]
pub struct ProgressSender {
    inner: broadcast::Sender<ProgressEvent>,
}

impl ProgressSender {
    pub fn push(&self, event: ProgressEvent) {
        // No live receiver means nobody is watching; the event is discarded.
        let _ = self.inner.send(event);
    }
}

/// Reader side handed to the progress stream
pub struct ProgressReceiver {
    inner: broadcast::Receiver<ProgressEvent>,
}

impl ProgressReceiver {
    /// Wait up to `idle` for the next event.
    ///
    /// Returns `None` on idle timeout or when the session ended without
    /// anything left to read.
    pub async fn next_event(&mut self, idle: Duration) -> Option<ProgressEvent> {
        loop {
            match tokio::time::timeout(idle, self.inner.recv()).await {
                Ok(Ok(event)) => return Some(event),
                Ok(Err(RecvError::Lagged(skipped))) => {
                    debug!("Progress reader lagged, skipped {} updates", skipped);
                }
                Ok(Err(RecvError::Closed)) => return None,
                Err(_) => {
                    debug!("Progress reader idle for {:?}", idle);
                    return None;
                }
            }
        }
    }
}
