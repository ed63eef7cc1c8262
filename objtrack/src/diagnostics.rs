//! Diagnostics capture sessions.
//!
//! A pass-through layer over an external [`DiagnosticsStore`]. Stopping a
//! session yields a capture file; [`DiagnosticsCapture`] queues those files
//! and uploads them on request, deleting each file once it is uploaded.
//! Failed uploads stay queued as long as the file still exists.

use std::collections::VecDeque;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use chrono::Local;
use thiserror::Error;

/// Boxed future returned by store methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum DiagnosticsError {
    #[error("Diagnostics store error: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// External capture and upload service.
pub trait DiagnosticsStore: Send + Sync {
    /// Begin recording. Data from an unstopped earlier session is discarded.
    fn start_session(&self) -> Result<(), DiagnosticsError>;

    /// Finish recording, returning the capture file if one was written.
    fn stop_session(&self) -> StoreFuture<'_, Option<PathBuf>>;

    /// Upload a capture file. `true` on success.
    fn upload(&self, path: PathBuf) -> StoreFuture<'_, bool>;
}

/// Whether capture is switched on by the presence of a sentinel file.
pub fn capture_enabled(directory: &Path, sentinel_filename: &str) -> bool {
    directory.join(sentinel_filename).exists()
}

/// Session bookkeeping and upload queue.
pub struct DiagnosticsCapture {
    store: Arc<dyn DiagnosticsStore>,
    pending: VecDeque<PathBuf>,
    session_active: bool,
}

impl DiagnosticsCapture {
    pub fn new(store: Arc<dyn DiagnosticsStore>) -> Self {
        Self {
            store,
            pending: VecDeque::new(),
            session_active: false,
        }
    }

    pub fn is_session_active(&self) -> bool {
        self.session_active
    }

    /// Capture files waiting for upload, oldest first.
    pub fn pending(&self) -> impl Iterator<Item = &PathBuf> {
        self.pending.iter()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn start_session(&mut self) -> Result<(), DiagnosticsError> {
        tracing::info!("Starting diagnostics session");
        self.store.start_session()?;
        self.session_active = true;
        Ok(())
    }

    /// Stop the session and queue its capture file.
    pub async fn stop_session(&mut self) -> Option<PathBuf> {
        tracing::info!("Stopping diagnostics session");
        let path = self.store.stop_session().await;
        self.session_active = false;

        match &path {
            Some(p) if !p.as_os_str().is_empty() => {
                tracing::info!(path = %p.display(), "Diagnostics captured");
                self.pending.push_back(p.clone());
            }
            _ => tracing::debug!("Diagnostics session produced no file"),
        }
        path
    }

    /// Upload every queued file. Returns whether any upload succeeded.
    pub async fn upload_pending(&mut self) -> bool {
        let mut uploaded = false;
        let mut failed = VecDeque::new();

        while let Some(path) = self.pending.pop_front() {
            if self.store.upload(path.clone()).await {
                tracing::info!(path = %path.display(), "Diagnostics uploaded");
                if let Err(err) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(path = %path.display(), error = %err, "Failed to delete uploaded diagnostics");
                }
                uploaded = true;
            } else {
                tracing::warn!(path = %path.display(), "Diagnostics upload failed");
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    failed.push_back(path);
                }
            }
        }

        self.pending = failed;
        tracing::info!(
            uploaded,
            remaining = self.pending.len(),
            "Diagnostics upload complete"
        );
        uploaded
    }
}

/// Store that writes session files into a directory and "uploads" them by
/// copying into an `uploaded/` subdirectory.
#[derive(Debug)]
pub struct DirectoryStore {
    directory: PathBuf,
    current: parking_lot::Mutex<Option<PathBuf>>,
}

impl DirectoryStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            current: parking_lot::Mutex::new(None),
        }
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.directory.join("uploaded")
    }
}

impl DiagnosticsStore for DirectoryStore {
    fn start_session(&self) -> Result<(), DiagnosticsError> {
        std::fs::create_dir_all(&self.directory)?;
        let name = format!("session-{}.log", Local::now().format("%Y%m%d-%H%M%S%.3f"));
        let path = self.directory.join(name);
        std::fs::write(&path, format!("started {}\n", Local::now().to_rfc3339()))?;
        *self.current.lock() = Some(path);
        Ok(())
    }

    fn stop_session(&self) -> StoreFuture<'_, Option<PathBuf>> {
        Box::pin(async move { self.current.lock().take() })
    }

    fn upload(&self, path: PathBuf) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let Some(name) = path.file_name() else {
                return false;
            };
            let target_dir = self.upload_dir();
            if tokio::fs::create_dir_all(&target_dir).await.is_err() {
                return false;
            }
            tokio::fs::copy(&path, target_dir.join(name)).await.is_ok()
        })
    }
}
