//! Background upload of captured photos.
//!
//! One job at a time. The job's file list is fixed when it starts; the worker
//! sends files one by one and publishes counters that the render loop reads
//! through [`UploadHandle::snapshot`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use slb::state::StateStore;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UploadProgress {
    pub in_progress: bool,
    pub total: usize,
    pub done: usize,
    pub failed: usize,
}

impl UploadProgress {
    /// Width of the filled part of a progress bar `width` pixels wide.
    pub fn bar_fill(&self, width: u32) -> u32 {
        if self.total == 0 {
            return 0;
        }
        (width as u64 * (self.done + self.failed) as u64 / self.total as u64) as u32
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    Started { total: usize },
    AlreadyRunning,
    NothingPending,
    Disabled,
}

#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, name: &str, body: Vec<u8>) -> Result<(), UploadError>;
}

/// Raw-body POST of one file per request.
pub struct HttpUploader {
    client: reqwest::Client,
    url: url::Url,
    filename_header: String,
}

impl HttpUploader {
    pub fn new(url: url::Url, filename_header: impl Into<String>) -> Result<Self, UploadError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url,
            filename_header: filename_header.into(),
        })
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, name: &str, body: Vec<u8>) -> Result<(), UploadError> {
        self.client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .header(self.filename_header.as_str(), name)
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

struct Shared {
    progress: UploadProgress,
    sent: BTreeSet<String>,
}

#[derive(Clone)]
pub struct UploadHandle {
    shared: Arc<Mutex<Shared>>,
    uploader: Option<Arc<dyn Uploader>>,
    store: StateStore,
    photo_dir: PathBuf,
    task_tracker: TaskTracker,
}

impl UploadHandle {
    /// `sent` is the set restored from the state file. Without an uploader
    /// every start is a no-op.
    pub fn new(
        uploader: Option<Arc<dyn Uploader>>,
        store: StateStore,
        photo_dir: PathBuf,
        sent: BTreeSet<String>,
        task_tracker: TaskTracker,
    ) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared {
                progress: UploadProgress::default(),
                sent,
            })),
            uploader,
            store,
            photo_dir,
            task_tracker,
        }
    }

    pub async fn snapshot(&self) -> UploadProgress {
        self.shared.lock().await.progress
    }

    pub async fn sent(&self) -> BTreeSet<String> {
        self.shared.lock().await.sent.clone()
    }

    /// Start a job over the photos not yet sent. The check and the claim
    /// happen under one lock, so two callers can never both start.
    pub async fn start(&self) -> StartOutcome {
        let Some(uploader) = self.uploader.clone() else {
            return StartOutcome::Disabled;
        };

        // listed outside the lock; snapshot() must not wait on directory I/O
        let photos = match list_photos(&self.photo_dir).await {
            Ok(photos) => photos,
            Err(e) => {
                warn!("couldn't list {}: {e}", self.photo_dir.display());
                Vec::new()
            }
        };

        let mut shared = self.shared.lock().await;
        if shared.progress.in_progress {
            return StartOutcome::AlreadyRunning;
        }
        let pending: Vec<PathBuf> = photos
            .into_iter()
            .filter(|p| file_name(p).is_some_and(|n| !shared.sent.contains(&n)))
            .collect();
        if pending.is_empty() {
            return StartOutcome::NothingPending;
        }

        let total = pending.len();
        shared.progress = UploadProgress {
            in_progress: true,
            total,
            done: 0,
            failed: 0,
        };
        drop(shared);

        info!("uploading {total} photo(s)");
        let handle = self.clone();
        self.task_tracker
            .spawn(async move { handle.run(uploader, pending).await });
        StartOutcome::Started { total }
    }

    async fn run(self, uploader: Arc<dyn Uploader>, pending: Vec<PathBuf>) {
        for path in pending {
            let Some(name) = file_name(&path) else {
                continue;
            };
            let result = match tokio::fs::read(&path).await {
                Ok(body) => uploader.upload(&name, body).await,
                Err(source) => Err(UploadError::Read {
                    path: path.clone(),
                    source,
                }),
            };

            let mut shared = self.shared.lock().await;
            match result {
                Ok(()) => {
                    shared.sent.insert(name);
                    shared.progress.done += 1;
                }
                Err(e) => {
                    warn!("upload of {name} failed: {e}");
                    shared.progress.failed += 1;
                }
            }
        }

        let mut shared = self.shared.lock().await;
        let sent = shared.sent.clone();
        if let Err(e) = self.store.update(|s| s.ai_camera_sent = sent).await {
            warn!("failed to persist upload state: {e}");
        }
        shared.progress.in_progress = false;
        info!(
            "upload finished: {} sent, {} failed",
            shared.progress.done, shared.progress.failed
        );
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

fn is_photo(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("jpg") || e.eq_ignore_ascii_case("jpeg"))
}

/// JPEG files directly inside `dir`, sorted by name. A missing directory has
/// no photos.
pub async fn list_photos(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let mut photos = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_photo(&path) {
            photos.push(path);
        }
    }
    photos.sort();
    Ok(photos)
}
