//! The small JSON document that survives restarts: page cursor, uploaded
//! photo names and the last captured photo.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to write state file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions_page: Option<usize>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub ai_camera_sent: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_camera_last_photo: Option<String>,
    /// Keys this build does not know about, kept so a rewrite never drops them.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Handle to the state file. Clones share one write lock, so updates from the
/// UI and from background tasks apply one after another.
#[derive(Clone, Debug)]
pub struct StateStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the document. A missing file is an empty document; an unreadable
    /// or malformed one is logged and also treated as empty.
    pub async fn load(&self) -> PersistedState {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return PersistedState::default(),
            Err(e) => {
                warn!("couldn't read state file {}: {e}", self.path.display());
                return PersistedState::default();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(state) => state,
            Err(e) => {
                warn!("state file {} is corrupt, starting fresh: {e}", self.path.display());
                PersistedState::default()
            }
        }
    }

    pub async fn save(&self, state: &PersistedState) -> Result<(), StateError> {
        let _guard = self.lock.lock().await;
        self.write(state).await
    }

    async fn write(&self, state: &PersistedState) -> Result<(), StateError> {
        let json = serde_json::to_vec_pretty(state)?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StateError::Write {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|source| StateError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Read-modify-write under the shared lock. Not atomic against other
    /// processes; this one is the only writer.
    pub async fn update(&self, f: impl FnOnce(&mut PersistedState)) -> Result<(), StateError> {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await;
        f(&mut state);
        self.write(&state).await
    }
}
