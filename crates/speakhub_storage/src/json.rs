//! JSON file channel store.

use crate::{ChannelStore, StorageConfig};
use serde::{Deserialize, Serialize};
use speakhub_core::ManagedChannel;
use speakhub_error::{StorageError, StorageErrorKind};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    channels: Vec<ManagedChannel>,
}

/// Stores managed channels in a single JSON document.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-write leaves the previous snapshot intact.
pub struct JsonChannelStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonChannelStore {
    /// Create a store backed by `path`. The file is created on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a store from the `[storage]` section.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.path().clone())
    }

    /// Backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl ChannelStore for JsonChannelStore {
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Vec<ManagedChannel>, StorageError> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No channel store on disk yet");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(StorageError::new(StorageErrorKind::FileRead(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                ))));
            }
        };

        let file: StoreFile = serde_json::from_slice(&data).map_err(|e| {
            StorageError::new(StorageErrorKind::Serialization(format!(
                "{}: {}",
                self.path.display(),
                e
            )))
        })?;

        if file.version != FORMAT_VERSION {
            return Err(StorageError::new(StorageErrorKind::Serialization(format!(
                "{}: unsupported format version {}",
                self.path.display(),
                file.version
            ))));
        }

        tracing::info!(count = file.channels.len(), "Loaded managed channels");
        Ok(file.channels)
    }

    #[tracing::instrument(skip(self, channels), fields(path = %self.path.display(), count = channels.len()))]
    async fn save(&self, channels: &[ManagedChannel]) -> Result<(), StorageError> {
        let file = StoreFile {
            version: FORMAT_VERSION,
            channels: channels.to_vec(),
        };
        let data = serde_json::to_vec_pretty(&file)
            .map_err(|e| StorageError::new(StorageErrorKind::Serialization(e.to_string())))?;

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                    "{}: {}",
                    parent.display(),
                    e
                )))
            })?;
        }

        let temp_path = self.temp_path();
        tokio::fs::write(&temp_path, &data).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "{}: {}",
                temp_path.display(),
                e
            )))
        })?;

        tokio::fs::rename(&temp_path, &self.path).await.map_err(|e| {
            StorageError::new(StorageErrorKind::FileWrite(format!(
                "rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            )))
        })?;

        tracing::debug!(size = data.len(), "Saved managed channels");
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "json"
    }
}
