//! File-backed key-value storage.
//!
//! All keys live in one JSON object file. Writes go to a sibling temporary file which is then
//! renamed over the existing file, so a crash mid-write leaves the previous contents in place.

use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use marketplace_cart::storage::{KeyValueStore, StorageError};
use tokio::{fs, sync::Mutex};
use tracing::debug;

type Entries = BTreeMap<String, String>;

/// Key-value storage kept in a single JSON file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Creates a store backed by the file at `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_entries(&self) -> Result<Entries, StorageError> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(error) => return Err(error.into()),
        };

        serde_json::from_str(&raw).map_err(|source| {
            StorageError::Backend(format!(
                "{} is not a JSON object of strings: {source}",
                self.path.display()
            ))
        })
    }

    async fn write_entries(&self, entries: &Entries) -> Result<(), StorageError> {
        let payload = serde_json::to_string_pretty(entries)
            .map_err(|source| StorageError::Backend(source.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }

        let staging = self.path.with_extension("tmp");

        fs::write(&staging, payload).await?;
        fs::rename(&staging, &self.path).await?;

        debug!(path = %self.path.display(), keys = entries.len(), "wrote storage file");

        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.read_entries().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.read_entries().await?;
        entries.insert(key.to_string(), value.to_string());

        self.write_entries(&entries).await
    }
}
