use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// File-backed key/value storage for state that must survive restarts
///
/// Each key is stored as `{dir}/{key}.json`. Writes go to a temporary file
/// that is renamed over the target, so a reader never sees a half-written
/// value. There is no transaction across keys.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    dir: PathBuf,
}

impl LocalStorage {
    /// Opens storage rooted at `dir`, creating the directory if needed
    pub fn open(dir: impl Into<PathBuf>) -> AppResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::Storage(format!("Failed to create {}: {}", dir.display(), e))
        })?;

        tracing::info!(dir = %dir.display(), "Local storage opened");

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Loads and deserializes the value stored under `key`
    ///
    /// Missing or empty files yield `Ok(None)`.
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> AppResult<Option<T>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| AppError::Storage(format!("Failed to read {}: {}", key, e)))?;

        if content.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| AppError::Storage(format!("Corrupt value for {}: {}", key, e)))
    }

    /// Serializes `value` and replaces whatever is stored under `key`
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        let json = serde_json::to_vec_pretty(value)
            .map_err(|e| AppError::Storage(format!("Failed to serialize {}: {}", key, e)))?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp_path, &path)
        };

        write().map_err(|e| AppError::Storage(format!("Failed to write {}: {}", key, e)))?;

        tracing::debug!(key = %key, bytes = json.len(), "Persisted local state");
        Ok(())
    }

    pub fn remove(&self, key: &str) -> AppResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AppError::Storage(format!("Failed to remove {}: {}", key, e))),
        }
    }
}
