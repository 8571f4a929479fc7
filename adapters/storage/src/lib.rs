#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! File backed save slot that stores learned tables and accuracy as JSON.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use beatshot_core::{SaveData, SaveSlot, StorageError};

/// Save slot persisted as a single pretty-printed JSON document.
///
/// Writes go to a sibling temporary file that is renamed over the target, so
/// a crash never leaves a half-written document behind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JsonFileSlot {
    path: PathBuf,
}

impl JsonFileSlot {
    /// Creates a slot stored at `path`. The file is created on first store.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the stored document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temporary_path(&self) -> PathBuf {
        self.path.with_extension("json.tmp")
    }
}

impl SaveSlot for JsonFileSlot {
    fn load(&self) -> Result<SaveData, StorageError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                log::debug!("no save file at {}, starting fresh", self.path.display());
                return Ok(SaveData::default());
            }
            Err(error) => return Err(error.into()),
        };
        serde_json::from_slice(&bytes).map_err(|error| StorageError::Malformed {
            reason: error.to_string(),
        })
    }

    fn store(&mut self, data: &SaveData) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(data).map_err(|error| StorageError::Malformed {
            reason: error.to_string(),
        })?;

        let temporary = self.temporary_path();
        fs::write(&temporary, json)?;
        fs::rename(&temporary, &self.path)?;
        log::info!("saved {} tables to {}", data.q_tables.len(), self.path.display());
        Ok(())
    }
}
