//! The client's persisted view of the last state agreed with the server.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::backends::SyncError;
use crate::meta::FileMetaData;

/// Reserved file name of the local index inside the base directory.
pub const INDEX_FILE_NAME: &str = "index.txt";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalIndex {
    pub files: BTreeMap<String, FileMetaData>,
}

impl LocalIndex {
    pub fn path(base_dir: &Path) -> PathBuf {
        base_dir.join(INDEX_FILE_NAME)
    }

    /// Loads the index from `base_dir`, creating an empty index file if none exists.
    pub fn load(base_dir: &Path) -> Result<Self, SyncError> {
        let path = Self::path(base_dir);
        if !path.exists() {
            info!("Creating {}", path.display());
            fs::File::create(&path)?;
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(&path)?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        let index: Self = serde_json::from_str(&raw)?;
        debug!("Loaded {} entries from {}", index.files.len(), path.display());
        Ok(index)
    }

    /// Rewrites the whole index through a temp file renamed over the old one.
    pub fn save(&self, base_dir: &Path) -> Result<(), SyncError> {
        let path = Self::path(base_dir);
        let mut tmp = tempfile::NamedTempFile::new_in(base_dir)?;
        serde_json::to_writer_pretty(&mut tmp, self)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| SyncError::Io(e.error))?;
        debug!("Wrote {} entries to {}", self.files.len(), path.display());
        Ok(())
    }

    pub fn get(&self, filename: &str) -> Option<&FileMetaData> {
        self.files.get(filename)
    }

    pub fn insert(&mut self, meta: FileMetaData) {
        self.files.insert(meta.filename.clone(), meta);
    }
}
