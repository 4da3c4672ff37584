use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::PathBuf;

use log::warn;
use regex::Regex;
use walkdir::WalkDir;

use super::SyncError;
use crate::block::{chunk_reader, Chunks};
use crate::index::INDEX_FILE_NAME;

/// The synchronized base directory on local disk.
/// Only regular files directly inside the directory take part in a sync.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Names of the regular files in the base directory, sorted, without the
    /// local index, non-UTF-8 names and anything matching `exclude`.
    pub fn list_files(&self, exclude: Option<&Regex>) -> Result<Vec<String>, SyncError> {
        let mut names = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| SyncError::Other(format!("WalkDir error: {e}")))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                warn!("skipping {}: file name is not valid UTF-8", entry.path().display());
                continue;
            };
            if name == INDEX_FILE_NAME {
                continue;
            }
            if exclude.map(|re| re.is_match(&name)).unwrap_or(false) {
                continue;
            }
            names.push(name);
        }
        names.sort();
        Ok(names)
    }

    /// Streams the file in `block_size` chunks.
    pub fn blocks(&self, name: &str, block_size: usize) -> Result<Chunks<fs::File>, SyncError> {
        let file = fs::File::open(self.path_of(name))?;
        Ok(chunk_reader(file, block_size))
    }

    /// Truncates (or creates) the file for writing.
    pub fn create(&self, name: &str) -> Result<fs::File, SyncError> {
        Ok(fs::File::create(self.path_of(name))?)
    }

    pub fn get(&self, name: &str) -> Result<Vec<u8>, SyncError> {
        let mut file = fs::File::open(self.path_of(name))?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn put(&self, name: &str, data: &[u8]) -> Result<(), SyncError> {
        let mut file = self.create(name)?;
        file.write_all(data)?;
        Ok(())
    }

    /// Removes a file; a file that is already gone is not an error.
    pub fn delete(&self, name: &str) -> Result<(), SyncError> {
        match fs::remove_file(self.path_of(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }
}
