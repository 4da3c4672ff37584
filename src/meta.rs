use serde::{Deserialize, Serialize};

/// Contents of a file version: its ordered block hashes, or a tombstone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockList {
    Present(Vec<String>),
    Deleted,
}

impl BlockList {
    /// Ordered hashes; empty for a tombstone.
    pub fn hashes(&self) -> &[String] {
        match self {
            BlockList::Present(hashes) => hashes,
            BlockList::Deleted => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetaData {
    pub filename: String,
    pub version: u64,
    pub blocks: BlockList,
}

impl FileMetaData {
    pub fn new(filename: impl Into<String>, version: u64, hashes: Vec<String>) -> Self {
        Self {
            filename: filename.into(),
            version,
            blocks: BlockList::Present(hashes),
        }
    }

    pub fn tombstone(filename: impl Into<String>, version: u64) -> Self {
        Self {
            filename: filename.into(),
            version,
            blocks: BlockList::Deleted,
        }
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.blocks, BlockList::Deleted)
    }

    pub fn block_hashes(&self) -> &[String] {
        self.blocks.hashes()
    }
}

/// Result of an optimistic metadata update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update was stored; carries the version now held remotely.
    Accepted(u64),
    /// Another writer got there first.
    Conflict,
}
