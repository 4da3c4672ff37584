pub mod local;
pub mod memory;

use std::collections::BTreeMap;

use crate::block::Block;
use crate::meta::{FileMetaData, UpdateOutcome};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("block not found: {0}")]
    NotFound(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("corrupt local index: {0}")]
    Index(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

/// The versioned metadata service holding the authoritative file index.
pub trait RemoteIndex: Send + Sync {
    fn file_info_map(&self) -> Result<BTreeMap<String, FileMetaData>, SyncError>;
    fn block_store_addr(&self) -> Result<String, SyncError>;
    /// Commits `meta` if its version is exactly one past the stored version
    /// (or the file is unknown).
    fn update_file(&self, meta: &FileMetaData) -> Result<UpdateOutcome, SyncError>;
}

/// Moves blocks to and from the block-store node at `addr`.
pub trait BlockTransport: Send + Sync {
    fn put_block(&self, block: &Block, addr: &str) -> Result<bool, SyncError>;
    fn get_block(&self, hash: &str, addr: &str) -> Result<Block, SyncError>;
    fn has_blocks(&self, hashes: &[String], addr: &str) -> Result<Vec<String>, SyncError>;
}

pub use local::LocalBackend;
pub use memory::{BlockCluster, MetaStore};
