//! In-process metadata service and block-store cluster.
//!
//! These back the collaborator traits without a network hop, for embedding
//! and for exercising the sync engine end to end.

use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

use log::{debug, warn};

use super::{BlockTransport, RemoteIndex, SyncError};
use crate::block::Block;
use crate::blockstore::BlockStore;
use crate::meta::{FileMetaData, UpdateOutcome};
use crate::ring::node_name;

/// Versioned file index with optimistic concurrency on updates.
pub struct MetaStore {
    files: RwLock<BTreeMap<String, FileMetaData>>,
    block_store_addr: String,
}

impl MetaStore {
    pub fn new(block_store_addr: impl Into<String>) -> Self {
        Self {
            files: RwLock::new(BTreeMap::new()),
            block_store_addr: block_store_addr.into(),
        }
    }

    pub fn get(&self, filename: &str) -> Option<FileMetaData> {
        self.files
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(filename)
            .cloned()
    }
}

impl RemoteIndex for MetaStore {
    fn file_info_map(&self) -> Result<BTreeMap<String, FileMetaData>, SyncError> {
        Ok(self.files.read().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn block_store_addr(&self) -> Result<String, SyncError> {
        Ok(self.block_store_addr.clone())
    }

    fn update_file(&self, meta: &FileMetaData) -> Result<UpdateOutcome, SyncError> {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        let expected = files.get(&meta.filename).map(|m| m.version + 1);
        if let Some(expected) = expected {
            if meta.version != expected {
                warn!(
                    "rejecting {} v{}: expected v{}",
                    meta.filename, meta.version, expected
                );
                return Ok(UpdateOutcome::Conflict);
            }
        }
        debug!("accepted {} v{}", meta.filename, meta.version);
        files.insert(meta.filename.clone(), meta.clone());
        Ok(UpdateOutcome::Accepted(meta.version))
    }
}

/// A set of named block-store nodes, any of which can be marked down.
pub struct BlockCluster {
    nodes: BTreeMap<String, BlockStore>,
    down: RwLock<HashSet<String>>,
}

impl BlockCluster {
    /// Nodes `blockstore0..blockstore{num_servers-1}`.
    pub fn new(num_servers: usize) -> Self {
        Self::with_nodes((0..num_servers).map(node_name))
    }

    pub fn with_nodes<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: addrs
                .into_iter()
                .map(|a| (a.into(), BlockStore::new()))
                .collect(),
            down: RwLock::new(HashSet::new()),
        }
    }

    pub fn store(&self, addr: &str) -> Option<&BlockStore> {
        self.nodes.get(addr)
    }

    pub fn set_down(&self, addr: &str, down: bool) {
        let mut set = self.down.write().unwrap_or_else(|e| e.into_inner());
        if down {
            set.insert(addr.to_string());
        } else {
            set.remove(addr);
        }
    }

    fn node(&self, addr: &str) -> Result<&BlockStore, SyncError> {
        if self
            .down
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(addr)
        {
            return Err(SyncError::Transport(format!("{addr} is down")));
        }
        self.nodes
            .get(addr)
            .ok_or_else(|| SyncError::Transport(format!("unknown block store {addr}")))
    }
}

impl BlockTransport for BlockCluster {
    fn put_block(&self, block: &Block, addr: &str) -> Result<bool, SyncError> {
        self.node(addr)?.put_block(block);
        Ok(true)
    }

    fn get_block(&self, hash: &str, addr: &str) -> Result<Block, SyncError> {
        self.node(addr)?.get_block(hash)
    }

    fn has_blocks(&self, hashes: &[String], addr: &str) -> Result<Vec<String>, SyncError> {
        Ok(self.node(addr)?.has_blocks(hashes))
    }
}
