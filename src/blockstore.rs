//! Content-addressable block storage for a single node.

use std::collections::HashMap;
use std::sync::RwLock;

use log::debug;

use crate::backends::SyncError;
use crate::block::{hash_bytes, Block};

/// In-memory hash -> block map. Safe to share between request handlers.
#[derive(Debug, Default)]
pub struct BlockStore {
    blocks: RwLock<HashMap<String, Block>>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `block` under the hash of its data and returns that hash.
    /// The caller's `hash` field is ignored. Writing existing content again
    /// is a no-op; colliding content is overwritten.
    pub fn put_block(&self, block: &Block) -> String {
        let hash = hash_bytes(&block.data);
        let stored = Block {
            hash: hash.clone(),
            data: block.data.clone(),
            size: block.data.len(),
        };
        debug!("storing block {} ({} bytes)", hash, stored.size);
        self.blocks
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(hash.clone(), stored);
        hash
    }

    pub fn get_block(&self, hash: &str) -> Result<Block, SyncError> {
        self.blocks
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(hash)
            .cloned()
            .ok_or_else(|| SyncError::NotFound(hash.to_string()))
    }

    /// Subset of `hashes` present in the store, in input order.
    pub fn has_blocks(&self, hashes: &[String]) -> Vec<String> {
        let blocks = self.blocks.read().unwrap_or_else(|e| e.into_inner());
        hashes
            .iter()
            .filter(|h| blocks.contains_key(h.as_str()))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
