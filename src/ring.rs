//! Consistent-hash placement of blocks onto block-store nodes.
//!
//! Each node sits on the ring at the hex SHA-256 of its address. A block is
//! owned by the first node whose position is `>=` the block hash, wrapping
//! around to the smallest position. Hex digests have a fixed length, so
//! plain string ordering is the ring order.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::backends::SyncError;
use crate::block::hash_bytes;

const NODE_PREFIX: &str = "blockstore";

/// Address of the `index`-th block-store node.
pub fn node_name(index: usize) -> String {
    format!("{NODE_PREFIX}{index}")
}

/// Inverse of [`node_name`].
pub fn node_index(addr: &str) -> Option<usize> {
    addr.strip_prefix(NODE_PREFIX)?.parse().ok()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashRing {
    /// ring position -> server address
    server_map: BTreeMap<String, String>,
}

impl HashRing {
    /// Ring over `blockstore0..blockstore{num_servers-1}` with the nodes in
    /// `down_servers` left out.
    pub fn new(num_servers: usize, down_servers: &[usize]) -> Self {
        let mut ring = Self::default();
        for i in 0..num_servers {
            ring.insert_server(&node_name(i));
        }
        for &i in down_servers {
            ring.delete_server(&node_name(i));
        }
        ring
    }

    pub fn from_nodes<I, S>(addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ring = Self::default();
        for addr in addrs {
            ring.insert_server(addr.as_ref());
        }
        ring
    }

    /// Ring position of a server address.
    pub fn position(addr: &str) -> String {
        hash_bytes(addr.as_bytes())
    }

    pub fn insert_server(&mut self, addr: &str) {
        self.server_map.insert(Self::position(addr), addr.to_string());
    }

    pub fn delete_server(&mut self, addr: &str) {
        self.server_map.remove(&Self::position(addr));
    }

    pub fn is_empty(&self) -> bool {
        self.server_map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.server_map.len()
    }

    /// Server addresses in ring order.
    pub fn servers(&self) -> impl Iterator<Item = &str> {
        self.server_map.values().map(String::as_str)
    }

    /// Server owning `block_hash`. Querying an empty ring is a configuration error.
    pub fn responsible_server(&self, block_hash: &str) -> Result<&str, SyncError> {
        self.server_map
            .range::<str, _>((Bound::Included(block_hash), Bound::Unbounded))
            .next()
            .or_else(|| self.server_map.iter().next())
            .map(|(_, addr)| addr.as_str())
            .ok_or_else(|| {
                SyncError::Configuration(
                    "hash ring is empty: every block-store node is down".to_string(),
                )
            })
    }

    /// Responsible server for each hash, in input order.
    pub fn assign(&self, block_hashes: &[String]) -> Result<Vec<String>, SyncError> {
        block_hashes
            .iter()
            .map(|h| self.responsible_server(h).map(str::to_string))
            .collect()
    }
}
