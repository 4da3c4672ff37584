//! Project overview:
//! - Content-addressed block storage: files are cut into fixed-size blocks named by their SHA-256
//! - Blocks are sharded over block-store nodes with a consistent-hash ring that tolerates down nodes
//! - A client-side reconciliation pass keeps a local directory in step with a versioned remote index
//!
//! Key behaviors:
//! - Sync: local scan + local index + remote index are diffed; local-only changes are uploaded and
//!   committed with an optimistic version check, remote changes are downloaded and always win
//! - Deletion is recorded as a tombstone version, not as absence
//! - Conflicts (a stale version rejected by the remote) resolve to the remote's winning version
//!
//! The metadata service and the block transport are consumed through the `RemoteIndex` and
//! `BlockTransport` traits; in-process implementations live in `backends::memory`.
pub mod backends;
pub mod block;
pub mod blockstore;
pub mod index;
pub mod meta;
pub mod ring;
pub mod sync;

pub use backends::{BlockCluster, BlockTransport, LocalBackend, MetaStore, RemoteIndex, SyncError};
pub use block::{hash_bytes, Block};
pub use blockstore::BlockStore;
pub use index::{LocalIndex, INDEX_FILE_NAME};
pub use meta::{BlockList, FileMetaData, UpdateOutcome};
pub use ring::HashRing;
pub use sync::{sync, Placement, SyncOptions, SyncReport};
