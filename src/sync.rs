//! One reconciliation pass between a local directory and the remote index.
//!
//! Three views of every file are compared: the local directory, the local
//! index (the last state agreed with the server) and the remote index.
//!
//! - Local-only changes are uploaded block by block and committed with an
//!   optimistic version check (`indexed version + 1`).
//! - When the remote entry differs from the local index, the remote wins:
//!   any pending local change is dropped and the remote version is
//!   downloaded, or the local file removed for a tombstone.
//! - A commit rejected as a conflict is resolved by downloading whatever
//!   version won.
//!
//! Passes are sequential and must not overlap on the same directory. Local
//! I/O and transport errors abort the pass before the index is rewritten.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use regex::Regex;

use crate::backends::{BlockTransport, LocalBackend, RemoteIndex, SyncError};
use crate::index::LocalIndex;
use crate::meta::{BlockList, FileMetaData, UpdateOutcome};
use crate::ring::HashRing;

/// Default block size: 4 KiB
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Where blocks are sent.
#[derive(Debug, Clone, Default)]
pub enum Placement {
    /// Every block goes to the single address the remote index hands out
    /// at the start of the pass.
    #[default]
    Session,
    /// Each block goes to the node owning its hash on the ring.
    Ring(HashRing),
}

pub struct SyncOptions<'a> {
    pub block_size: usize,
    pub placement: Placement,
    /// Ask the store which blocks it already holds and upload only the rest.
    pub skip_present_blocks: bool,
    pub exclude: Option<&'a Regex>,
    pub no_progress: bool,
}

impl Default for SyncOptions<'_> {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            placement: Placement::Session,
            skip_present_blocks: false,
            exclude: None,
            no_progress: true,
        }
    }
}

/// What a pass did, by file name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub uploaded: Vec<String>,
    pub downloaded: Vec<String>,
    pub deleted_local: Vec<String>,
    pub deleted_remote: Vec<String>,
    pub conflicts: Vec<String>,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

/// Runs one reconciliation pass over `base_dir`.
pub fn sync(
    base_dir: &Path,
    remote: &dyn RemoteIndex,
    transport: &dyn BlockTransport,
    options: &SyncOptions,
) -> Result<SyncReport, SyncError> {
    if options.block_size == 0 {
        return Err(SyncError::Configuration(
            "block size must be non-zero".to_string(),
        ));
    }
    if let Placement::Ring(ring) = &options.placement {
        if ring.is_empty() {
            return Err(SyncError::Configuration(
                "hash ring has no live block stores".to_string(),
            ));
        }
    }

    let local = LocalBackend::new(base_dir);

    info!("Scanning {}", base_dir.display());
    let file_map = scan(&local, options)?;

    info!("Loading local index");
    let mut index = LocalIndex::load(base_dir)?;

    let mut modified = local_changes(&file_map, &index, options.exclude);
    debug!("{} local change(s) pending", modified.len());

    info!("Fetching remote index");
    let remote_map = remote.file_info_map()?;
    let session_addr = remote.block_store_addr()?;
    debug!("block store address for this pass: {session_addr}");

    let mut pass = Pass {
        local,
        transport,
        options,
        session_addr,
        report: SyncReport::default(),
        pb: progress_bar(options.no_progress, remote_map.len() + modified.len())?,
    };

    info!("Reconciling {} remote entries", remote_map.len());
    for (name, remote_meta) in &remote_map {
        pass.tick(name);
        if is_excluded(options.exclude, name) {
            continue;
        }
        let known = index
            .get(name)
            .map(|known| (known.blocks == remote_meta.blocks, known.version));
        match known {
            Some((true, known_version)) => {
                // Same content under a newer version. A pending local change
                // keeps its indexed version and loses in the commit below.
                if remote_meta.version > known_version && !modified.contains_key(name) {
                    index.insert(remote_meta.clone());
                }
            }
            _ => {
                if modified.remove(name).is_some() {
                    debug!("dropping local change to {name}: remote is ahead");
                }
                pass.apply_remote(remote_meta)?;
                index.insert(remote_meta.clone());
            }
        }
    }

    pass.set_total(remote_map.len() + modified.len());

    info!("Pushing {} local change(s)", modified.len());
    for (name, mut meta) in modified {
        pass.tick(&name);
        if let BlockList::Present(_) = meta.blocks {
            match pass.upload(&name)? {
                Some(hashes) => meta.blocks = BlockList::Present(hashes),
                None => continue,
            }
        }

        match remote.update_file(&meta)? {
            UpdateOutcome::Accepted(version) => {
                info!("committed {name} v{version}");
                meta.version = version;
                if meta.is_deleted() {
                    pass.report.deleted_remote.push(name.clone());
                } else {
                    pass.report.uploaded.push(name.clone());
                }
                index.insert(meta);
            }
            UpdateOutcome::Conflict => {
                warn!("conflict on {name} v{}: taking the remote version", meta.version);
                pass.report.conflicts.push(name.clone());
                let latest = remote.file_info_map()?;
                match latest.get(&name) {
                    Some(winner) => {
                        pass.apply_remote(winner)?;
                        index.insert(winner.clone());
                    }
                    None => warn!("{name} vanished from the remote index after a conflict"),
                }
            }
        }
    }

    if let Some(pb) = pass.pb.as_ref() {
        pb.finish_with_message("Sync complete");
    }

    info!("Writing local index");
    index.save(base_dir)?;
    Ok(pass.report)
}

/// Ordered block hashes of every file in the base directory.
fn scan(
    local: &LocalBackend,
    options: &SyncOptions,
) -> Result<BTreeMap<String, Vec<String>>, SyncError> {
    let mut file_map = BTreeMap::new();
    for name in local.list_files(options.exclude)? {
        let hashes = local
            .blocks(&name, options.block_size)?
            .map(|block| block.map(|b| b.hash))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("{name}: {} block(s)", hashes.len());
        file_map.insert(name, hashes);
    }
    Ok(file_map)
}

fn is_excluded(exclude: Option<&Regex>, name: &str) -> bool {
    exclude.map(|re| re.is_match(name)).unwrap_or(false)
}

/// New, modified and deleted files relative to the local index.
/// Excluded names never produce a change, in particular never a tombstone.
fn local_changes(
    file_map: &BTreeMap<String, Vec<String>>,
    index: &LocalIndex,
    exclude: Option<&Regex>,
) -> BTreeMap<String, FileMetaData> {
    let mut modified = BTreeMap::new();
    for (name, hashes) in file_map {
        let version = match index.get(name) {
            None => 1,
            Some(known) if known.blocks != BlockList::Present(hashes.clone()) => known.version + 1,
            Some(_) => continue,
        };
        modified.insert(
            name.clone(),
            FileMetaData::new(name.clone(), version, hashes.clone()),
        );
    }
    for (name, known) in &index.files {
        if !file_map.contains_key(name) && !known.is_deleted() && !is_excluded(exclude, name) {
            modified.insert(
                name.clone(),
                FileMetaData::tombstone(name.clone(), known.version + 1),
            );
        }
    }
    modified
}

fn progress_bar(no_progress: bool, len: usize) -> Result<Option<ProgressBar>, SyncError> {
    if no_progress {
        return Ok(None);
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files ({eta}) {msg}",
        )
        .map_err(|e| SyncError::Other(format!("progress template: {e}")))?
        .progress_chars("##-"),
    );
    Ok(Some(pb))
}

struct Pass<'a> {
    local: LocalBackend,
    transport: &'a dyn BlockTransport,
    options: &'a SyncOptions<'a>,
    session_addr: String,
    report: SyncReport,
    pb: Option<ProgressBar>,
}

impl Pass<'_> {
    fn tick(&self, name: &str) {
        if let Some(pb) = self.pb.as_ref() {
            pb.set_message(name.to_string());
            pb.inc(1);
        }
    }

    fn set_total(&self, len: usize) {
        if let Some(pb) = self.pb.as_ref() {
            pb.set_length(len as u64);
        }
    }

    fn addr_for(&self, hash: &str) -> Result<String, SyncError> {
        match &self.options.placement {
            Placement::Session => Ok(self.session_addr.clone()),
            Placement::Ring(ring) => ring.responsible_server(hash).map(str::to_string),
        }
    }

    /// Makes the local file match `meta`: removes it for a tombstone,
    /// otherwise rebuilds it from its blocks in order.
    fn apply_remote(&mut self, meta: &FileMetaData) -> Result<(), SyncError> {
        let name = &meta.filename;
        match &meta.blocks {
            BlockList::Deleted => {
                if self.local.exists(name) {
                    info!("removing {name}: deleted remotely at v{}", meta.version);
                    self.local.delete(name)?;
                    self.report.deleted_local.push(name.clone());
                }
            }
            BlockList::Present(hashes) => {
                info!("downloading {name} v{} ({} blocks)", meta.version, hashes.len());
                let mut file = self.local.create(name)?;
                for hash in hashes {
                    let addr = self.addr_for(hash)?;
                    let block = self.transport.get_block(hash, &addr)?;
                    if !block.verify() || block.hash != *hash {
                        return Err(SyncError::Transport(format!(
                            "block {hash} from {addr} does not match its content"
                        )));
                    }
                    file.write_all(&block.data)?;
                }
                file.sync_all()?;
                self.report.downloaded.push(name.clone());
            }
        }
        Ok(())
    }

    /// Uploads the file's blocks in order. Returns the uploaded hash list,
    /// or `None` if a store refused a block; blocks already sent stay put.
    fn upload(&self, name: &str) -> Result<Option<Vec<String>>, SyncError> {
        let present = if self.options.skip_present_blocks {
            self.present_blocks(name)?
        } else {
            BTreeSet::new()
        };

        let mut hashes = Vec::new();
        for block in self.local.blocks(name, self.options.block_size)? {
            let block = block?;
            let addr = self.addr_for(&block.hash)?;
            if present.contains(&(addr.clone(), block.hash.clone())) {
                debug!("{addr} already holds {}", block.hash);
            } else {
                debug!("uploading {} ({} bytes) to {addr}", block.hash, block.size);
                if !self.transport.put_block(&block, &addr)? {
                    warn!("{addr} refused block {} of {name}; skipping commit", block.hash);
                    return Ok(None);
                }
            }
            hashes.push(block.hash);
        }
        Ok(Some(hashes))
    }

    /// (address, hash) pairs already stored for the file's current blocks.
    fn present_blocks(&self, name: &str) -> Result<BTreeSet<(String, String)>, SyncError> {
        let mut by_addr: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for block in self.local.blocks(name, self.options.block_size)? {
            let hash = block?.hash;
            by_addr.entry(self.addr_for(&hash)?).or_default().push(hash);
        }
        let mut present = BTreeSet::new();
        for (addr, hashes) in by_addr {
            for hash in self.transport.has_blocks(&hashes, &addr)? {
                present.insert((addr.clone(), hash));
            }
        }
        Ok(present)
    }
}
