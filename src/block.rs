//! Fixed-size chunking and content hashing of blocks.
//!
//! A file is split into `block_size` chunks, the last one possibly shorter.
//! An empty input yields no chunks, and input that ends exactly on a chunk
//! boundary does not produce a trailing empty chunk.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::Read;

/// Hex-encoded SHA-256 of `data`.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub hash: String,
    pub data: Vec<u8>,
    pub size: usize,
}

impl Block {
    /// Builds a block whose hash is derived from `data`.
    pub fn new(data: Vec<u8>) -> Self {
        let hash = hash_bytes(&data);
        let size = data.len();
        Self { hash, data, size }
    }

    /// True if the stored hash still matches the content.
    pub fn verify(&self) -> bool {
        hash_bytes(&self.data) == self.hash
    }
}

/// Iterator over the fixed-size chunks of a reader.
pub struct Chunks<R> {
    reader: R,
    block_size: usize,
    done: bool,
}

/// Splits `reader` into blocks of `block_size` bytes. `block_size` must be non-zero.
pub fn chunk_reader<R: Read>(reader: R, block_size: usize) -> Chunks<R> {
    Chunks {
        reader,
        block_size,
        done: block_size == 0,
    }
}

impl<R: Read> Iterator for Chunks<R> {
    type Item = std::io::Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = vec![0u8; self.block_size];
        let mut filled = 0;
        // A single read may return short; keep going until the chunk is full or EOF.
        while filled < buf.len() {
            match self.reader.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        if filled < buf.len() {
            self.done = true;
        }
        if filled == 0 {
            return None;
        }
        buf.truncate(filled);
        Some(Ok(Block::new(buf)))
    }
}

/// Ordered hash list of the chunks in `reader`.
pub fn hash_chunks<R: Read>(reader: R, block_size: usize) -> std::io::Result<Vec<String>> {
    chunk_reader(reader, block_size)
        .map(|block| block.map(|b| b.hash))
        .collect()
}

/// Concatenates blocks in order.
pub fn assemble<'a, I>(blocks: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a Block>,
{
    let mut out = Vec::new();
    for block in blocks {
        out.extend_from_slice(&block.data);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunking_splits_on_block_size() {
        let blocks: Vec<Block> = chunk_reader(&b"ABCDEFGHIJ"[..], 4)
            .collect::<Result<_, _>>()
            .unwrap();
        let sizes: Vec<usize> = blocks.iter().map(|b| b.size).collect();
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(blocks[0].data, b"ABCD");
        assert_eq!(blocks[2].data, b"IJ");
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_chunk() {
        let hashes = hash_chunks(&b"ABCDEFGH"[..], 4).unwrap();
        assert_eq!(hashes, vec![hash_bytes(b"ABCD"), hash_bytes(b"EFGH")]);
    }

    #[test]
    fn test_empty_input_has_no_chunks() {
        assert!(hash_chunks(&b""[..], 4).unwrap().is_empty());
    }

    #[test]
    fn test_chunks_reassemble_to_original() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let blocks: Vec<Block> = chunk_reader(&data[..], 64)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(assemble(&blocks), data);
        assert_eq!(
            hash_chunks(&data[..], 64).unwrap(),
            blocks.iter().map(|b| b.hash.clone()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_known_sha256() {
        assert_eq!(
            hash_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(Block::new(b"abc".to_vec()).verify());
    }
}
