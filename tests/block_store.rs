use std::sync::Arc;
use std::thread;

use shardsync::{hash_bytes, Block, BlockStore, SyncError};

#[test]
fn test_put_then_get_returns_same_bytes() {
    let store = BlockStore::new();
    let block = Block::new(b"hello world".to_vec());
    let hash = store.put_block(&block);
    assert_eq!(hash, hash_bytes(b"hello world"));

    let got = store.get_block(&hash).unwrap();
    assert_eq!(got.data, b"hello world");
    assert_eq!(got.size, 11);
}

#[test]
fn test_get_unknown_hash_is_not_found() {
    let store = BlockStore::new();
    match store.get_block("deadbeef") {
        Err(SyncError::NotFound(h)) => assert_eq!(h, "deadbeef"),
        other => panic!("expected NotFound, got {other:?}"),
    }
}

#[test]
fn test_put_keys_by_content_not_caller_hash() {
    let store = BlockStore::new();
    let block = Block {
        hash: "forged".to_string(),
        data: b"payload".to_vec(),
        size: 7,
    };
    let hash = store.put_block(&block);
    assert!(store.get_block("forged").is_err());
    assert!(store.get_block(&hash).unwrap().verify());
}

#[test]
fn test_put_same_content_twice_keeps_one_entry() {
    let store = BlockStore::new();
    store.put_block(&Block::new(b"same".to_vec()));
    store.put_block(&Block::new(b"same".to_vec()));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_has_blocks_returns_present_subset() {
    let store = BlockStore::new();
    let a = store.put_block(&Block::new(b"a".to_vec()));
    let c = store.put_block(&Block::new(b"c".to_vec()));
    let missing = hash_bytes(b"b");

    let present = store.has_blocks(&[a.clone(), missing, c.clone()]);
    assert_eq!(present, vec![a, c]);
    assert!(store.has_blocks(&[]).is_empty());
}

#[test]
fn test_concurrent_puts_and_gets() {
    let store = Arc::new(BlockStore::new());
    let handles: Vec<_> = (0..8)
        .map(|t| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..100 {
                    let data = format!("thread {t} block {i}").into_bytes();
                    let hash = store.put_block(&Block::new(data.clone()));
                    assert_eq!(store.get_block(&hash).unwrap().data, data);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(store.len(), 800);
}
