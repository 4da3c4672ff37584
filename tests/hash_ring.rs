use shardsync::block::{hash_bytes, hash_chunks};
use shardsync::ring::{node_index, node_name, HashRing};
use shardsync::SyncError;

fn sample_hashes(n: usize) -> Vec<String> {
    (0..n).map(|i| hash_bytes(format!("block-{i}").as_bytes())).collect()
}

#[test]
fn test_example_scenario_assigns_both_chunks() {
    let ring = HashRing::new(4, &[]);
    let hashes = hash_chunks(&b"ABCDEFGH"[..], 4).unwrap();
    assert_eq!(hashes.len(), 2);
    // Both chunk hashes sort after every node position and wrap to the smallest one.
    let owners: Vec<_> = ring
        .assign(&hashes)
        .unwrap()
        .iter()
        .map(|a| node_index(a).unwrap())
        .collect();
    assert_eq!(owners, vec![3, 3]);
}

#[test]
fn test_down_server_hands_blocks_to_next_node() {
    let ring = HashRing::new(4, &[3]);
    assert_eq!(ring.len(), 3);
    let hashes = hash_chunks(&b"ABCDEFGH"[..], 4).unwrap();
    for addr in ring.assign(&hashes).unwrap() {
        assert_eq!(addr, "blockstore2");
    }
}

#[test]
fn test_lookup_is_inclusive_of_node_position() {
    let ring = HashRing::new(4, &[]);
    let pos = HashRing::position("blockstore1");
    assert_eq!(ring.responsible_server(&pos).unwrap(), "blockstore1");
    assert_eq!(ring.responsible_server(&"0".repeat(64)).unwrap(), "blockstore3");
    assert_eq!(ring.responsible_server(&format!("70{}", "0".repeat(62))).unwrap(), "blockstore2");
}

#[test]
fn test_lookup_is_deterministic_and_returns_member() {
    let a = HashRing::new(8, &[2, 5]);
    let b = HashRing::new(8, &[2, 5]);
    let members: Vec<String> = a.servers().map(str::to_string).collect();
    for h in sample_hashes(200) {
        let owner = a.responsible_server(&h).unwrap();
        assert_eq!(owner, b.responsible_server(&h).unwrap());
        assert!(members.iter().any(|m| m == owner));
        assert_ne!(owner, "blockstore2");
        assert_ne!(owner, "blockstore5");
    }
}

#[test]
fn test_removing_node_only_moves_its_own_blocks() {
    let full = HashRing::new(6, &[]);
    let mut reduced = full.clone();
    reduced.delete_server("blockstore4");

    let mut moved = 0;
    for h in sample_hashes(500) {
        let before = full.responsible_server(&h).unwrap();
        let after = reduced.responsible_server(&h).unwrap();
        if before == "blockstore4" {
            assert_ne!(after, "blockstore4");
            moved += 1;
        } else {
            assert_eq!(before, after, "block {h} moved although its owner stayed");
        }
    }
    assert!(moved > 0);
}

#[test]
fn test_insert_and_delete_are_idempotent() {
    let mut ring = HashRing::from_nodes(["a", "b"]);
    ring.insert_server("a");
    assert_eq!(ring.len(), 2);
    ring.delete_server("zzz");
    assert_eq!(ring.len(), 2);
    ring.delete_server("b");
    ring.delete_server("b");
    assert_eq!(ring.servers().collect::<Vec<_>>(), vec!["a"]);
}

#[test]
fn test_empty_ring_is_a_configuration_error() {
    let ring = HashRing::new(3, &[0, 1, 2]);
    assert!(ring.is_empty());
    let err = ring.responsible_server(&hash_bytes(b"x")).unwrap_err();
    assert!(matches!(err, SyncError::Configuration(_)));
}

#[test]
fn test_node_names_round_trip() {
    assert_eq!(node_name(7), "blockstore7");
    assert_eq!(node_index("blockstore12"), Some(12));
    assert_eq!(node_index("localhost:8081"), None);
}
