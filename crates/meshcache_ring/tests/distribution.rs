// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Ownership properties of the ring under membership changes.

use meshcache_ring::HashRing;
use rstest::rstest;

const PEERS: [&str; 4] = ["10.0.0.1:8001", "10.0.0.2:8001", "10.0.0.3:8001", "10.0.0.4:8001"];

fn random_keys(seed: u64, count: usize) -> Vec<String> {
    let mut rng = fastrand::Rng::with_seed(seed);
    (0..count)
        .map(|_| (0..rng.usize(1..16)).map(|_| rng.alphanumeric()).collect())
        .collect()
}

fn ring(replicas: usize, peers: &[&str]) -> HashRing {
    let mut ring = HashRing::builder().replicas(replicas).build();
    ring.add_owners(peers);
    ring
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(50)]
fn identical_rings_agree_on_every_key(#[case] replicas: usize) {
    let first = ring(replicas, &PEERS);

    let mut reversed = PEERS;
    reversed.reverse();
    let second = ring(replicas, &reversed);

    for key in random_keys(1, 2_000) {
        assert_eq!(first.locate(&key), second.locate(&key), "key {key}");
    }
}

#[rstest]
#[case(3)]
#[case(50)]
fn adding_an_owner_only_moves_keys_to_it(#[case] replicas: usize) {
    let before = ring(replicas, &PEERS[..3]);
    let mut after = before.clone();
    after.add_owners([PEERS[3]]);

    for key in random_keys(2, 2_000) {
        let old = before.locate(&key);
        let new = after.locate(&key);
        assert!(new == old || new == Some(PEERS[3]), "key {key} moved from {old:?} to {new:?}");
    }
}

#[rstest]
#[case(3)]
#[case(50)]
fn removing_an_owner_only_moves_its_keys(#[case] replicas: usize) {
    let before = ring(replicas, &PEERS);
    let mut after = before.clone();
    assert_eq!(after.remove_owner(PEERS[1]), replicas);

    for key in random_keys(3, 2_000) {
        let old = before.locate(&key);
        let new = after.locate(&key);
        if old == Some(PEERS[1]) {
            assert_ne!(new, Some(PEERS[1]));
        } else {
            assert_eq!(new, old, "key {key} moved although its owner stayed");
        }
    }
}

#[test]
fn every_owner_receives_keys_with_enough_replicas() {
    let ring = ring(50, &PEERS);
    let mut counts = [0_usize; PEERS.len()];

    for key in random_keys(4, 4_000) {
        let owner = ring.locate(&key).expect("ring is not empty");
        let idx = PEERS.iter().position(|peer| *peer == owner).expect("owner is a known peer");
        counts[idx] += 1;
    }

    assert!(counts.iter().all(|&count| count > 0), "unbalanced ring: {counts:?}");
}

#[test]
fn clear_empties_the_ring() {
    let mut ring = ring(3, &PEERS);
    assert_eq!(ring.len(), 12);
    assert_eq!(ring.owners(), PEERS.to_vec());

    ring.clear();
    assert!(ring.is_empty());
    assert!(ring.locate("key").is_none());
}
