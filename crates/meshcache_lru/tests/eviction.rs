// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Randomized checks of the eviction bound and LRU victim selection.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use meshcache_lru::LruStore;

/// Reference model: a plain recency queue with the most recent key at the front.
#[derive(Default)]
struct Model {
    order: VecDeque<(String, String)>,
    max_bytes: u64,
}

impl Model {
    fn size(&self) -> u64 {
        self.order.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum()
    }

    fn touch(&mut self, key: &str) -> bool {
        let Some(pos) = self.order.iter().position(|(k, _)| k == key) else {
            return false;
        };
        let entry = self.order.remove(pos).expect("position is in range");
        self.order.push_front(entry);
        true
    }

    fn add(&mut self, key: &str, value: &str) -> Vec<String> {
        if let Some(pos) = self.order.iter().position(|(k, _)| k == key) {
            self.order.remove(pos);
        }
        self.order.push_front((key.to_string(), value.to_string()));

        let mut evicted = Vec::new();
        while self.max_bytes != 0 && self.size() > self.max_bytes {
            let (k, _) = self.order.pop_back().expect("non-empty while over capacity");
            evicted.push(k);
        }
        evicted
    }
}

fn random_value(rng: &mut fastrand::Rng) -> String {
    let len = rng.usize(0..12);
    (0..len).map(|_| rng.alphanumeric()).collect()
}

#[test]
fn size_never_exceeds_capacity_and_victims_are_least_recent() {
    for seed in 0..20 {
        let mut rng = fastrand::Rng::with_seed(seed);
        let max_bytes = rng.u64(8..64);

        let evicted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&evicted);
        let mut store = LruStore::<String>::builder()
            .max_bytes(max_bytes)
            .on_evicted(move |key, _| sink.lock().expect("poisoned").push(key.to_string()))
            .build();
        let mut model = Model {
            max_bytes,
            ..Model::default()
        };

        for _ in 0..500 {
            let key = format!("k{}", rng.u8(0..24));
            if rng.bool() {
                let hit = store.get(&key).is_some();
                assert_eq!(hit, model.touch(&key), "seed {seed}: hit/miss diverged for {key}");
            } else {
                let value = random_value(&mut rng);
                let expected = model.add(&key, &value);
                store.add(key.clone(), value);

                let actual: Vec<String> = evicted.lock().expect("poisoned").drain(..).collect();
                assert_eq!(actual, expected, "seed {seed}: wrong eviction victims");
            }

            assert!(store.used_bytes() <= max_bytes, "seed {seed}: capacity exceeded");
            assert_eq!(store.used_bytes(), model.size(), "seed {seed}: size accounting drifted");
            assert_eq!(store.len(), model.order.len());
        }
    }
}

#[test]
fn unbounded_store_never_evicts() {
    let mut store = LruStore::<Vec<u8>>::new(0);
    for i in 0..1_000 {
        store.add(format!("key{i}"), vec![0; 64]);
    }

    assert_eq!(store.len(), 1_000);
    assert!(store.remove_oldest().is_some_and(|(key, _)| key == "key0"));
}

#[test]
fn recently_read_entry_survives_eviction() {
    let mut store = LruStore::<String>::new(30);
    for key in ["alpha", "bravo", "delta"] {
        store.add(key, "0123456789".to_string());
    }

    // 45 bytes were inserted, so only the two most recent fit.
    assert!(!store.contains("alpha"));

    assert!(store.get("bravo").is_some());
    store.add("echo", "0123456789".to_string());

    assert!(store.contains("bravo"));
    assert!(!store.contains("delta"));
}
