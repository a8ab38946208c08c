// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::fmt::{self, Debug};

/// Hash function mapping bytes to a ring position.
pub type HashFn = fn(&[u8]) -> u32;

/// Number of virtual positions per owner when none is configured.
pub const DEFAULT_REPLICAS: usize = 3;

/// CRC-32 (IEEE) checksum, the default ring hash.
#[must_use]
pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

/// A consistent-hashing ring.
///
/// Mutation takes `&mut self`; share a ring between threads behind a read/write lock so that
/// lookups never observe a half-applied change.
#[derive(Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    positions: Vec<u32>,
    owners: HashMap<u32, String>,
}

impl Debug for HashRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("positions", &self.positions.len())
            .field("owners", &self.owners())
            .finish_non_exhaustive()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl HashRing {
    /// Creates a builder with CRC-32 hashing and [`DEFAULT_REPLICAS`] positions per owner.
    #[must_use]
    pub fn builder() -> HashRingBuilder {
        HashRingBuilder::new()
    }

    /// Places every owner at `replicas` positions.
    ///
    /// Adding an owner that is already present places it again; positions that collide are
    /// kept and the later owner wins the lookup.
    pub fn add_owners<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for id in ids {
            let id = id.as_ref();
            for replica in 0..self.replicas {
                let position = self.position(replica, id);
                self.positions.push(position);
                self.owners.insert(position, id.to_owned());
            }
        }
        self.positions.sort_unstable();
    }

    /// Returns the owner of `key`, or `None` if the ring is empty.
    #[must_use]
    pub fn locate(&self, key: &str) -> Option<&str> {
        if self.positions.is_empty() {
            return None;
        }

        let hash = (self.hash)(key.as_bytes());
        let idx = self.positions.partition_point(|&position| position < hash);
        let position = self.positions[idx % self.positions.len()];
        self.owners.get(&position).map(String::as_str)
    }

    /// Removes a single occurrence of `position` and returns the owner it routed to.
    ///
    /// When the position was inserted more than once, the remaining occurrences keep routing to
    /// the same owner.
    pub fn remove_position(&mut self, position: u32) -> Option<String> {
        let idx = self.positions.binary_search(&position).ok()?;
        self.positions.remove(idx);

        if self.positions.binary_search(&position).is_ok() {
            self.owners.get(&position).cloned()
        } else {
            self.owners.remove(&position)
        }
    }

    /// Removes every position that routes to `id` and returns how many were removed.
    pub fn remove_owner(&mut self, id: &str) -> usize {
        let before = self.positions.len();
        self.owners.retain(|_, owner| owner != id);

        let owners = &self.owners;
        self.positions.retain(|position| owners.contains_key(position));
        before - self.positions.len()
    }

    /// Returns the positions that currently route to `id`, in ascending order.
    #[must_use]
    pub fn positions_of(&self, id: &str) -> Vec<u32> {
        self.positions
            .iter()
            .copied()
            .filter(|position| self.owners.get(position).is_some_and(|owner| owner == id))
            .collect()
    }

    /// Returns the distinct owners on the ring, sorted.
    #[must_use]
    pub fn owners(&self) -> Vec<&str> {
        let mut owners: Vec<&str> = self.owners.values().map(String::as_str).collect();
        owners.sort_unstable();
        owners.dedup();
        owners
    }

    /// Returns the number of positions on the ring, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Returns `true` if the ring has no positions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Returns the number of positions placed per owner.
    #[must_use]
    pub const fn replicas(&self) -> usize {
        self.replicas
    }

    /// Removes every owner.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.owners.clear();
    }

    fn position(&self, replica: usize, id: &str) -> u32 {
        (self.hash)(format!("{replica}{id}").as_bytes())
    }
}

/// Builder for [`HashRing`].
#[derive(Debug, Clone)]
pub struct HashRingBuilder {
    hash: HashFn,
    replicas: usize,
}

impl Default for HashRingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HashRingBuilder {
    /// Creates a builder with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hash: crc32,
            replicas: DEFAULT_REPLICAS,
        }
    }

    /// Sets how many positions each owner occupies. Zero is treated as one.
    #[must_use]
    pub fn replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas.max(1);
        self
    }

    /// Replaces the hash function used for both owners and keys.
    #[must_use]
    pub fn hash_fn(mut self, hash: HashFn) -> Self {
        self.hash = hash;
        self
    }

    /// Builds an empty ring.
    #[must_use]
    pub fn build(self) -> HashRing {
        HashRing {
            hash: self.hash,
            replicas: self.replicas,
            positions: Vec::new(),
            owners: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Interprets the input as a decimal number so positions are easy to reason about.
    fn decimal(data: &[u8]) -> u32 {
        std::str::from_utf8(data)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    fn decimal_ring() -> HashRing {
        let mut ring = HashRing::builder().replicas(3).hash_fn(decimal).build();
        // Positions 2, 4, 6, 12, 14, 16, 22, 24, 26.
        ring.add_owners(["6", "4", "2"]);
        ring
    }

    #[test]
    fn locate_picks_next_position_clockwise() {
        let ring = decimal_ring();

        for (key, owner) in [("2", "2"), ("11", "2"), ("23", "4"), ("27", "2")] {
            assert_eq!(ring.locate(key), Some(owner), "key {key}");
        }
    }

    #[test]
    fn new_owner_takes_adjacent_keys() {
        let mut ring = decimal_ring();
        ring.add_owners(["8"]);

        assert_eq!(ring.locate("27"), Some("8"));
        assert_eq!(ring.locate("11"), Some("2"));
    }

    #[test]
    fn empty_ring_locates_nothing() {
        let ring = HashRing::default();
        assert!(ring.locate("anything").is_none());
        assert!(ring.is_empty());
    }

    #[test]
    fn remove_position_drops_one_occurrence() {
        let mut ring = decimal_ring();

        assert_eq!(ring.remove_position(12), Some("2".to_string()));
        assert_eq!(ring.len(), 8);
        assert_eq!(ring.locate("11"), Some("4"));
        assert!(ring.remove_position(12).is_none());
    }

    #[test]
    fn colliding_positions_keep_last_writer() {
        let mut ring = HashRing::builder().replicas(1).hash_fn(|_| 7).build();
        ring.add_owners(["a", "b"]);

        assert_eq!(ring.len(), 2);
        assert_eq!(ring.locate("key"), Some("b"));

        // One occurrence remains and still routes to "b".
        assert_eq!(ring.remove_position(7), Some("b".to_string()));
        assert_eq!(ring.locate("key"), Some("b"));
        assert_eq!(ring.remove_position(7), Some("b".to_string()));
        assert!(ring.is_empty());
    }

    #[test]
    fn remove_owner_drops_every_position() {
        let mut ring = decimal_ring();

        assert_eq!(ring.remove_owner("2"), 3);
        assert_eq!(ring.owners(), vec!["4", "6"]);
        assert!(ring.positions_of("2").is_empty());
        assert_eq!(ring.locate("27"), Some("4"));
        assert_eq!(ring.remove_owner("2"), 0);
    }

    #[test]
    fn positions_follow_replica_prefix() {
        let ring = decimal_ring();
        assert_eq!(ring.positions_of("4"), vec![4, 14, 24]);
    }

    #[test]
    fn zero_replicas_is_clamped() {
        let ring = HashRing::builder().replicas(0).build();
        assert_eq!(ring.replicas(), 1);
    }

    #[test]
    fn default_hash_is_crc32_ieee() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }
}
