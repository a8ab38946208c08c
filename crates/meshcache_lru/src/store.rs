// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The size-accounted LRU store.

use std::collections::HashMap;
use std::fmt::{self, Debug};

use crate::list::{NodeIndex, RecencyList};

/// Reports how many bytes a stored value accounts for.
///
/// An entry's size is `key.len() + value.weight()`.
pub trait Weigh {
    /// Returns the number of bytes this value accounts for.
    fn weight(&self) -> usize;
}

impl Weigh for Vec<u8> {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weigh for String {
    fn weight(&self) -> usize {
        self.len()
    }
}

impl Weigh for &str {
    fn weight(&self) -> usize {
        self.len()
    }
}

/// Callback invoked with every evicted entry.
pub type EvictionCallback<V> = Box<dyn FnMut(&str, &V) + Send>;

struct Slot<V> {
    node: NodeIndex,
    value: V,
}

/// A byte-bounded key/value store that evicts the least recently used entries.
///
/// The store is not synchronized; wrap it in a lock to share it between threads. A capacity
/// of `0` means the store never evicts.
///
/// # Examples
///
/// ```
/// use meshcache_lru::LruStore;
///
/// // "key1" + "value1" is 10 bytes, so only one entry fits.
/// let mut store = LruStore::<String>::builder().max_bytes(10).build();
/// store.add("key1", "value1".to_string());
/// store.add("key2", "value2".to_string());
///
/// assert!(store.get("key1").is_none());
/// assert_eq!(store.get("key2").map(String::as_str), Some("value2"));
/// ```
pub struct LruStore<V> {
    map: HashMap<String, Slot<V>>,
    list: RecencyList<String>,
    used_bytes: u64,
    max_bytes: u64,
    on_evicted: Option<EvictionCallback<V>>,
}

impl<V> Debug for LruStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruStore")
            .field("len", &self.map.len())
            .field("used_bytes", &self.used_bytes)
            .field("max_bytes", &self.max_bytes)
            .finish_non_exhaustive()
    }
}

impl<V: Weigh> Default for LruStore<V> {
    fn default() -> Self {
        Self::new(0)
    }
}

impl<V: Weigh> LruStore<V> {
    /// Creates a store holding at most `max_bytes` bytes of keys and values.
    #[must_use]
    pub fn new(max_bytes: u64) -> Self {
        Self::builder().max_bytes(max_bytes).build()
    }

    /// Creates a builder for configuring a store.
    #[must_use]
    pub fn builder() -> LruStoreBuilder<V> {
        LruStoreBuilder::new()
    }

    /// Looks up `key` and marks it as most recently used.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let slot = self.map.get(key)?;
        self.list.move_to_front(slot.node);
        Some(&slot.value)
    }

    /// Returns `true` if `key` is stored, without touching its recency.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Inserts or replaces `key`, then evicts until the store fits its capacity.
    ///
    /// The entry just added is evicted as well if it alone exceeds the capacity.
    pub fn add(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        let added = value.weight() as u64;

        if let Some(slot) = self.map.get_mut(&key) {
            let replaced = slot.value.weight() as u64;
            slot.value = value;
            self.used_bytes = self.used_bytes - replaced + added;
            self.list.move_to_front(slot.node);
        } else {
            self.used_bytes += key.len() as u64 + added;
            let node = self.list.push_front(key.clone());
            self.map.insert(key, Slot { node, value });
        }

        while self.max_bytes != 0 && self.used_bytes > self.max_bytes {
            if self.remove_oldest().is_none() {
                break;
            }
        }
    }

    /// Evicts the least recently used entry and returns it.
    ///
    /// The eviction callback runs after the entry has left every index.
    pub fn remove_oldest(&mut self) -> Option<(String, V)> {
        let key = self.list.pop_back()?;
        let slot = self.map.remove(&key)?;
        self.used_bytes -= key.len() as u64 + slot.value.weight() as u64;

        if let Some(on_evicted) = self.on_evicted.as_mut() {
            on_evicted(&key, &slot.value);
        }

        Some((key, slot.value))
    }

    /// Removes every entry without invoking the eviction callback.
    pub fn clear(&mut self) {
        self.map.clear();
        self.list.clear();
        self.used_bytes = 0;
    }
}

impl<V> LruStore<V> {
    /// Returns the number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the bytes currently accounted for by keys and values.
    #[must_use]
    pub const fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    /// Returns the capacity in bytes; `0` means unbounded.
    #[must_use]
    pub const fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    /// Iterates keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.list.iter().map(String::as_str)
    }
}

/// Builder for [`LruStore`].
pub struct LruStoreBuilder<V> {
    max_bytes: u64,
    on_evicted: Option<EvictionCallback<V>>,
}

impl<V> Debug for LruStoreBuilder<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruStoreBuilder")
            .field("max_bytes", &self.max_bytes)
            .field("on_evicted", &self.on_evicted.is_some())
            .finish()
    }
}

impl<V> Default for LruStoreBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> LruStoreBuilder<V> {
    /// Creates a builder for an unbounded store without an eviction callback.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_bytes: 0,
            on_evicted: None,
        }
    }

    /// Sets the capacity in bytes. `0` disables eviction.
    #[must_use]
    pub fn max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Sets a callback invoked synchronously with each evicted entry.
    ///
    /// The callback runs while the store is mutably borrowed, so it cannot reach back into the
    /// same store.
    #[must_use]
    pub fn on_evicted(mut self, callback: impl FnMut(&str, &V) + Send + 'static) -> Self {
        self.on_evicted = Some(Box::new(callback));
        self
    }

    /// Builds the store.
    #[must_use]
    pub fn build(self) -> LruStore<V> {
        LruStore {
            map: HashMap::new(),
            list: RecencyList::new(),
            used_bytes: 0,
            max_bytes: self.max_bytes,
            on_evicted: self.on_evicted,
        }
    }
}
