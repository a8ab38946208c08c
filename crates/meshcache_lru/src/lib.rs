// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A byte-bounded LRU store.
//!
//! [`LruStore`] keeps string-keyed values in recency order and accounts every entry as
//! `key.len() + value.weight()` bytes. After each insertion it evicts least recently used
//! entries until the total fits the configured capacity again, handing every victim to an
//! optional eviction callback.
//!
//! # Design
//!
//! - A `HashMap` indexes keys to their slot for O(1) lookup.
//! - Recency order lives in a slab of index-linked nodes, so promotion on a hit is a handful of
//!   index writes and eviction pops the tail.
//! - The store takes `&mut self` for every operation that changes recency. Callers that share
//!   a store across threads wrap it in a lock; the eviction callback therefore cannot re-enter
//!   the store it was called from.
//!
//! # Example
//!
//! ```
//! use meshcache_lru::LruStore;
//!
//! let mut store = LruStore::<String>::new(6);
//! store.add("a", "1".to_string());
//! store.add("b", "2".to_string());
//! store.add("c", "3".to_string());
//!
//! // Touch "a" so that "b" becomes the eviction victim.
//! store.get("a");
//! store.add("d", "4".to_string());
//!
//! assert!(store.contains("a"));
//! assert!(!store.contains("b"));
//! assert_eq!(store.used_bytes(), 6);
//! ```

mod list;
mod store;

pub use store::{EvictionCallback, LruStore, LruStoreBuilder, Weigh};
