// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Consistent hashing over a ring of `u32` positions.
//!
//! Each owner is placed on the ring at a fixed number of virtual positions. A key belongs to the
//! owner of the first position at or after the key's hash, wrapping around to the start of the
//! ring. Adding or removing an owner only moves the keys adjacent to its positions.
//!
//! Position `i` of owner `id` is `hash(format!("{i}{id}"))`, so rings built with the same hash
//! function and replica count agree on ownership across processes.
//!
//! # Example
//!
//! ```
//! use meshcache_ring::HashRing;
//!
//! let mut ring = HashRing::builder().replicas(50).build();
//! ring.add_owners(["10.0.0.1:8001", "10.0.0.2:8001", "10.0.0.3:8001"]);
//!
//! let owner = ring.locate("Tom").map(str::to_owned);
//! assert!(owner.is_some());
//!
//! // Locating is deterministic.
//! assert_eq!(ring.locate("Tom").map(str::to_owned), owner);
//! ```

mod ring;

pub use ring::{DEFAULT_REPLICAS, HashFn, HashRing, HashRingBuilder, crc32};
