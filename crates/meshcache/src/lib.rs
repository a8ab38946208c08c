// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A distributed read-through cache.
//!
//! A [`Group`] is a named cache namespace. It owns a retrieval function ([`Getter`]) that
//! produces authoritative values, a byte-bounded LRU store of values it loaded itself, and a
//! coalescer that merges concurrent misses for the same key into one load.
//!
//! Processes cooperate by sharing a [`PeerPool`]: every member places itself on a
//! consistent-hashing ring, so each key has exactly one owner. A group asks the pool for the
//! owner of a missed key and fetches the value from that peer. Keys owned by this process,
//! and keys whose owner cannot be reached, are loaded locally.
//!
//! The transport is pluggable through [`PeerFetcher`] and [`Connector`]; the wire encoding of
//! requests and responses lives in [`codec`].
//!
//! # Example
//!
//! ```
//! use meshcache::{BoxError, Group, Registry, getter_fn};
//!
//! # async fn example() -> Result<(), meshcache::Error> {
//! let registry = Registry::new();
//! let group = Group::builder(
//!     "scores",
//!     getter_fn(|key: String| async move {
//!         match key.as_str() {
//!             "Tom" => Ok(b"630".to_vec()),
//!             "Jack" => Ok(b"589".to_vec()),
//!             _ => Err::<_, BoxError>(format!("{key} not exist").into()),
//!         }
//!     }),
//! )
//! .cache_bytes(2 << 10)
//! .register(&registry)?;
//!
//! // The first lookup runs the getter, the second is served from the cache.
//! assert_eq!(group.get("Tom").await?, "630");
//! assert_eq!(group.get("Tom").await?, "630");
//! assert_eq!(group.stats().hits, 1);
//! # Ok(())
//! # }
//! ```

mod byte_view;
pub mod codec;
mod error;
mod getter;
mod group;
mod membership;
mod peers;
mod pool;
mod registry;
mod telemetry;

pub use byte_view::ByteView;
pub use error::{BoxError, Error, ErrorKind, Result};
pub use getter::{Getter, GetterFn, getter_fn};
pub use group::{Group, GroupBuilder, Stats};
pub use membership::{MembershipEvent, watch_membership};
pub use meshcache_ring::{DEFAULT_REPLICAS, HashFn};
pub use peers::{FetchRequest, FetchResponse, Fetcher, PeerFetcher, PeerLocator};
pub use pool::{Connector, PeerPool, PeerPoolBuilder};
pub use registry::Registry;
