// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! HTTP/1 transport for meshcache peers.
//!
//! Every process runs a [`PeerService`] that exposes its registered groups at
//! `<base_path><group>/<key>`, and gives its [`PeerPool`](meshcache::PeerPool) an
//! [`HttpConnector`] so that lookups for keys owned elsewhere become `GET` requests to the
//! owner. Responses carry the value in the encoding of [`meshcache::codec`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use meshcache::{BoxError, Group, PeerPool, Registry, getter_fn};
//! use meshcache_http::{HttpConnector, PeerService, serve};
//! use tokio::net::TcpListener;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(Registry::new());
//! let group = Group::builder(
//!     "scores",
//!     getter_fn(|key: String| async move { Ok::<_, BoxError>(key.into_bytes()) }),
//! )
//! .register(&registry)?;
//!
//! let pool = Arc::new(PeerPool::builder("127.0.0.1:8001", HttpConnector::new()).build());
//! pool.set(["127.0.0.1:8002", "127.0.0.1:8003"]);
//! group.register_peers(Arc::clone(&pool));
//!
//! let listener = TcpListener::bind("127.0.0.1:8001").await?;
//! serve(listener, PeerService::new(registry)).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

mod client;
mod server;

pub use client::{HttpConnector, HttpFetcher};
pub use server::{PeerService, serve};

/// Path prefix under which groups are served unless configured otherwise.
pub const DEFAULT_BASE_PATH: &str = "/_meshcache/";

/// How long a peer fetch may take, response body included, unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
