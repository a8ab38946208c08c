// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The boundary between a group and the peers that own other keys.
//!
//! The group never assumes a transport. It asks a [`PeerLocator`] who owns a key and, when the
//! owner is remote, sends a [`FetchRequest`] through the returned [`Fetcher`].

use std::fmt::{self, Debug};
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;

use crate::Error;

/// Asks a peer for the value of `key` in `group`.
///
/// This is also the protobuf message sent on the wire; see [`codec`](crate::codec).
#[derive(Clone, PartialEq, Eq, Hash, prost::Message)]
pub struct FetchRequest {
    /// Name of the group on the peer.
    #[prost(string, tag = "1")]
    pub group: String,
    /// Key to look up.
    #[prost(string, tag = "2")]
    pub key: String,
}

impl FetchRequest {
    /// Creates a request for `key` in `group`.
    pub fn new(group: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            key: key.into(),
        }
    }
}

/// The value a peer returned for a [`FetchRequest`].
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct FetchResponse {
    /// The exact value bytes.
    #[prost(bytes = "bytes", tag = "1")]
    pub value: Bytes,
}

impl FetchResponse {
    /// Creates a response carrying `value`.
    pub fn new(value: impl Into<Bytes>) -> Self {
        Self { value: value.into() }
    }
}

/// Fetches values from one remote peer.
pub trait PeerFetcher: Send + Sync + 'static {
    /// Fetches the value named by `request`.
    ///
    /// # Errors
    ///
    /// Returns an error if the peer cannot be reached or cannot produce the value.
    fn fetch(&self, request: &FetchRequest) -> impl Future<Output = Result<FetchResponse, Error>> + Send;
}

trait DynPeerFetcher: Send + Sync {
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> BoxFuture<'a, Result<FetchResponse, Error>>;
}

impl<P: PeerFetcher> DynPeerFetcher for P {
    fn fetch<'a>(&'a self, request: &'a FetchRequest) -> BoxFuture<'a, Result<FetchResponse, Error>> {
        Box::pin(PeerFetcher::fetch(self, request))
    }
}

/// A cheaply cloneable handle to any [`PeerFetcher`].
///
/// # Examples
///
/// ```
/// use meshcache::{Error, FetchRequest, FetchResponse, Fetcher, PeerFetcher};
///
/// struct Echo;
///
/// impl PeerFetcher for Echo {
///     async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error> {
///         Ok(FetchResponse::new(request.key.clone().into_bytes()))
///     }
/// }
///
/// let fetcher = Fetcher::new(Echo);
/// let clone = fetcher.clone();
/// # let _ = clone;
/// ```
#[derive(Clone)]
pub struct Fetcher(Arc<dyn DynPeerFetcher>);

impl Fetcher {
    /// Wraps `fetcher` in a type-erased handle.
    pub fn new(fetcher: impl PeerFetcher) -> Self {
        Self(Arc::new(fetcher))
    }
}

impl Debug for Fetcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fetcher").finish_non_exhaustive()
    }
}

impl PeerFetcher for Fetcher {
    fn fetch(&self, request: &FetchRequest) -> impl Future<Output = Result<FetchResponse, Error>> + Send {
        let inner = Arc::clone(&self.0);
        let request = request.clone();
        async move { inner.fetch(&request).await }
    }
}

/// Picks the peer that owns a key.
pub trait PeerLocator: Send + Sync + 'static {
    /// Returns the fetcher for the owner of `key`, or `None` when this process owns it or no
    /// peers are known.
    fn pick_peer(&self, key: &str) -> Option<Fetcher>;
}

impl<L: PeerLocator> PeerLocator for Arc<L> {
    fn pick_peer(&self, key: &str) -> Option<Fetcher> {
        (**self).pick_peer(key)
    }
}
