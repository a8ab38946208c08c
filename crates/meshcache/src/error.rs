// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

/// A boxed error returned by retrieval functions and transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The result for fallible cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// An error produced by a cache group, the registry, or a peer transport.
///
/// Errors are cheap to clone so that every caller coalesced onto one load receives the same
/// error. Use [`Error::kind`] to tell them apart.
///
/// # Examples
///
/// ```
/// use meshcache::{Error, ErrorKind};
///
/// let error = Error::peer_fetch("10.0.0.2:8001", "connection refused");
/// assert!(matches!(error.kind(), ErrorKind::PeerFetch { .. }));
/// assert!(!error.is_construction_violation());
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[error(transparent)]
pub struct Error(Arc<ErrorKind>);

/// The reason behind an [`Error`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An empty key was looked up.
    #[error("key is required")]
    EmptyKey,

    /// The group's retrieval function failed. The source is the retrieval function's error.
    #[error("{0}")]
    Retrieval(#[source] BoxError),

    /// A peer could not serve a fetch.
    #[error("fetch from peer {peer} failed: {source}")]
    PeerFetch {
        /// Address of the peer.
        peer: String,
        /// Why the fetch failed.
        #[source]
        source: BoxError,
    },

    /// A wire payload could not be decoded.
    #[error("malformed payload: {0}")]
    Decode(#[source] prost::DecodeError),

    /// A group with this name is already registered.
    #[error("group {0:?} is already registered")]
    DuplicateGroup(String),

    /// The group already has a peer locator.
    #[error("peers already registered for group {0:?}")]
    PeersAlreadyRegistered(String),
}

impl Error {
    /// Creates a peer fetch error for `peer`.
    ///
    /// Transports use this to report any failure to obtain a value from a peer.
    pub fn peer_fetch(peer: impl Into<String>, cause: impl Into<BoxError>) -> Self {
        ErrorKind::PeerFetch {
            peer: peer.into(),
            source: cause.into(),
        }
        .into()
    }

    pub(crate) fn retrieval(source: BoxError) -> Self {
        ErrorKind::Retrieval(source).into()
    }

    pub(crate) fn decode(source: prost::DecodeError) -> Self {
        ErrorKind::Decode(source).into()
    }

    /// Returns what went wrong.
    #[must_use]
    pub fn kind(&self) -> &ErrorKind {
        &self.0
    }

    /// Returns `true` for misuse detected while wiring groups together, as opposed to a
    /// failure while serving a lookup.
    #[must_use]
    pub fn is_construction_violation(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DuplicateGroup(_) | ErrorKind::PeersAlreadyRegistered(_)
        )
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self(Arc::new(kind))
    }
}
