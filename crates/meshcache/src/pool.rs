// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::fmt::{self, Debug};

use meshcache_ring::{HashFn, HashRing, HashRingBuilder};
use parking_lot::RwLock;

use crate::{Fetcher, MembershipEvent, PeerLocator};

/// Creates the [`Fetcher`] used to reach a peer address.
pub trait Connector: Send + Sync + 'static {
    /// Returns a fetcher for the peer at `addr`.
    fn connect(&self, addr: &str) -> Fetcher;
}

impl<F> Connector for F
where
    F: Fn(&str) -> Fetcher + Send + Sync + 'static,
{
    fn connect(&self, addr: &str) -> Fetcher {
        self(addr)
    }
}

/// The set of peers sharing the key space, with this process among them.
///
/// The pool places every peer address, its own included, on a consistent-hashing ring and
/// implements [`PeerLocator`]: keys that land on this process are served locally, all other
/// keys go to the owning peer through a fetcher created by the pool's [`Connector`].
///
/// # Examples
///
/// ```
/// use meshcache::{Error, FetchRequest, FetchResponse, Fetcher, PeerFetcher, PeerLocator, PeerPool};
///
/// struct Unreachable;
///
/// impl PeerFetcher for Unreachable {
///     async fn fetch(&self, _request: &FetchRequest) -> Result<FetchResponse, Error> {
///         Err(Error::peer_fetch("peer", "unreachable"))
///     }
/// }
///
/// let pool = PeerPool::builder("10.0.0.1:8001", |_addr: &str| Fetcher::new(Unreachable)).build();
///
/// // Alone in the pool, every key is owned locally.
/// assert!(pool.pick_peer("Tom").is_none());
///
/// pool.set(["10.0.0.2:8001", "10.0.0.3:8001"]);
/// assert_eq!(pool.peers().len(), 3);
/// ```
pub struct PeerPool {
    self_addr: String,
    connector: Box<dyn Connector>,
    ring: HashRingBuilder,
    state: RwLock<PoolState>,
}

struct PoolState {
    ring: HashRing,
    fetchers: HashMap<String, Fetcher>,
    registrations: HashMap<String, String>,
}

impl PoolState {
    fn new(ring: HashRing, self_addr: &str) -> Self {
        let mut state = Self {
            ring,
            fetchers: HashMap::new(),
            registrations: HashMap::new(),
        };
        state.ring.add_owners([self_addr]);
        state
    }
}

impl Debug for PeerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("PeerPool")
            .field("self_addr", &self.self_addr)
            .field("ring", &state.ring)
            .field("registrations", &state.registrations)
            .finish_non_exhaustive()
    }
}

impl PeerPool {
    /// Creates a builder for a pool in which this process is reachable at `self_addr`.
    pub fn builder(self_addr: impl Into<String>, connector: impl Connector) -> PeerPoolBuilder {
        PeerPoolBuilder {
            self_addr: self_addr.into(),
            connector: Box::new(connector),
            ring: HashRing::builder(),
        }
    }

    /// Returns the address of this process.
    #[must_use]
    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    /// Replaces the membership with `peers` plus this process.
    ///
    /// Every fetcher from the previous membership is dropped. Registrations learned from
    /// [`apply`](Self::apply) are kept, so a later [`Left`](MembershipEvent::Left) event still
    /// removes the address its registration announced.
    pub fn set<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = PoolState::new(self.ring.clone().build(), &self.self_addr);
        for peer in peers {
            self.insert(&mut state, peer.as_ref());
        }

        let owners = state.ring.owners().len();
        let mut current = self.state.write();
        state.registrations = std::mem::take(&mut current.registrations);
        *current = state;
        drop(current);
        tracing::info!(pool.local = %self.self_addr, pool.peers = owners, "peer set replaced");
    }

    /// Adds the peer at `addr`. Returns `false` if it is already a member.
    pub fn add_peer(&self, addr: &str) -> bool {
        let added = self.insert(&mut self.state.write(), addr);
        if added {
            tracing::info!(pool.local = %self.self_addr, pool.peer = addr, "peer added");
        }
        added
    }

    /// Removes the peer at `addr` and every ring position it occupied.
    ///
    /// Returns `false` if `addr` is not a member or is this process, which can never leave its
    /// own pool.
    pub fn remove_peer(&self, addr: &str) -> bool {
        let removed = Self::evict(&mut self.state.write(), addr);
        if removed {
            tracing::info!(pool.local = %self.self_addr, pool.peer = addr, "peer removed");
        }
        removed
    }

    /// Returns every member address, this process included, sorted.
    #[must_use]
    pub fn peers(&self) -> Vec<String> {
        self.state.read().ring.owners().into_iter().map(str::to_owned).collect()
    }

    /// Applies a membership notification.
    ///
    /// A [`Joined`](MembershipEvent::Joined) event remembers which address its registration
    /// announced, so that the matching [`Left`](MembershipEvent::Left) event removes that
    /// address. A registration that re-announces a new address replaces its old one. An address
    /// announced by several registrations stays a member until the last of them leaves.
    pub fn apply(&self, event: MembershipEvent) {
        let mut state = self.state.write();
        match event {
            MembershipEvent::Joined { registration, addr } => {
                if let Some(previous) = state.registrations.insert(registration, addr.clone())
                    && previous != addr
                {
                    Self::release(&mut state, &previous);
                }
                if self.insert(&mut state, &addr) {
                    tracing::info!(pool.local = %self.self_addr, pool.peer = %addr, "peer joined");
                }
            }
            MembershipEvent::Left { registration } => match state.registrations.remove(&registration) {
                Some(addr) => {
                    if Self::release(&mut state, &addr) {
                        tracing::info!(pool.local = %self.self_addr, pool.peer = %addr, "peer left");
                    }
                }
                None => tracing::debug!(pool.registration = %registration, "ignoring departure of unknown registration"),
            },
        }
    }

    fn insert(&self, state: &mut PoolState, addr: &str) -> bool {
        if addr == self.self_addr || state.fetchers.contains_key(addr) {
            return false;
        }
        state.ring.add_owners([addr]);
        state.fetchers.insert(addr.to_owned(), self.connector.connect(addr));
        true
    }

    /// Evicts `addr` unless another registration still announces it.
    fn release(state: &mut PoolState, addr: &str) -> bool {
        if state.registrations.values().any(|held| held == addr) {
            return false;
        }
        Self::evict(state, addr)
    }

    fn evict(state: &mut PoolState, addr: &str) -> bool {
        if state.fetchers.remove(addr).is_none() {
            return false;
        }
        state.ring.remove_owner(addr);
        true
    }
}

impl PeerLocator for PeerPool {
    fn pick_peer(&self, key: &str) -> Option<Fetcher> {
        let state = self.state.read();
        let owner = state.ring.locate(key)?;
        if owner == self.self_addr {
            return None;
        }

        tracing::debug!(pool.local = %self.self_addr, pool.peer = owner, pool.key = key, "picked peer");
        state.fetchers.get(owner).cloned()
    }
}

/// Builder for [`PeerPool`].
pub struct PeerPoolBuilder {
    self_addr: String,
    connector: Box<dyn Connector>,
    ring: HashRingBuilder,
}

impl Debug for PeerPoolBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerPoolBuilder")
            .field("self_addr", &self.self_addr)
            .field("ring", &self.ring)
            .finish_non_exhaustive()
    }
}

impl PeerPoolBuilder {
    /// Sets how many ring positions each peer occupies.
    #[must_use]
    pub fn replicas(mut self, replicas: usize) -> Self {
        self.ring = self.ring.replicas(replicas);
        self
    }

    /// Replaces the hash used to place peers and keys on the ring.
    ///
    /// Every process in the pool must use the same hash and replica count, or they will
    /// disagree about ownership.
    #[must_use]
    pub fn hash_fn(mut self, hash: HashFn) -> Self {
        self.ring = self.ring.hash_fn(hash);
        self
    }

    /// Builds a pool whose only member is this process.
    #[must_use]
    pub fn build(self) -> PeerPool {
        let state = PoolState::new(self.ring.clone().build(), &self.self_addr);
        PeerPool {
            self_addr: self.self_addr,
            connector: self.connector,
            ring: self.ring,
            state: RwLock::new(state),
        }
    }
}
