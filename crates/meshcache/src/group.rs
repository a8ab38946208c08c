// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use meshcache_flight::Flight;
use meshcache_lru::LruStore;
use parking_lot::Mutex;

use crate::getter::DynGetter;
use crate::telemetry::{self, GroupActivity};
use crate::{ByteView, Error, ErrorKind, FetchRequest, Fetcher, Getter, PeerFetcher, PeerLocator, Registry};

/// A named cache namespace backed by a retrieval function.
///
/// A lookup is served from the local store when possible. On a miss, concurrent lookups for
/// the same key are coalesced into one load. The load asks the registered [`PeerLocator`] for
/// the owning peer and fetches the value remotely; when this process owns the key, no locator
/// is registered, or the remote fetch fails, the retrieval function runs locally and its value
/// is cached. Values fetched from peers are never cached locally.
///
/// Peer transports serve incoming fetches with [`get_local`](Self::get_local), which never
/// forwards, so two processes that disagree about ownership cannot bounce a request between
/// each other.
///
/// # Examples
///
/// ```
/// use meshcache::{BoxError, Group, getter_fn};
///
/// # async fn example() -> Result<(), meshcache::Error> {
/// let group = Group::builder(
///     "scores",
///     getter_fn(|key: String| async move {
///         match key.as_str() {
///             "Tom" => Ok(b"630".to_vec()),
///             _ => Err::<_, BoxError>(format!("{key} not exist").into()),
///         }
///     }),
/// )
/// .cache_bytes(2 << 10)
/// .build();
///
/// assert_eq!(group.get("Tom").await?, "630");
/// assert!(group.get("Kate").await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct Group {
    name: String,
    getter: Box<dyn DynGetter>,
    store: Mutex<LruStore<ByteView>>,
    peers: OnceLock<Arc<dyn PeerLocator>>,
    flight: Flight<String, Result<ByteView, Error>>,
    local_flight: Flight<String, Result<ByteView, Error>>,
    counters: Counters,
}

impl Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("store", &*self.store.lock())
            .field("peers", &self.peers.get().is_some())
            .field("flight", &self.flight)
            .field("local_flight", &self.local_flight)
            .finish_non_exhaustive()
    }
}

impl Group {
    /// Creates a builder for a group named `name` that loads misses with `getter`.
    pub fn builder(name: impl Into<String>, getter: impl Getter) -> GroupBuilder {
        GroupBuilder {
            name: name.into(),
            getter: Box::new(getter),
            cache_bytes: 0,
        }
    }

    /// Returns the group's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::EmptyKey`] for an empty key without calling the retrieval
    /// function, and [`ErrorKind::Retrieval`] when the retrieval function fails. Peer failures
    /// never surface here; they fall back to the retrieval function.
    pub async fn get(&self, key: &str) -> Result<ByteView, Error> {
        self.lookup(key, true).await
    }

    /// Returns the value for `key` without asking any peer.
    ///
    /// A miss runs the retrieval function in this process and caches its value. Concurrent
    /// local loads of the same key are coalesced.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::EmptyKey`] for an empty key without calling the retrieval
    /// function, and [`ErrorKind::Retrieval`] when the retrieval function fails.
    pub async fn get_local(&self, key: &str) -> Result<ByteView, Error> {
        self.lookup(key, false).await
    }

    async fn lookup(&self, key: &str, forward: bool) -> Result<ByteView, Error> {
        if key.is_empty() {
            return Err(ErrorKind::EmptyKey.into());
        }

        Counters::incr(&self.counters.gets);
        let cached = self.store.lock().get(key).cloned();
        if let Some(value) = cached {
            Counters::incr(&self.counters.hits);
            telemetry::record(&self.name, GroupActivity::Hit, key, None);
            return Ok(value);
        }

        telemetry::record(&self.name, GroupActivity::Miss, key, None);
        Counters::incr(&self.counters.loads);
        if forward {
            self.coalesce(&self.flight, key, || self.load_owned(key)).await
        } else {
            self.load_locally(key).await
        }
    }

    /// Binds the locator used to find the owners of keys.
    ///
    /// # Panics
    ///
    /// Panics if a locator is already bound. Use [`try_register_peers`](Self::try_register_peers)
    /// to get an error instead.
    #[expect(clippy::panic, reason = "binding peers twice is a wiring bug in the caller")]
    pub fn register_peers(&self, locator: impl PeerLocator) {
        if let Err(error) = self.try_register_peers(locator) {
            panic!("{error}");
        }
    }

    /// Binds the locator used to find the owners of keys.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::PeersAlreadyRegistered`] if a locator is already bound.
    pub fn try_register_peers(&self, locator: impl PeerLocator) -> Result<(), Error> {
        self.peers
            .set(Arc::new(locator))
            .map_err(|_locator| ErrorKind::PeersAlreadyRegistered(self.name.clone()).into())
    }

    /// Returns a snapshot of the group's counters.
    #[must_use]
    pub fn stats(&self) -> Stats {
        self.counters.snapshot()
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.store.lock().len()
    }

    /// Returns the bytes used by cached keys and values.
    #[must_use]
    pub fn cache_bytes(&self) -> u64 {
        self.store.lock().used_bytes()
    }

    async fn coalesce<F, Fut>(
        &self,
        flight: &Flight<String, Result<ByteView, Error>>,
        key: &str,
        func: F,
    ) -> Result<ByteView, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ByteView, Error>>,
    {
        let executed = AtomicBool::new(false);
        let result = flight
            .run(key.to_owned(), || {
                executed.store(true, Ordering::Relaxed);
                func()
            })
            .await;

        if !executed.load(Ordering::Relaxed) {
            Counters::incr(&self.counters.coalesced);
            telemetry::record(&self.name, GroupActivity::Coalesced, key, None);
        }
        result
    }

    async fn load_owned(&self, key: &str) -> Result<ByteView, Error> {
        if let Some(peer) = self.peers.get().and_then(|locator| locator.pick_peer(key)) {
            match self.get_from_peer(&peer, key).await {
                Ok(value) => {
                    Counters::incr(&self.counters.peer_loads);
                    telemetry::record(&self.name, GroupActivity::PeerLoad, key, None);
                    return Ok(value);
                }
                Err(error) => {
                    Counters::incr(&self.counters.peer_errors);
                    telemetry::record(&self.name, GroupActivity::PeerError, key, Some(&error));
                }
            }
        }

        self.load_locally(key).await
    }

    async fn load_locally(&self, key: &str) -> Result<ByteView, Error> {
        self.coalesce(&self.local_flight, key, || self.get_locally(key)).await
    }

    async fn get_from_peer(&self, peer: &Fetcher, key: &str) -> Result<ByteView, Error> {
        let request = FetchRequest::new(self.name.as_str(), key);
        let response = peer.fetch(&request).await?;
        Ok(ByteView::from(response.value))
    }

    async fn get_locally(&self, key: &str) -> Result<ByteView, Error> {
        match self.getter.get(key).await {
            Ok(bytes) => {
                let value = ByteView::from(bytes);
                self.store.lock().add(key, value.clone());
                Counters::incr(&self.counters.local_loads);
                telemetry::record(&self.name, GroupActivity::LocalLoad, key, None);
                Ok(value)
            }
            Err(source) => {
                let error = Error::retrieval(source);
                Counters::incr(&self.counters.local_load_errors);
                telemetry::record(&self.name, GroupActivity::LocalError, key, Some(&error));
                Err(error)
            }
        }
    }
}

/// Builder for [`Group`].
pub struct GroupBuilder {
    name: String,
    getter: Box<dyn DynGetter>,
    cache_bytes: u64,
}

impl Debug for GroupBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupBuilder")
            .field("name", &self.name)
            .field("cache_bytes", &self.cache_bytes)
            .finish_non_exhaustive()
    }
}

impl GroupBuilder {
    /// Sets the byte budget of the local store. `0`, the default, disables eviction.
    #[must_use]
    pub fn cache_bytes(mut self, cache_bytes: u64) -> Self {
        self.cache_bytes = cache_bytes;
        self
    }

    /// Builds a standalone group.
    #[must_use]
    pub fn build(self) -> Group {
        Group {
            name: self.name,
            getter: self.getter,
            store: Mutex::new(LruStore::new(self.cache_bytes)),
            peers: OnceLock::new(),
            flight: Flight::new(),
            local_flight: Flight::new(),
            counters: Counters::default(),
        }
    }

    /// Builds the group and adds it to `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::DuplicateGroup`] if `registry` already holds a group with this name.
    pub fn register(self, registry: &Registry) -> Result<Arc<Group>, Error> {
        registry.register(self.build())
    }

    /// Builds the group and adds it to [`Registry::global`].
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::DuplicateGroup`] if the name is already taken.
    pub fn register_global(self) -> Result<Arc<Group>, Error> {
        self.register(Registry::global())
    }
}

/// Counters describing how a group served its lookups.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct Stats {
    /// Lookups with a non-empty key.
    pub gets: u64,
    /// Lookups served from the local store.
    pub hits: u64,
    /// Lookups that missed the store, coalesced or not.
    pub loads: u64,
    /// Loads that received the output of another caller's execution.
    pub coalesced: u64,
    /// Values fetched from a peer.
    pub peer_loads: u64,
    /// Failed peer fetches.
    pub peer_errors: u64,
    /// Values produced by the retrieval function.
    pub local_loads: u64,
    /// Failed calls to the retrieval function.
    pub local_load_errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    gets: AtomicU64,
    hits: AtomicU64,
    loads: AtomicU64,
    coalesced: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    local_loads: AtomicU64,
    local_load_errors: AtomicU64,
}

impl Counters {
    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> Stats {
        let read = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        Stats {
            gets: read(&self.gets),
            hits: read(&self.hits),
            loads: read(&self.loads),
            coalesced: read(&self.coalesced),
            peer_loads: read(&self.peer_loads),
            peer_errors: read(&self.peer_errors),
            local_loads: read(&self.local_loads),
            local_load_errors: read(&self.local_load_errors),
        }
    }
}
