// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Coalesces concurrent calls for the same key into a single execution.
//!
//! [`Flight`] tracks one in-flight call per key. The first caller for a key executes its
//! function; every caller that arrives while that execution is running waits and receives a
//! clone of its output. Once the output is stored the key is released, so the next call after
//! completion executes again.
//!
//! # Example
//!
//! ```
//! use meshcache_flight::Flight;
//!
//! # async fn example() {
//! let flight: Flight<String, Result<String, String>> = Flight::new();
//!
//! let value = flight
//!     .run("user:123".to_string(), || async { Ok("loaded".to_string()) })
//!     .await;
//! assert_eq!(value, Ok("loaded".to_string()));
//! # }
//! ```
//!
//! # Registration
//!
//! [`Flight::run`] joins or opens the in-flight call when it is *called*, not when the returned
//! future is first polled. Two futures created back to back for the same key are therefore
//! coalesced even if neither has been polled yet.
//!
//! # Cancellation and panics
//!
//! The executing caller holds the call's slot lock while its function runs. If that future is
//! dropped, or the function panics, the lock is released with no output stored and one of the
//! waiting callers executes its own function instead. Every caller that observes an output
//! observes the same one. When every caller's future for a key is dropped, the key is
//! forgotten.

use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::{Arc, Weak};

use futures_util::lock::Mutex as AsyncMutex;
use parking_lot::Mutex;

type Calls<K, T> = Arc<Mutex<HashMap<K, Weak<Call<K, T>>>>>;

/// A single in-flight execution shared by every coalesced caller.
struct Call<K: Hash + Eq, T> {
    slot: AsyncMutex<Option<T>>,
    key: K,
    calls: Weak<Mutex<HashMap<K, Weak<Call<K, T>>>>>,
}

impl<K: Hash + Eq, T> Call<K, T> {
    fn new(key: K, calls: &Calls<K, T>) -> Arc<Self> {
        Arc::new(Self {
            slot: AsyncMutex::new(None),
            key,
            calls: Arc::downgrade(calls),
        })
    }
}

impl<K: Hash + Eq, T> Drop for Call<K, T> {
    // Runs once the last caller is gone. A newer call may already own the key.
    fn drop(&mut self) {
        let Some(calls) = self.calls.upgrade() else {
            return;
        };
        let mut calls = calls.lock();
        if calls.get(&self.key).is_some_and(|current| current.strong_count() == 0) {
            calls.remove(&self.key);
        }
    }
}

/// Deduplicates concurrent calls keyed by `K` whose output is `T`.
///
/// `T` is usually a `Result` with a cloneable error so that every waiter sees the identical
/// failure.
pub struct Flight<K: Hash + Eq, T> {
    calls: Calls<K, T>,
}

impl<K: Hash + Eq, T> Debug for Flight<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flight").field("keys", &self.calls.lock().len()).finish()
    }
}

impl<K: Hash + Eq, T> Default for Flight<K, T> {
    fn default() -> Self {
        Self {
            calls: Arc::default(),
        }
    }
}

impl<K, T> Flight<K, T>
where
    K: Hash + Eq + Clone,
    T: Clone,
{
    /// Creates an empty coalescer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `func` for `key` unless a call for `key` is already in flight, in which case the
    /// returned future resolves to a clone of that call's output.
    pub fn run<F, Fut>(&self, key: K, func: F) -> impl Future<Output = T> + use<K, T, F, Fut>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let call = self.join(&key);
        let calls = Arc::clone(&self.calls);

        async move {
            let mut slot = call.slot.lock().await;
            if let Some(output) = slot.as_ref() {
                return output.clone();
            }

            let output = func().await;
            *slot = Some(output.clone());
            drop(slot);

            release(&calls, &key, &call);
            output
        }
    }

    /// Returns the number of keys with a live in-flight call.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.calls.lock().values().filter(|call| call.strong_count() > 0).count()
    }

    fn join(&self, key: &K) -> Arc<Call<K, T>> {
        let mut calls = self.calls.lock();
        if let Some(call) = calls.get(key).and_then(Weak::upgrade) {
            return call;
        }

        // Either no call exists or every caller of the previous one was dropped.
        let call = Call::new(key.clone(), &self.calls);
        calls.insert(key.clone(), Arc::downgrade(&call));
        call
    }
}

/// Forgets the call for `key` if it is still the registered one.
fn release<K: Hash + Eq, T>(calls: &Calls<K, T>, key: &K, call: &Arc<Call<K, T>>) {
    let mut calls = calls.lock();
    if calls.get(key).is_some_and(|current| std::ptr::eq(current.as_ptr(), Arc::as_ptr(call))) {
        calls.remove(key);
    }
}
