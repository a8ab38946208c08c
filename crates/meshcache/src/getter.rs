// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{self, Debug};

use futures_util::future::BoxFuture;

use crate::BoxError;

/// Loads the authoritative value for a key on a cache miss.
///
/// A group calls its getter only for keys it owns, and never concurrently for the same key.
/// Calls for different keys may run in parallel.
///
/// # Examples
///
/// ```
/// use meshcache::{BoxError, Getter};
///
/// struct Scores;
///
/// impl Getter for Scores {
///     async fn get(&self, key: &str) -> Result<Vec<u8>, BoxError> {
///         match key {
///             "Tom" => Ok(b"630".to_vec()),
///             _ => Err(format!("{key} not exist").into()),
///         }
///     }
/// }
/// ```
pub trait Getter: Send + Sync + 'static {
    /// Returns the value for `key`, or an error if it cannot be produced.
    fn get(&self, key: &str) -> impl Future<Output = Result<Vec<u8>, BoxError>> + Send;
}

/// Object-safe counterpart of [`Getter`] used to store any getter in a group.
pub(crate) trait DynGetter: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<u8>, BoxError>>;
}

impl<G: Getter> DynGetter for G {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<u8>, BoxError>> {
        Box::pin(Getter::get(self, key))
    }
}

/// A [`Getter`] backed by a closure, created by [`getter_fn`].
#[derive(Clone)]
pub struct GetterFn<F>(F);

impl<F> Debug for GetterFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GetterFn").finish_non_exhaustive()
    }
}

impl<F, Fut> Getter for GetterFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<u8>, BoxError>> + Send + 'static,
{
    fn get(&self, key: &str) -> impl Future<Output = Result<Vec<u8>, BoxError>> + Send {
        (self.0)(key.to_owned())
    }
}

/// Adapts an async closure taking the key by value into a [`Getter`].
///
/// # Examples
///
/// ```
/// use meshcache::{BoxError, getter_fn};
///
/// let getter = getter_fn(|key: String| async move { Ok::<_, BoxError>(key.into_bytes()) });
/// # let _ = getter;
/// ```
pub fn getter_fn<F, Fut>(func: F) -> GetterFn<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<u8>, BoxError>> + Send + 'static,
{
    GetterFn(func)
}
