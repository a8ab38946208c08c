// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::pin::pin;

use futures_util::{Stream, StreamExt};

use crate::PeerPool;

/// A change in pool membership reported by a service registry.
///
/// Registries announce peers under a registration name (for example a lease key) and later
/// report only that name when the peer goes away.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipEvent {
    /// A peer registered `addr` under `registration`.
    Joined {
        /// Registration name in the registry.
        registration: String,
        /// Address the peer serves on.
        addr: String,
    },
    /// The peer registered under `registration` went away.
    Left {
        /// Registration name in the registry.
        registration: String,
    },
}

/// Applies every event from `events` to `pool` until the stream ends.
///
/// # Examples
///
/// ```
/// use meshcache::{Error, FetchRequest, FetchResponse, Fetcher, MembershipEvent, PeerFetcher, PeerPool, watch_membership};
///
/// struct Unreachable;
///
/// impl PeerFetcher for Unreachable {
///     async fn fetch(&self, _request: &FetchRequest) -> Result<FetchResponse, Error> {
///         Err(Error::peer_fetch("peer", "unreachable"))
///     }
/// }
///
/// # futures::executor::block_on(async {
/// let pool = PeerPool::builder("10.0.0.1:8001", |_addr: &str| Fetcher::new(Unreachable)).build();
/// let events = futures::stream::iter([MembershipEvent::Joined {
///     registration: "peers/2".into(),
///     addr: "10.0.0.2:8001".into(),
/// }]);
///
/// watch_membership(&pool, events).await;
/// assert_eq!(pool.peers(), vec!["10.0.0.1:8001", "10.0.0.2:8001"]);
/// # });
/// ```
pub async fn watch_membership<S>(pool: &PeerPool, events: S)
where
    S: Stream<Item = MembershipEvent>,
{
    let mut events = pin!(events);
    while let Some(event) = events.next().await {
        pool.apply(event);
    }
    tracing::info!(pool.local = pool.self_addr(), "membership stream ended");
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc;

    use super::*;
    use crate::{Error, FetchRequest, FetchResponse, Fetcher, PeerFetcher, PeerLocator};

    /// Answers every fetch with the address it was created for.
    struct Named(String);

    impl PeerFetcher for Named {
        async fn fetch(&self, _request: &FetchRequest) -> Result<FetchResponse, Error> {
            Ok(FetchResponse::new(self.0.clone().into_bytes()))
        }
    }

    #[tokio::test]
    async fn left_removes_every_virtual_node() {
        let pool = PeerPool::builder("self", |addr: &str| Fetcher::new(Named(addr.to_owned())))
            .replicas(20)
            .build();

        let (sender, receiver) = mpsc::unbounded();
        for (registration, addr) in [("peers/1", "p1"), ("peers/2", "p2")] {
            sender
                .unbounded_send(MembershipEvent::Joined {
                    registration: registration.into(),
                    addr: addr.into(),
                })
                .expect("send");
        }
        sender
            .unbounded_send(MembershipEvent::Left {
                registration: "peers/1".into(),
            })
            .expect("send");
        drop(sender);

        watch_membership(&pool, receiver).await;
        assert_eq!(pool.peers(), vec!["p2", "self"]);

        let mut remote = 0;
        for i in 0..500 {
            let key = format!("key-{i}");
            if let Some(fetcher) = pool.pick_peer(&key) {
                let response = fetcher.fetch(&FetchRequest::new("g", key)).await.expect("fetch");
                assert_eq!(response.value, "p2");
                remote += 1;
            }
        }
        assert!(remote > 0, "p2 should own some keys");
    }
}
