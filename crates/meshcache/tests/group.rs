// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! End-to-end lookups through a single group.

use std::error::Error as _;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use meshcache::{BoxError, ErrorKind, Getter, Group};

/// A getter over a fixed score table that counts its calls.
#[derive(Clone, Default)]
struct Scores {
    calls: Arc<AtomicUsize>,
    delay: Duration,
}

impl Scores {
    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Getter for Scores {
    async fn get(&self, key: &str) -> Result<Vec<u8>, BoxError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match key {
            "A" => Ok(b"1".to_vec()),
            "Tom" => Ok(b"630".to_vec()),
            "Jack" => Ok(b"589".to_vec()),
            "Sam" => Ok(b"567".to_vec()),
            _ => Err(format!("{key} not exist").into()),
        }
    }
}

fn group(scores: &Scores) -> Group {
    Group::builder("scores", scores.clone()).cache_bytes(2 << 10).build()
}

#[tokio::test]
async fn second_lookup_is_served_from_the_cache() {
    let scores = Scores::default();
    let group = group(&scores);

    assert_eq!(group.get("A").await.expect("load"), "1");
    assert_eq!(group.get("A").await.expect("hit"), "1");

    assert_eq!(scores.calls(), 1);
    assert_eq!(group.cache_len(), 1);
}

#[tokio::test]
async fn empty_key_is_rejected_without_loading() {
    let scores = Scores::default();
    let group = group(&scores);

    let error = group.get("").await.expect_err("empty key");

    assert!(matches!(error.kind(), ErrorKind::EmptyKey));
    assert_eq!(error.to_string(), "key is required");
    assert_eq!(scores.calls(), 0);
    assert_eq!(group.stats().gets, 0);
}

#[tokio::test]
async fn retrieval_error_is_returned_unchanged() {
    let scores = Scores::default();
    let group = group(&scores);

    let error = group.get("missing-key").await.expect_err("unknown key");

    assert!(matches!(error.kind(), ErrorKind::Retrieval(_)));
    assert_eq!(error.to_string(), "missing-key not exist");
    assert_eq!(
        error.source().map(ToString::to_string).as_deref(),
        Some("missing-key not exist")
    );
    assert_eq!(group.cache_len(), 0);
}

#[tokio::test]
async fn failures_are_not_cached() {
    let scores = Scores::default();
    let group = group(&scores);

    group.get("Kate").await.expect_err("first attempt");
    group.get("Kate").await.expect_err("second attempt");

    assert_eq!(scores.calls(), 2);
    assert_eq!(group.stats().local_load_errors, 2);
}

#[tokio::test]
async fn concurrent_misses_load_once() {
    let scores = Scores::slow(Duration::from_millis(50));
    let group = group(&scores);

    let lookups = FuturesUnordered::new();
    for _ in 0..50 {
        lookups.push(group.get("Tom"));
    }
    let values: Vec<_> = lookups.collect().await;

    assert!(values.iter().all(|value| value.as_ref().is_ok_and(|value| *value == "630")));
    assert_eq!(scores.calls(), 1);

    let stats = group.stats();
    assert_eq!(stats.loads, 50);
    assert_eq!(stats.coalesced, 49);
    assert_eq!(stats.local_loads, 1);
}

#[tokio::test]
async fn concurrent_failures_share_one_error() {
    let scores = Scores::slow(Duration::from_millis(50));
    let group = group(&scores);

    let (first, second) = tokio::join!(group.get("Kate"), group.get("Kate"));
    let (first, second) = (first.expect_err("first"), second.expect_err("second"));

    assert!(std::ptr::eq(first.kind(), second.kind()));
    assert_eq!(scores.calls(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_keys_load_in_parallel() {
    let scores = Scores::slow(Duration::from_millis(200));
    let group = Arc::new(group(&scores));
    let begin = tokio::time::Instant::now();

    let tasks: Vec<_> = ["Tom", "Jack", "Sam"]
        .into_iter()
        .map(|key| {
            let group = Arc::clone(&group);
            tokio::spawn(async move { group.get(key).await })
        })
        .collect();
    for task in tasks {
        task.await.expect("task panicked").expect("lookup");
    }

    assert_eq!(scores.calls(), 3);
    assert!(begin.elapsed() < Duration::from_millis(550));
}

#[tokio::test]
async fn lookup_after_eviction_reloads() {
    let scores = Scores::default();
    // "Tom" + "630" is 6 bytes, the budget holds exactly one such entry.
    let group = Group::builder("scores", scores.clone()).cache_bytes(6).build();

    group.get("Tom").await.expect("Tom");
    group.get("Sam").await.expect("Sam");
    group.get("Tom").await.expect("Tom again");

    assert_eq!(scores.calls(), 3);
    assert_eq!(group.cache_len(), 1);
}
