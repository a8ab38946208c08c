// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Serves a score table through a cache group and shows how concurrent misses are coalesced.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use meshcache::{BoxError, Group, Registry, getter_fn};

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<(), meshcache::Error> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let db: Arc<HashMap<&str, &str>> = Arc::new(HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")]));

    let group = Group::builder(
        "scores",
        getter_fn(move |key: String| {
            let db = Arc::clone(&db);
            async move {
                // Pretend the database is slow.
                tokio::time::sleep(Duration::from_millis(100)).await;
                println!("[slow db] search key {key}");
                db.get(key.as_str())
                    .map(|score| score.as_bytes().to_vec())
                    .ok_or_else(|| BoxError::from(format!("{key} not exist")))
            }
        }),
    )
    .cache_bytes(2 << 10)
    .register(Registry::global())?;

    let lookups: Vec<_> = (0..5)
        .map(|_| {
            let group = Arc::clone(&group);
            tokio::spawn(async move { group.get("Tom").await })
        })
        .collect();
    for lookup in lookups {
        match lookup.await {
            Ok(Ok(score)) => println!("Tom scored {score}"),
            Ok(Err(error)) => println!("lookup failed: {error}"),
            Err(error) => println!("lookup task failed: {error}"),
        }
    }

    match group.get("Kate").await {
        Ok(score) => println!("Kate scored {score}"),
        Err(error) => println!("lookup failed: {error}"),
    }

    println!("{:?}", group.stats());
    Ok(())
}
