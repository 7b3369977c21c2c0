//! Concurrent `get_or_load` behavior.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use common::{Event, bytes, harness};
use tiercache::{BoxError, CacheError, CacheValue, LoaderPanicked};
use tokio::sync::Barrier;

const CALLERS: usize = 32;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_load() {
    let h = harness();
    let invocations = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(CALLERS));

    let mut tasks = Vec::new();
    for _ in 0..CALLERS {
        let cache = h.cache.clone();
        let invocations = Arc::clone(&invocations);
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            cache
                .get_or_load("cold", move || async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok::<_, BoxError>(bytes("computed"))
                })
                .await
        }));
    }

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), bytes("computed"));
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(h.remote.puts(), 1);
    assert_eq!(h.cache.stats().loads, 1);
    assert_eq!(h.cache.stats().in_flight, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failure_is_shared_by_all_waiters() {
    let h = harness();
    let invocations = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(CALLERS));

    let mut tasks = Vec::new();
    for _ in 0..CALLERS {
        let cache = h.cache.clone();
        let invocations = Arc::clone(&invocations);
        let barrier = Arc::clone(&barrier);
        tasks.push(tokio::spawn(async move {
            barrier.wait().await;
            cache
                .get_or_load("flaky", move || async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Err::<CacheValue, _>("upstream timeout")
                })
                .await
        }));
    }

    for task in tasks {
        let err = task.await.unwrap().unwrap_err();
        match err {
            CacheError::LoadFailure { source, .. } => {
                assert_eq!(source.to_string(), "upstream timeout");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    // Reported once per load, not once per waiter.
    assert_eq!(h.observer.count(&Event::LoadFailure), 1);
    assert_eq!(h.cache.stats().load_failures, 1);
}

#[tokio::test]
async fn test_different_keys_load_independently() {
    let h = harness();
    let invocations = Arc::new(AtomicUsize::new(0));

    let loads = (0..8).map(|i| {
        let cache = h.cache.clone();
        let invocations = Arc::clone(&invocations);
        async move {
            cache
                .get_or_load(format!("key-{i}"), move || async move {
                    invocations.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok::<_, BoxError>(CacheValue::new(vec![i as u8]))
                })
                .await
        }
    });
    let results = futures::future::join_all(loads).await;

    for (i, result) in results.into_iter().enumerate() {
        assert_eq!(result.unwrap(), CacheValue::new(vec![i as u8]));
    }
    assert_eq!(invocations.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn test_panicking_loader_becomes_load_failure() {
    let h = harness();

    let err = h
        .cache
        .get_or_load("boom", || async {
            if true {
                panic!("loader exploded");
            }
            Ok::<_, BoxError>(bytes("never"))
        })
        .await
        .unwrap_err();

    let CacheError::LoadFailure { source, .. } = err else {
        panic!("expected a load failure");
    };
    let panicked = source
        .downcast_ref::<LoaderPanicked>()
        .expect("panic converted into LoaderPanicked");
    assert_eq!(panicked.message(), "loader exploded");
    assert_eq!(h.cache.stats().in_flight, 0);

    // The key is free again.
    let value = h
        .cache
        .get_or_load("boom", || async { Ok::<_, BoxError>(bytes("fine")) })
        .await
        .unwrap();
    assert_eq!(value, bytes("fine"));
}

#[tokio::test]
async fn test_cancelled_leader_does_not_block_followers() {
    let h = harness();
    let invocations = Arc::new(AtomicUsize::new(0));

    let slow_loader = |invocations: Arc<AtomicUsize>| {
        move || async move {
            invocations.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<_, BoxError>(bytes("from leader"))
        }
    };

    let leader = {
        let cache = h.cache.clone();
        let loader = slow_loader(Arc::clone(&invocations));
        tokio::spawn(async move { cache.get_or_load("k", loader).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    let follower = {
        let cache = h.cache.clone();
        let loader = slow_loader(Arc::clone(&invocations));
        tokio::spawn(async move { cache.get_or_load("k", loader).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    leader.abort();
    assert!(leader.await.unwrap_err().is_cancelled());

    // The follower keeps driving the flight the leader started.
    let value = tokio::time::timeout(Duration::from_secs(2), follower)
        .await
        .expect("follower finished")
        .unwrap()
        .unwrap();
    assert_eq!(value, bytes("from leader"));
    assert_eq!(invocations.load(Ordering::SeqCst), 1);
    assert_eq!(h.cache.stats().in_flight, 0);
}

#[tokio::test]
async fn test_abandoned_flight_is_restarted() {
    let h = harness();

    let abandoned = {
        let cache = h.cache.clone();
        tokio::spawn(async move {
            cache
                .get_or_load("k", || async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok::<_, BoxError>(bytes("never"))
                })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(h.cache.stats().in_flight, 1);

    abandoned.abort();
    let _ = abandoned.await;
    assert_eq!(h.cache.stats().in_flight, 0);

    let value = h
        .cache
        .get_or_load("k", || async { Ok::<_, BoxError>(bytes("fresh")) })
        .await
        .unwrap();
    assert_eq!(value, bytes("fresh"));
}
