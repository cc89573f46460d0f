//! Seat-lock semantics against a live Redis.
//!
//! Run with: docker run -d -p 6379:6379 redis:7-alpine
//! then: cargo test -p seatline-locks -- --ignored

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use seatline_core::keys;
use seatline_core::types::TripId;
use seatline_locks::{AcquireOutcome, ExpireOutcome, ExtendOutcome, LockStore, ReleaseOutcome};
use seatline_runtime::CircuitBreakerConfig;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

async fn store() -> LockStore {
    LockStore::connect(&redis_url(), CircuitBreakerConfig::default())
        .await
        .expect("redis must be running for ignored tests")
}

fn unique_key() -> String {
    keys::seat_lock(TripId::new(i64::from(rand_suffix())), 1)
}

fn rand_suffix() -> u32 {
    // Unique-enough per test run without pulling in rand.
    uuid::Uuid::new_v4().as_u128() as u32
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn acquire_release_cycle() {
    let locks = store().await.seat_locks();
    let key = unique_key();

    assert_eq!(
        locks.acquire(&key, "sess_a", Duration::from_secs(5)).await.unwrap(),
        AcquireOutcome::Acquired
    );
    // Same owner re-acquires without error.
    assert_eq!(
        locks.acquire(&key, "sess_a", Duration::from_secs(5)).await.unwrap(),
        AcquireOutcome::AlreadyOwned
    );
    // Foreign owner is refused.
    assert_eq!(
        locks.acquire(&key, "sess_b", Duration::from_secs(5)).await.unwrap(),
        AcquireOutcome::LockedByOther
    );

    // Only the owner may release.
    assert_eq!(
        locks.release(&key, "sess_b").await.unwrap(),
        ReleaseOutcome::NotOwner
    );
    assert_eq!(
        locks.release(&key, "sess_a").await.unwrap(),
        ReleaseOutcome::Released
    );
    assert_eq!(
        locks.release(&key, "sess_a").await.unwrap(),
        ReleaseOutcome::NotFound
    );

    // Freed key is up for grabs.
    assert_eq!(
        locks.acquire(&key, "sess_b", Duration::from_secs(5)).await.unwrap(),
        AcquireOutcome::Acquired
    );
    locks.expire(&key).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn re_acquire_does_not_extend_ttl() {
    let locks = store().await.seat_locks();
    let key = unique_key();

    locks
        .acquire(&key, "sess_a", Duration::from_millis(700))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    // Re-acquire with a long TTL must NOT refresh the short one.
    assert_eq!(
        locks.acquire(&key, "sess_a", Duration::from_secs(60)).await.unwrap(),
        AcquireOutcome::AlreadyOwned
    );
    tokio::time::sleep(Duration::from_millis(500)).await;

    // Original TTL lapsed; key must be gone.
    assert_eq!(
        locks.acquire(&key, "sess_b", Duration::from_secs(5)).await.unwrap(),
        AcquireOutcome::Acquired
    );
    locks.expire(&key).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn extend_resets_ttl_for_owner_only() {
    let locks = store().await.seat_locks();
    let key = unique_key();

    locks
        .acquire(&key, "sess_a", Duration::from_millis(600))
        .await
        .unwrap();

    assert_eq!(
        locks.extend(&key, "sess_b", Duration::from_secs(60)).await.unwrap(),
        ExtendOutcome::NotOwner
    );
    assert_eq!(
        locks.extend(&key, "sess_a", Duration::from_secs(60)).await.unwrap(),
        ExtendOutcome::Extended
    );

    tokio::time::sleep(Duration::from_millis(800)).await;
    // Still held thanks to the extension.
    assert_eq!(
        locks.acquire(&key, "sess_b", Duration::from_secs(5)).await.unwrap(),
        AcquireOutcome::LockedByOther
    );

    locks.expire(&key).await.unwrap();
    assert_eq!(
        locks.extend(&key, "sess_a", Duration::from_secs(5)).await.unwrap(),
        ExtendOutcome::NotFound
    );
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn force_expire_ignores_owner() {
    let locks = store().await.seat_locks();
    let key = unique_key();

    locks
        .acquire(&key, "sess_a", Duration::from_secs(30))
        .await
        .unwrap();
    assert_eq!(locks.expire(&key).await.unwrap(), ExpireOutcome::Released);
    assert_eq!(locks.expire(&key).await.unwrap(), ExpireOutcome::NotFound);
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn parallel_acquire_has_exactly_one_winner() {
    let store = Arc::new(store().await);
    let key = Arc::new(unique_key());

    let mut handles = Vec::new();
    for i in 0..200 {
        let store = Arc::clone(&store);
        let key = Arc::clone(&key);
        handles.push(tokio::spawn(async move {
            store
                .seat_locks()
                .acquire(&key, &format!("sess_{i}"), Duration::from_secs(10))
                .await
                .unwrap()
        }));
    }

    let mut acquired = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            AcquireOutcome::Acquired => acquired += 1,
            AcquireOutcome::LockedByOther => refused += 1,
            AcquireOutcome::AlreadyOwned => panic!("distinct sessions cannot already own"),
        }
    }

    assert_eq!(acquired, 1);
    assert_eq!(refused, 199);
    store.seat_locks().expire(&key).await.unwrap();
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn lock_expires_by_ttl() {
    let locks = store().await.seat_locks();
    let key = unique_key();

    locks
        .acquire(&key, "sess_a", Duration::from_millis(500))
        .await
        .unwrap();
    assert!(locks.any_exists(&[key.clone()]).await.unwrap());

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert!(!locks.any_exists(&[key.clone()]).await.unwrap());
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn nonce_rejects_second_presentation() {
    let replay = store().await.replay();
    let nonce = format!("sig-{}", uuid::Uuid::new_v4());

    replay
        .register("payment", &nonce, Duration::from_secs(30))
        .await
        .unwrap();

    let err = replay
        .register("payment", &nonce, Duration::from_secs(30))
        .await
        .unwrap_err();
    assert!(matches!(err, seatline_core::Error::ReplayDetected));

    // Same value in a different scope is a different nonce.
    replay
        .register("chat", &nonce, Duration::from_secs(30))
        .await
        .unwrap();
}

#[tokio::test]
#[ignore] // Requires Redis running
async fn blocked_cache_replace_and_fetch() {
    let store = store().await;
    let cache = store.blocked_cache();
    let route = seatline_core::types::RouteId::new(i64::from(rand_suffix()));
    let date = chrono::NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();

    cache.replace(route, date, &[5, 2, 9]).await.unwrap();
    assert_eq!(cache.fetch(route, date).await.unwrap(), vec![2, 5, 9]);

    // Wholesale replacement, not accumulation.
    cache.replace(route, date, &[7]).await.unwrap();
    assert_eq!(cache.fetch(route, date).await.unwrap(), vec![7]);

    cache.replace(route, date, &[]).await.unwrap();
    assert!(cache.fetch(route, date).await.unwrap().is_empty());
}
