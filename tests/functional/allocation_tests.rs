//! Claim/release scenarios under contention.

use std::sync::Arc;

use ippool_webhook::allocator::engine::{Allocator, ClaimOutcome, ReleaseOutcome};
use ippool_webhook::registry::client::PoolRegistry;
use ippool_webhook::registry::error::RegistryError;
use ippool_webhook::registry::pool::PoolStatus;

use crate::mock_registry::{MockRegistry, pool};

#[tokio::test]
async fn test_concurrent_claims_one_pool() {
    let registry = Arc::new(MockRegistry::new(vec![pool("p1", "zone-lhr", "available")]));
    let allocator = Allocator::new(registry.clone());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let allocator = allocator.clone();
        handles.push(tokio::spawn(async move {
            allocator.claim("location", "zone-lhr").await.unwrap()
        }));
    }

    let mut claimed = 0;
    let mut denied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            ClaimOutcome::Claimed(name) => {
                assert_eq!(name, "p1");
                claimed += 1;
            }
            ClaimOutcome::NoPoolAvailable => denied += 1,
        }
    }

    // Exactly one claimant wins; the rest observe exhaustion.
    assert_eq!(claimed, 1);
    assert_eq!(denied, 3);
    assert_eq!(registry.status_of("p1"), Some(PoolStatus::Used));
    assert_eq!(registry.write_count(), 1);
}

#[tokio::test]
async fn test_concurrent_claims_spread_over_pools() {
    let registry = Arc::new(MockRegistry::new(vec![
        pool("p1", "zone-lhr", "available"),
        pool("p2", "zone-lhr", "available"),
    ]));
    let allocator = Allocator::new(registry.clone());

    let a = tokio::spawn({
        let allocator = allocator.clone();
        async move { allocator.claim("location", "zone-lhr").await.unwrap() }
    });
    let b = tokio::spawn({
        let allocator = allocator.clone();
        async move { allocator.claim("location", "zone-lhr").await.unwrap() }
    });

    let mut names: Vec<String> = [a.await.unwrap(), b.await.unwrap()]
        .into_iter()
        .map(|outcome| match outcome {
            ClaimOutcome::Claimed(name) => name,
            ClaimOutcome::NoPoolAvailable => panic!("two pools were available"),
        })
        .collect();
    names.sort();
    assert_eq!(names, vec!["p1".to_string(), "p2".to_string()]);
}

#[tokio::test]
async fn test_claim_loser_relists_and_sees_exhaustion() {
    let registry = Arc::new(MockRegistry::new(vec![pool("p1", "zone-lhr", "available")]));
    let allocator = Allocator::new(registry.clone());

    // A competing webhook replica claims the pool using the revision it
    // observed, leaving our later listing stale.
    let observed = registry.get_pool("p1").await.unwrap();
    registry
        .set_pool_status(&observed, PoolStatus::Used)
        .await
        .unwrap();

    // The loser re-lists instead of reporting false success.
    let outcome = allocator.claim("location", "zone-lhr").await.unwrap();
    assert_eq!(outcome, ClaimOutcome::NoPoolAvailable);
    assert_eq!(registry.write_count(), 1);
}

#[tokio::test]
async fn test_claim_recovers_from_transient_conflict() {
    let registry = Arc::new(MockRegistry::new(vec![
        pool("p1", "zone-lhr", "available"),
        pool("p2", "zone-lhr", "available"),
    ]));
    registry.force_conflicts(1);
    let allocator = Allocator::new(registry.clone());

    let outcome = allocator.claim("location", "zone-lhr").await.unwrap();
    assert!(matches!(outcome, ClaimOutcome::Claimed(_)));
    assert_eq!(registry.write_count(), 1);
}

#[tokio::test]
async fn test_claim_surfaces_persistent_conflicts() {
    let registry = Arc::new(MockRegistry::new(vec![pool("p1", "zone-lhr", "available")]));
    registry.force_conflicts(u32::MAX);
    let allocator = Allocator::new(registry.clone());

    let err = allocator.claim("location", "zone-lhr").await.unwrap_err();
    assert!(matches!(err, RegistryError::Unavailable(_)));
    // The pool was never marked used.
    assert_eq!(registry.status_of("p1"), Some(PoolStatus::Available));
}

#[tokio::test]
async fn test_release_twice_is_already_released() {
    let registry = Arc::new(MockRegistry::new(vec![pool("p1", "zone-lhr", "used")]));
    let allocator = Allocator::new(registry.clone());

    assert_eq!(
        allocator.release("p1").await.unwrap(),
        ReleaseOutcome::Released
    );
    assert_eq!(
        allocator.release("p1").await.unwrap(),
        ReleaseOutcome::AlreadyReleased
    );
    assert_eq!(registry.status_of("p1"), Some(PoolStatus::Available));
}

#[tokio::test]
async fn test_concurrent_releases_never_error() {
    let registry = Arc::new(MockRegistry::new(vec![pool("p1", "zone-lhr", "used")]));
    let allocator = Allocator::new(registry.clone());

    let a = tokio::spawn({
        let allocator = allocator.clone();
        async move { allocator.release("p1").await }
    });
    let b = tokio::spawn({
        let allocator = allocator.clone();
        async move { allocator.release("p1").await }
    });

    assert!(a.await.unwrap().is_ok());
    assert!(b.await.unwrap().is_ok());
    assert_eq!(registry.status_of("p1"), Some(PoolStatus::Available));
}

#[tokio::test]
async fn test_claim_then_release_full_cycle() {
    let registry = Arc::new(MockRegistry::new(vec![pool("p1", "zone-lhr", "available")]));
    let allocator = Allocator::new(registry.clone());

    let outcome = allocator.claim("location", "zone-lhr").await.unwrap();
    assert_eq!(outcome, ClaimOutcome::Claimed("p1".to_string()));
    assert_eq!(registry.status_of("p1"), Some(PoolStatus::Used));

    assert_eq!(
        allocator.release("p1").await.unwrap(),
        ReleaseOutcome::Released
    );
    assert_eq!(registry.status_of("p1"), Some(PoolStatus::Available));

    // The pool is claimable again.
    let outcome = allocator.claim("location", "zone-lhr").await.unwrap();
    assert_eq!(outcome, ClaimOutcome::Claimed("p1".to_string()));
}
