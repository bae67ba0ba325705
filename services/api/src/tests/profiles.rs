use common::cache::{CacheStore, DEFAULT_CACHE_TTL, keys};
use std::sync::Arc;

use super::mocks::{FailingCacheStore, Harness};
use crate::error::ApiError;
use crate::models::{UpdateProfileRequest, UserProfile};

#[tokio::test]
async fn test_profile_is_served_from_cache_on_repeat_read() {
    let h = Harness::new();
    h.users.add_user("alice").await;

    let first = h.state.profiles.find_by_login("alice").await.unwrap();
    let second = h.state.profiles.find_by_login("alice").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.login, "alice");
    assert_eq!(h.users.lookups(), 1);
    assert!(h.cache.contains_key(&keys::user_profile("alice")).await);
}

#[tokio::test]
async fn test_unknown_login_is_not_found_and_not_cached() {
    let h = Harness::new();

    let err = h.state.profiles.find_by_login("ghost").await.unwrap_err();
    assert!(matches!(err, ApiError::NotFound(_)));
    assert!(!h.cache.contains_key(&keys::user_profile("ghost")).await);
}

#[tokio::test]
async fn test_update_drops_cached_profile() {
    let h = Harness::new();
    h.users.add_user("alice").await;
    h.state.profiles.find_by_login("alice").await.unwrap();

    let updated = h
        .state
        .profiles
        .update(
            "alice",
            UpdateProfileRequest {
                name: Some("Alice Liddell".to_string()),
                avatar: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Alice Liddell");
    assert!(!h.cache.contains_key(&keys::user_profile("alice")).await);

    let reread = h.state.profiles.find_by_login("alice").await.unwrap();
    assert_eq!(reread.name, "Alice Liddell");
}

#[tokio::test]
async fn test_blank_name_is_bad_request() {
    let h = Harness::new();
    h.users.add_user("alice").await;

    let err = h
        .state
        .profiles
        .update(
            "alice",
            UpdateProfileRequest {
                name: Some("  ".to_string()),
                avatar: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::BadRequest(_)));
}

#[tokio::test]
async fn test_corrupted_profile_entry_is_replaced() {
    let h = Harness::new();
    h.users.add_user("alice").await;
    let key = keys::user_profile("alice");
    h.cache.set(&key, "{oops", DEFAULT_CACHE_TTL).await.unwrap();

    let profile = h.state.profiles.find_by_login("alice").await.unwrap();
    assert_eq!(profile.login, "alice");

    let repaired = h.cache.get(&key).await.unwrap().unwrap();
    let cached: UserProfile = serde_json::from_str(&repaired).unwrap();
    assert_eq!(cached, profile);
}

#[tokio::test]
async fn test_profile_reads_survive_cache_outage() {
    let h = Harness::with_cache_store(Arc::new(FailingCacheStore));
    h.users.add_user("alice").await;

    let profile = h.state.profiles.find_by_login("alice").await.unwrap();
    assert_eq!(profile.login, "alice");
}
