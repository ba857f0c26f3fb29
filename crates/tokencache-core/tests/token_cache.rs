use chrono::{Duration, Utc};
use tokencache_core::store::file::KdfCost;
use tokencache_core::{
    CachedToken, FileStore, Identity, MemoryStore, SecureStore, StoreResult, TokenCache,
};

const BASE: &str = "https://client-api.example.com/v1";

fn identity(email: &str) -> Identity {
    Identity::new(BASE, "client-2", email)
}

fn put(store: &MemoryStore, key: &str, token: &str, user_id: Option<&str>) {
    let record = CachedToken::new(token, Utc::now() + Duration::hours(1), user_id);
    store.set(key, &record.encode().unwrap()).unwrap();
}

// ============================================================================
// Save / Load / Clear
// ============================================================================

#[test]
fn test_round_trip() {
    let cache = TokenCache::new(MemoryStore::new());
    let id = identity("me@example.com");

    cache
        .save(&id, "tok", Utc::now() + Duration::hours(1), Some("u1"))
        .unwrap();
    let cached = cache.load(&id, Some("u1")).unwrap();
    assert_eq!(cached.token, "tok");
    assert_eq!(cached.user_id.as_deref(), Some("u1"));
}

#[test]
fn test_load_with_differently_spelled_identity() {
    let cache = TokenCache::new(MemoryStore::new());
    cache
        .save(
            &identity("me@example.com"),
            "tok",
            Utc::now() + Duration::hours(1),
            None,
        )
        .unwrap();

    let respelled = Identity::new(
        " HTTPS://CLIENT-API.example.com/v1/ ",
        "client-2",
        "ME@example.com ",
    );
    assert_eq!(cache.load(&respelled, None).unwrap().token, "tok");
}

#[test]
fn test_expired_entry_is_evicted() {
    let store = MemoryStore::new();
    let cache = TokenCache::new(store.clone());
    let id = identity("me@example.com");

    cache
        .save(&id, "tok", Utc::now() - Duration::seconds(1), None)
        .unwrap();
    assert!(cache.load(&id, None).unwrap_err().is_not_found());
    assert!(!cache
        .keys()
        .unwrap()
        .contains(&tokencache_core::cache_key(&id)));
    assert!(store.is_empty());
}

#[test]
fn test_owner_mismatch() {
    let cache = TokenCache::new(MemoryStore::new());
    let id = identity("me@example.com");

    cache
        .save(&id, "tok", Utc::now() + Duration::hours(1), Some("u1"))
        .unwrap();
    assert!(cache.load(&id, Some("u2")).unwrap_err().is_not_found());
    assert_eq!(cache.load(&id, None).unwrap().token, "tok");
}

#[test]
fn test_unowned_record_matches_any_owner() {
    let cache = TokenCache::new(MemoryStore::new());
    let id = identity("me@example.com");

    cache
        .save(&id, "tok", Utc::now() + Duration::hours(1), None)
        .unwrap();
    assert_eq!(cache.load(&id, Some("u9")).unwrap().token, "tok");
}

#[test]
fn test_clear_is_idempotent() {
    let store = MemoryStore::new();
    let cache = TokenCache::new(store.clone());
    let id = identity("me@example.com");

    cache
        .save(&id, "tok", Utc::now() + Duration::hours(1), None)
        .unwrap();
    cache.clear(&id).unwrap();
    cache.clear(&id).unwrap();
    assert!(store.is_empty());
    assert!(cache.load(&id, None).unwrap_err().is_not_found());
}

#[test]
fn test_clear_leaves_legacy_keys() {
    let store = MemoryStore::new();
    let legacy = "oauth-token:me@example.com";
    put(&store, legacy, "old", None);

    let cache = TokenCache::new(store.clone());
    cache.clear(&identity("me@example.com")).unwrap();
    assert!(store.contains(legacy));
}

#[test]
fn test_identities_do_not_share_tokens() {
    let cache = TokenCache::new(MemoryStore::new());
    cache
        .save(
            &identity("a@example.com"),
            "tok-a",
            Utc::now() + Duration::hours(1),
            None,
        )
        .unwrap();
    cache
        .save(
            &Identity::new("https://staging.example.com", "client-2", "a@example.com"),
            "tok-staging",
            Utc::now() + Duration::hours(1),
            None,
        )
        .unwrap();

    assert_eq!(cache.load(&identity("a@example.com"), None).unwrap().token, "tok-a");
}

// ============================================================================
// Legacy recovery
// ============================================================================

#[test]
fn test_ambiguous_recovery_refused_without_email() {
    let store = MemoryStore::new();
    put(
        &store,
        "oauth-token:https://client-api.example.com/v1|client-2|a@example.com",
        "a",
        None,
    );
    put(
        &store,
        "oauth-token:https://client-api.example.com/v1|client-2|b@example.com",
        "b",
        None,
    );

    let cache = TokenCache::new(store);
    assert!(cache.load(&identity(""), None).unwrap_err().is_not_found());
}

#[test]
fn test_single_recovery_without_email() {
    let store = MemoryStore::new();
    put(
        &store,
        "oauth-token:https://client-api.example.com/v1|client-2|a@example.com",
        "a",
        None,
    );

    let cache = TokenCache::new(store);
    assert_eq!(cache.load(&identity("  "), None).unwrap().token, "a");
}

#[test]
fn test_recovery_after_client_rotation() {
    let store = MemoryStore::new();
    put(
        &store,
        "oauth-token:https://client-api.example.com/v1|client-1|me@example.com",
        "old",
        None,
    );

    let cache = TokenCache::new(store);
    assert_eq!(cache.load(&identity("Me@Example.com"), None).unwrap().token, "old");
}

#[test]
fn test_legacy_shapes_recovered() {
    for key in [
        "oauth-token:https://client-api.example.com/v1||me@example.com",
        "oauth-token:https://client-api.example.com/v1|me@example.com",
        "oauth-token:me@example.com",
    ] {
        let store = MemoryStore::new();
        put(&store, key, "legacy", None);
        let cache = TokenCache::new(store.clone());
        assert_eq!(
            cache.load(&identity("me@example.com"), None).unwrap().token,
            "legacy",
            "shape {key}"
        );
        // Reads never migrate or rewrite entries
        assert_eq!(store.keys().unwrap(), vec![key.to_string()]);
    }
}

#[test]
fn test_canonical_key_wins_over_legacy() {
    let store = MemoryStore::new();
    put(&store, "oauth-token:me@example.com", "legacy", None);

    let cache = TokenCache::new(store);
    let id = identity("me@example.com");
    cache
        .save(&id, "fresh", Utc::now() + Duration::hours(1), None)
        .unwrap();
    assert_eq!(cache.load(&id, None).unwrap().token, "fresh");
}

#[test]
fn test_recovered_token_still_checks_owner() {
    let store = MemoryStore::new();
    put(&store, "oauth-token:me@example.com", "legacy", Some("u1"));

    let cache = TokenCache::new(store);
    assert!(cache
        .load(&identity("me@example.com"), Some("u2"))
        .unwrap_err()
        .is_not_found());
}

// ============================================================================
// Encrypted file backend through the opener seam
// ============================================================================

#[test]
fn test_cache_over_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_path_buf();
    let opener = move || -> StoreResult<Box<dyn SecureStore>> {
        Ok(Box::new(FileStore::new(&path, "test-passphrase").with_cost(KdfCost {
            memory_kib: 64,
            iterations: 1,
        })))
    };
    let cache = TokenCache::new(opener);
    let id = identity("me@example.com");

    cache
        .save(&id, "tok", Utc::now() + Duration::hours(1), Some("u1"))
        .unwrap();
    assert_eq!(cache.load(&id, Some("u1")).unwrap().token, "tok");
    cache.clear(&id).unwrap();
    cache.clear(&id).unwrap();
    assert!(cache.keys().unwrap().is_empty());
}
