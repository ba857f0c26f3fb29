use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{CacheError, CacheResult, StoreResult};
use crate::identity::{cache_key, Identity};
use crate::record::CachedToken;
use crate::store::{BackendKind, SecureStore, StoreOpener};
use crate::utils::mask_key;

use super::legacy;

/// Identity-scoped token cache over a secure store.
///
/// The store is opened through `opener` for every operation, so a
/// long-lived cache never holds a keyring handle between commands.
pub struct TokenCache<O> {
    opener: O,
}

impl<O: StoreOpener> TokenCache<O> {
    pub fn new(opener: O) -> Self {
        Self { opener }
    }

    fn open(&self, op: &'static str) -> CacheResult<Box<dyn SecureStore>> {
        self.opener.open().map_err(|e| {
            debug!(op, error = %e, "secure store open failed");
            CacheError::Store(e)
        })
    }

    /// Store a token under the identity's canonical key.
    ///
    /// Legacy keys are never written or cleaned up here.
    pub fn save(
        &self,
        identity: &Identity,
        token: &str,
        expires_at: DateTime<Utc>,
        user_id: Option<&str>,
    ) -> CacheResult<()> {
        let store = self.open("save")?;
        let key = cache_key(identity);
        let data = CachedToken::new(token, expires_at, user_id).encode()?;

        store.set(&key, &data).map_err(|e| {
            debug!(key = %mask_key(&key), error = %e, "secure store set failed");
            CacheError::Store(e)
        })?;
        debug!(key = %mask_key(&key), backend = %store.kind(), "saved token");
        Ok(())
    }

    /// Fetch a usable token for the identity.
    ///
    /// Returns [`CacheError::NotFound`] when nothing is cached, the entry has
    /// expired (it is removed), or it belongs to a user other than
    /// `expected_user_id`.
    pub fn load(
        &self,
        identity: &Identity,
        expected_user_id: Option<&str>,
    ) -> CacheResult<CachedToken> {
        let store = self.open("load")?;
        let id = identity.normalize();
        let canonical = cache_key(&id);

        let (key, data) = match store.get(&canonical) {
            Ok(data) => (canonical, data),
            Err(e) if e.is_not_found() => {
                let resolution = legacy::resolve(&*store, &id).ok_or(CacheError::NotFound)?;
                let data = store.get(&resolution.key)?;
                (resolution.key, data)
            }
            Err(e) => {
                debug!(key = %mask_key(&canonical), error = %e, "secure store get failed");
                return Err(CacheError::Store(e));
            }
        };

        let cached = CachedToken::decode(&data)?;

        if cached.is_expired() {
            if let Err(e) = store.remove(&key) {
                debug!(key = %mask_key(&key), error = %e, "failed to evict expired token");
            }
            debug!(key = %mask_key(&key), "cached token expired");
            return Err(CacheError::NotFound);
        }
        if cached.belongs_to_other(expected_user_id) {
            debug!(key = %mask_key(&key), "cached token belongs to a different user");
            return Err(CacheError::NotFound);
        }
        Ok(cached)
    }

    /// Remove the identity's canonical entry. Removing nothing is not an error.
    pub fn clear(&self, identity: &Identity) -> CacheResult<()> {
        let store = self.open("clear")?;
        let key = cache_key(identity);
        match store.remove(&key) {
            Ok(()) => {
                debug!(key = %mask_key(&key), "cleared cached token");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(CacheError::Store(e)),
        }
    }

    /// Every key currently held by the store.
    pub fn keys(&self) -> CacheResult<Vec<String>> {
        let store = self.open("keys")?;
        store.keys().map_err(CacheError::Store)
    }

    /// The backend the opener currently selects.
    pub fn backend(&self) -> StoreResult<BackendKind> {
        Ok(self.opener.open()?.kind())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;
    use chrono::Duration;

    fn identity() -> Identity {
        Identity::new("https://api.example.com/", "client", "Me@Example.com")
    }

    const CANONICAL: &str = "oauth-token:https://api.example.com|client|me@example.com";

    #[test]
    fn test_save_writes_canonical_key_only() {
        let store = MemoryStore::new();
        let cache = TokenCache::new(store.clone());
        cache
            .save(&identity(), "tok", Utc::now() + Duration::hours(1), Some("u1"))
            .unwrap();
        assert_eq!(store.keys().unwrap(), vec![CANONICAL.to_string()]);
    }

    #[test]
    fn test_expired_legacy_entry_evicted_from_its_own_key() {
        let store = MemoryStore::new();
        let legacy_key = "oauth-token:https://api.example.com|me@example.com";
        let record = CachedToken::new("old", Utc::now() - Duration::seconds(1), None);
        store.set(legacy_key, &record.encode().unwrap()).unwrap();

        let cache = TokenCache::new(store.clone());
        assert!(cache.load(&identity(), None).unwrap_err().is_not_found());
        assert!(!store.contains(legacy_key));
    }

    #[test]
    fn test_owner_mismatch_keeps_entry() {
        let store = MemoryStore::new();
        let cache = TokenCache::new(store.clone());
        cache
            .save(&identity(), "tok", Utc::now() + Duration::hours(1), Some("u1"))
            .unwrap();
        assert!(cache.load(&identity(), Some("u2")).unwrap_err().is_not_found());
        assert!(store.contains(CANONICAL));
    }

    #[test]
    fn test_corrupt_record_is_decode_error() {
        let store = MemoryStore::new();
        store.set(CANONICAL, b"{garbage").unwrap();

        let cache = TokenCache::new(store.clone());
        let err = cache.load(&identity(), None).unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
        assert!(store.contains(CANONICAL));
    }

    #[test]
    fn test_open_failure_is_store_error() {
        let opener = || -> StoreResult<Box<dyn SecureStore>> {
            Err(StoreError::Unavailable("no keyring".to_string()))
        };
        let cache = TokenCache::new(opener);
        assert!(matches!(
            cache.load(&identity(), None).unwrap_err(),
            CacheError::Store(StoreError::Unavailable(_))
        ));
        assert!(matches!(
            cache.clear(&identity()).unwrap_err(),
            CacheError::Store(_)
        ));
    }

    /// Memory-backed store whose chosen operations fail with a backend error.
    #[derive(Clone, Default)]
    struct FailingStore {
        inner: MemoryStore,
        fail_keys: bool,
        fail_get: Option<String>,
        fail_remove: bool,
    }

    impl FailingStore {
        fn opener(self) -> impl Fn() -> StoreResult<Box<dyn SecureStore>> {
            move || Ok(Box::new(self.clone()) as Box<dyn SecureStore>)
        }
    }

    fn boom() -> StoreError {
        StoreError::Backend("boom".to_string())
    }

    impl SecureStore for FailingStore {
        fn set(&self, key: &str, data: &[u8]) -> StoreResult<()> {
            self.inner.set(key, data)
        }

        fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
            if self.fail_get.as_deref() == Some(key) {
                return Err(boom());
            }
            self.inner.get(key)
        }

        fn remove(&self, key: &str) -> StoreResult<()> {
            if self.fail_remove {
                return Err(boom());
            }
            self.inner.remove(key)
        }

        fn keys(&self) -> StoreResult<Vec<String>> {
            if self.fail_keys {
                return Err(boom());
            }
            self.inner.keys()
        }

        fn kind(&self) -> BackendKind {
            BackendKind::Memory
        }
    }

    #[test]
    fn test_listing_failure_in_legacy_tier_is_not_found() {
        let inner = MemoryStore::new();
        let record = CachedToken::new("tok", Utc::now() + Duration::hours(1), None);
        inner.set(CANONICAL, &record.encode().unwrap()).unwrap();
        let store = FailingStore {
            inner,
            fail_keys: true,
            ..Default::default()
        };

        // Email unknown: the canonical key misses and only the listing tier runs
        let cache = TokenCache::new(store.opener());
        let unknown_email = Identity::new("https://api.example.com", "client", "");
        let err = cache.load(&unknown_email, None).unwrap_err();
        assert!(err.is_not_found(), "expected NotFound, got {err:?}");
    }

    #[test]
    fn test_legacy_get_failure_falls_through() {
        let inner = MemoryStore::new();
        let record = CachedToken::new("tok", Utc::now() + Duration::hours(1), None);
        let rotated = "oauth-token:https://api.example.com|old|me@example.com";
        inner.set(rotated, &record.encode().unwrap()).unwrap();
        let store = FailingStore {
            inner,
            fail_get: Some("oauth-token:https://api.example.com||me@example.com".to_string()),
            ..Default::default()
        };

        let cache = TokenCache::new(store.opener());
        assert_eq!(cache.load(&identity(), None).unwrap().token, "tok");
    }

    #[test]
    fn test_canonical_get_failure_is_store_error() {
        let store = FailingStore {
            fail_get: Some(CANONICAL.to_string()),
            ..Default::default()
        };
        let cache = TokenCache::new(store.opener());
        assert!(matches!(
            cache.load(&identity(), None).unwrap_err(),
            CacheError::Store(StoreError::Backend(_))
        ));
    }

    #[test]
    fn test_failed_eviction_still_not_found() {
        let store = FailingStore {
            fail_remove: true,
            ..Default::default()
        };
        let record = CachedToken::new("old", Utc::now() - Duration::seconds(1), None);
        store.inner.set(CANONICAL, &record.encode().unwrap()).unwrap();

        let cache = TokenCache::new(store.clone().opener());
        assert!(cache.load(&identity(), None).unwrap_err().is_not_found());
        assert!(store.inner.contains(CANONICAL));
    }

    #[test]
    fn test_backend_reports_store_kind() {
        let cache = TokenCache::new(MemoryStore::new());
        assert_eq!(cache.backend().unwrap(), BackendKind::Memory);
    }
}
