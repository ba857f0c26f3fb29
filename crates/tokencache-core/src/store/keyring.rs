//! Native secret manager backend.
//!
//! - macOS: Keychain
//! - Linux: kernel keyutils
//! - Windows: Credential Manager
//!
//! On Linux the `linux-native` feature stores entries in the session keyring.
//! They last until logout or reboot, after which the next command logs in
//! again. Secret Service would persist them but needs libdbus at build and
//! run time, which headless hosts often lack.
//!
//! OS keyrings cannot enumerate their entries, so this backend keeps an
//! index of the keys it has written under a reserved account name. The index
//! is bookkeeping only: an unreadable index is treated as empty and a failed
//! index update never fails the token write itself.

use std::collections::BTreeSet;

use keyring::Entry;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::utils::mask_key;

use super::{BackendKind, SecureStore};

/// Default service name for keyring entries.
pub const DEFAULT_SERVICE: &str = "eightctl";

/// Account holding the JSON list of keys written through this backend.
const INDEX_ACCOUNT: &str = "tokencache-index";

pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self::with_service(DEFAULT_SERVICE)
    }

    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, key: &str) -> StoreResult<Entry> {
        Entry::new(&self.service, key).map_err(StoreError::from)
    }

    /// Check that a native secret manager is reachable.
    pub fn probe(&self) -> StoreResult<()> {
        if !cfg!(any(target_os = "linux", target_os = "macos", target_os = "windows")) {
            return Err(StoreError::Unavailable(
                "no native secret manager on this platform".to_string(),
            ));
        }
        match self.entry(INDEX_ACCOUNT)?.get_secret() {
            Ok(_) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }

    fn load_index(&self) -> StoreResult<BTreeSet<String>> {
        match self.entry(INDEX_ACCOUNT)?.get_secret() {
            Ok(data) => Ok(parse_index(&data)),
            Err(keyring::Error::NoEntry) => Ok(BTreeSet::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save_index(&self, index: &BTreeSet<String>) -> StoreResult<()> {
        let data = serde_json::to_vec(index)?;
        self.entry(INDEX_ACCOUNT)?.set_secret(&data)?;
        Ok(())
    }

    /// Apply `change` to the index and write it back if it reports a change.
    ///
    /// Failures are logged and swallowed; the entry itself is already written.
    fn update_index<F>(&self, change: F)
    where
        F: FnOnce(&mut BTreeSet<String>) -> bool,
    {
        let result = self.load_index().and_then(|mut index| {
            if change(&mut index) {
                self.save_index(&index)?;
            }
            Ok(())
        });
        if let Err(e) = result {
            warn!(error = %e, "failed to update keyring key index");
        }
    }
}

/// Decode the stored index, starting over when it is unreadable.
fn parse_index(data: &[u8]) -> BTreeSet<String> {
    serde_json::from_slice(data).unwrap_or_else(|e| {
        warn!(error = %e, "keyring key index is corrupt, rebuilding it");
        BTreeSet::new()
    })
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecureStore for KeyringStore {
    fn set(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        self.entry(key)?.set_secret(data).map_err(|e| {
            warn!(key = %mask_key(key), error = %e, "keyring set failed");
            StoreError::from(e)
        })?;

        self.update_index(|index| index.insert(key.to_string()));
        debug!(key = %mask_key(key), "stored keyring entry");
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        match self.entry(key)?.get_secret() {
            Ok(data) => Ok(data),
            Err(keyring::Error::NoEntry) => Err(StoreError::NotFound(key.to_string())),
            Err(e) => {
                debug!(key = %mask_key(key), error = %e, "keyring get failed");
                Err(e.into())
            }
        }
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let result = match self.entry(key)?.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Err(StoreError::NotFound(key.to_string())),
            Err(e) => return Err(e.into()),
        };

        // Drop the key from the index even if the entry was already gone
        self.update_index(|index| index.remove(key));
        debug!(key = %mask_key(key), found = result.is_ok(), "removed keyring entry");
        result
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.load_index()?.into_iter().collect())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Keyring
    }
}
