//! Secure store adapters.
//!
//! This module provides:
//! - `SecureStore`: uniform set/get/remove/keys over opaque byte entries
//! - `KeyringStore`: OS secret manager (Keychain, kernel keyutils, Credential Manager)
//! - `FileStore`: ChaCha20-Poly1305 encrypted file, used when no native manager exists
//! - `MemoryStore`: in-process store for tests and dry runs
//! - `StoreOpener` / `SystemOpener`: how a cache obtains its store
//!
//! The file fallback derives its key from a fixed passphrase
//! ([`DEFAULT_FILE_PASSPHRASE`]). It keeps tokens off disk in plaintext but
//! is weaker than a native secret manager, since anyone who can read this
//! crate can read the passphrase.

pub mod file;
pub mod keyring;
pub mod memory;

use std::fmt;

use tracing::{debug, warn};

use crate::config::{BackendPreference, StoreConfig};
use crate::error::{StoreError, StoreResult};

pub use self::file::FileStore;
pub use self::keyring::KeyringStore;
pub use self::memory::MemoryStore;

/// Fixed passphrase for the encrypted file fallback.
pub const DEFAULT_FILE_PASSPHRASE: &str = "eightctl-fallback";

/// Which concrete backend a store handle talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Keyring,
    File,
    Memory,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Keyring => "keyring",
            BackendKind::File => "encrypted-file",
            BackendKind::Memory => "memory",
        };
        f.write_str(name)
    }
}

/// Confidential key-value persistence.
///
/// `get` and `remove` report a missing key as [`StoreError::NotFound`].
pub trait SecureStore {
    fn set(&self, key: &str, data: &[u8]) -> StoreResult<()>;

    fn get(&self, key: &str) -> StoreResult<Vec<u8>>;

    fn remove(&self, key: &str) -> StoreResult<()>;

    fn keys(&self) -> StoreResult<Vec<String>>;

    fn kind(&self) -> BackendKind;
}

/// Produces a store handle for each cache operation.
///
/// This is the single injection point for alternate backends: the cache
/// never opens a store any other way.
pub trait StoreOpener {
    fn open(&self) -> StoreResult<Box<dyn SecureStore>>;
}

impl<F> StoreOpener for F
where
    F: Fn() -> StoreResult<Box<dyn SecureStore>>,
{
    fn open(&self) -> StoreResult<Box<dyn SecureStore>> {
        self()
    }
}

/// Opens the platform store selected by a [`StoreConfig`].
#[derive(Debug, Clone)]
pub struct SystemOpener {
    config: StoreConfig,
}

impl SystemOpener {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn open_file(&self) -> StoreResult<Box<dyn SecureStore>> {
        let dir = self.config.file_dir().map_err(|e| {
            StoreError::Unavailable(format!("no location for encrypted file store: {e}"))
        })?;
        Ok(Box::new(FileStore::new(dir, self.config.file_passphrase())))
    }
}

impl StoreOpener for SystemOpener {
    fn open(&self) -> StoreResult<Box<dyn SecureStore>> {
        match self.config.backend {
            BackendPreference::Native => {
                let store = KeyringStore::with_service(&self.config.service);
                store.probe()?;
                Ok(Box::new(store))
            }
            BackendPreference::File => self.open_file(),
            BackendPreference::Auto => {
                let store = KeyringStore::with_service(&self.config.service);
                match store.probe() {
                    Ok(()) => {
                        debug!(service = %self.config.service, "using native keyring");
                        Ok(Box::new(store))
                    }
                    Err(e) => {
                        warn!(error = %e, "native keyring unavailable, using encrypted file store");
                        self.open_file()
                    }
                }
            }
        }
    }
}
