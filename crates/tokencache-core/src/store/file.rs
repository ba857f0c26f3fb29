//! Encrypted file store, used when no native secret manager is available.
//!
//! All entries live in one file, `tokens.enc`, laid out as
//! `[version:1][salt:16][nonce:12][ciphertext]`. The plaintext is a JSON map
//! of key to bytes. The cipher key is Argon2id(passphrase, salt); salt and
//! nonce are fresh on every write.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::utils::mask_key;

use super::{BackendKind, SecureStore};

const STORE_FILE: &str = "tokens.enc";
const FORMAT_VERSION: u8 = 1;
const SALT_SIZE: usize = 16;
const NONCE_SIZE: usize = 12;
const KEY_SIZE: usize = 32;
const HEADER_SIZE: usize = 1 + SALT_SIZE + NONCE_SIZE;

type Entries = BTreeMap<String, Vec<u8>>;

/// Argon2id cost parameters for deriving the file key.
#[derive(Debug, Clone, Copy)]
pub struct KdfCost {
    pub memory_kib: u32,
    pub iterations: u32,
}

impl Default for KdfCost {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
        }
    }
}

pub struct FileStore {
    path: PathBuf,
    passphrase: String,
    cost: KdfCost,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>, passphrase: impl Into<String>) -> Self {
        Self {
            path: dir.as_ref().join(STORE_FILE),
            passphrase: passphrase.into(),
            cost: KdfCost::default(),
        }
    }

    pub fn with_cost(mut self, cost: KdfCost) -> Self {
        self.cost = cost;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn derive_key(&self, salt: &[u8]) -> StoreResult<[u8; KEY_SIZE]> {
        let params = Params::new(self.cost.memory_kib, self.cost.iterations, 1, Some(KEY_SIZE))
            .map_err(|e| StoreError::Crypto(format!("invalid key derivation parameters: {e}")))?;
        let mut key = [0u8; KEY_SIZE];
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(self.passphrase.as_bytes(), salt, &mut key)
            .map_err(|e| StoreError::Crypto(format!("key derivation failed: {e}")))?;
        Ok(key)
    }

    fn load(&self) -> StoreResult<Entries> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };
        if data.is_empty() {
            return Ok(Entries::new());
        }
        if data.len() < HEADER_SIZE {
            return Err(StoreError::Crypto("encrypted store file is truncated".to_string()));
        }
        if data[0] != FORMAT_VERSION {
            return Err(StoreError::Crypto(format!(
                "unsupported encrypted store version {}",
                data[0]
            )));
        }

        let (salt, rest) = data[1..].split_at(SALT_SIZE);
        let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);

        let key = self.derive_key(salt)?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| StoreError::Crypto(format!("cipher init failed: {e}")))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| {
                StoreError::Crypto(
                    "decryption failed (wrong passphrase or corrupt file)".to_string(),
                )
            })?;

        Ok(serde_json::from_slice(&plaintext)?)
    }

    fn save(&self, entries: &Entries) -> StoreResult<()> {
        let plaintext = serde_json::to_vec(entries)?;

        let mut salt = [0u8; SALT_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let key = self.derive_key(&salt)?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key)
            .map_err(|e| StoreError::Crypto(format!("cipher init failed: {e}")))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| StoreError::Crypto(format!("encryption failed: {e}")))?;

        let mut output = Vec::with_capacity(HEADER_SIZE + ciphertext.len());
        output.push(FORMAT_VERSION);
        output.extend_from_slice(&salt);
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&ciphertext);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("enc.tmp");
        fs::write(&tmp, &output)?;
        set_file_permissions(&tmp)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SecureStore for FileStore {
    fn set(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), data.to_vec());
        self.save(&entries)?;
        debug!(key = %mask_key(key), path = %self.path.display(), "stored encrypted file entry");
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.load()?
            .remove(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.load()?;
        if entries.remove(key).is_none() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        self.save(&entries)?;
        debug!(key = %mask_key(key), "removed encrypted file entry");
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.load()?.into_keys().collect())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::File
    }
}

/// Set restrictive file permissions (0600 on Unix).
fn set_file_permissions(path: &Path) -> StoreResult<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }

    #[cfg(not(unix))]
    {
        let _ = path;
    }

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
