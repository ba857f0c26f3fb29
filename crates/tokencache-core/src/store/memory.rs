use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{StoreError, StoreResult};

use super::{BackendKind, SecureStore, StoreOpener};

/// In-process store. Clones share the same entries, so a test can keep one
/// handle for inspection while the cache opens others.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        // A poisoned map is still consistent: every mutation is a single insert/remove
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl SecureStore for MemoryStore {
    fn set(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        self.entries().insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.entries()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.entries().keys().cloned().collect())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}

impl StoreOpener for MemoryStore {
    fn open(&self) -> StoreResult<Box<dyn SecureStore>> {
        Ok(Box::new(self.clone()))
    }
}
