use thiserror::Error;

/// Errors raised by a [`SecureStore`](crate::store::SecureStore) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No entry found for key: {0}")]
    NotFound(String),

    #[error("Secure store unavailable: {0}")]
    Unavailable(String),

    #[error("Access to secure store denied: {0}")]
    AccessDenied(String),

    #[error("Secure store backend failure: {0}")]
    Backend(String),

    #[error("Encrypted store error: {0}")]
    Crypto(String),

    #[error("Secure store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Secure store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

impl From<keyring::Error> for StoreError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::NoEntry => StoreError::NotFound("Entry not found".to_string()),
            keyring::Error::NoStorageAccess(e) => StoreError::AccessDenied(e.to_string()),
            keyring::Error::PlatformFailure(e) => StoreError::Backend(e.to_string()),
            _ => StoreError::Backend(err.to_string()),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by [`TokenCache`](crate::cache::TokenCache).
///
/// `NotFound` is the normal "go re-authenticate" signal and covers expired
/// entries, owner mismatches and refused legacy recoveries alike.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("No usable cached token")]
    NotFound,

    #[error(transparent)]
    Store(StoreError),

    #[error("Cached token record is corrupt: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Failed to encode token record: {0}")]
    Encode(#[source] serde_json::Error),
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound)
    }
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => CacheError::NotFound,
            other => CacheError::Store(other),
        }
    }
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;
