//! Core library for tokencache - identity-scoped caching of short-lived
//! OAuth tokens for the eightctl command-line client.
//!
//! A token is filed under a key derived from the identity that obtained it
//! (base URL, client ID, email), persisted through the platform secret
//! manager or an encrypted file, and only handed back while it is unexpired
//! and owned by the expected user.
//!
//! ```no_run
//! use chrono::{Duration, Utc};
//! use tokencache_core::{Identity, StoreConfig, SystemOpener, TokenCache};
//!
//! # fn main() -> anyhow::Result<()> {
//! let cache = TokenCache::new(SystemOpener::new(StoreConfig::load()?));
//! let id = Identity::new("https://client-api.8slp.net/v1", "sleep-client", "me@example.com");
//!
//! cache.save(&id, "access-token", Utc::now() + Duration::hours(1), Some("user-123"))?;
//! match cache.load(&id, Some("user-123")) {
//!     Ok(cached) => println!("token valid for {}m", cached.minutes_until_expiry()),
//!     Err(e) if e.is_not_found() => println!("log in again"),
//!     Err(e) => return Err(e.into()),
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod identity;
pub mod record;
pub mod store;
pub mod utils;

pub use cache::TokenCache;
pub use config::{BackendPreference, StoreConfig};
pub use error::{CacheError, CacheResult, StoreError, StoreResult};
pub use identity::{cache_key, Identity};
pub use record::CachedToken;
pub use store::{
    BackendKind, FileStore, KeyringStore, MemoryStore, SecureStore, StoreOpener, SystemOpener,
};
