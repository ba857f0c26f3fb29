//! Identity-scoped token cache.
//!
//! `TokenCache` ties the pieces together:
//! - `save` writes the record under the canonical key
//! - `load` reads the canonical key, falls back to legacy key shapes,
//!   then drops expired entries and tokens owned by another user
//! - `clear` removes the canonical key, succeeding when nothing is there
//!
//! Expiry is checked lazily on `load`; nothing sweeps the store.

pub mod legacy;
pub mod manager;

pub use legacy::{LegacyShape, Resolution, Strategy};
pub use manager::TokenCache;
